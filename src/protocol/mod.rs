//! Build server protocol implementation.
//!
//! Layered leaves first:
//! - `codec`: Content-Length framing over a byte stream
//! - `envelope`: request / notification / response types
//! - `lifecycle`: handshake and shutdown phases
//! - `dispatch`: method routing table
//! - `fixture`: canned build-server payloads

pub mod codec;
pub mod dispatch;
pub mod envelope;
pub mod fixture;
pub mod lifecycle;
