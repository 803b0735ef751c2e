//! Session lifecycle state machine.
//!
//! ```text
//! Uninitialized --build/initialize--> Initialized --build/shutdown--> ShuttingDown --build/exit--> Exited
//! ```
//!
//! By default every lifecycle method moves straight to its target phase and
//! data queries are answered in any phase. Strict mode rejects requests that
//! arrive out of order; `build/exit` always terminates.

use std::fmt;

use super::envelope::{INVALID_REQUEST, SERVER_NOT_INITIALIZED};

/// Current phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    ShuttingDown,
    Exited,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initialized => "initialized",
            Phase::ShuttingDown => "shutting_down",
            Phase::Exited => "exited",
        };
        f.write_str(name)
    }
}

/// What a recognized method means for the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `build/initialize`
    Initialize,
    /// `build/initialized`
    Initialized,
    /// `build/shutdown`
    Shutdown,
    /// `build/exit`
    Exit,
    /// Any data query; never changes phase.
    Query,
}

/// Why strict mode refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotInitialized,
    AlreadyInitialized,
    ShuttingDown,
}

impl Rejection {
    pub fn code(&self) -> i64 {
        match self {
            Rejection::NotInitialized => SERVER_NOT_INITIALIZED,
            Rejection::AlreadyInitialized | Rejection::ShuttingDown => INVALID_REQUEST,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rejection::NotInitialized => "server not initialized",
            Rejection::AlreadyInitialized => "server already initialized",
            Rejection::ShuttingDown => "server is shutting down",
        }
    }
}

/// Lifecycle of one connection.
#[derive(Debug)]
pub struct Lifecycle {
    phase: Phase,
    strict: bool,
    clean_exit: bool,
}

impl Lifecycle {
    pub fn new(strict: bool) -> Self {
        Lifecycle {
            phase: Phase::Uninitialized,
            strict,
            clean_exit: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Check whether `event` may run in the current phase.
    ///
    /// Always succeeds in permissive mode.
    pub fn check(&self, event: Event) -> Result<(), Rejection> {
        if !self.strict || event == Event::Exit {
            return Ok(());
        }

        match (self.phase, event) {
            (Phase::Uninitialized, Event::Initialize) => Ok(()),
            (Phase::Uninitialized, _) => Err(Rejection::NotInitialized),
            (Phase::Initialized, Event::Initialize) => Err(Rejection::AlreadyInitialized),
            (Phase::Initialized, _) => Ok(()),
            (Phase::ShuttingDown | Phase::Exited, _) => Err(Rejection::ShuttingDown),
        }
    }

    /// Move to the phase `event` leads to and return the new phase.
    pub fn apply(&mut self, event: Event) -> Phase {
        let next = match event {
            Event::Initialize | Event::Initialized => Phase::Initialized,
            Event::Shutdown => Phase::ShuttingDown,
            Event::Exit => {
                self.clean_exit = self.phase == Phase::ShuttingDown;
                Phase::Exited
            }
            Event::Query => self.phase,
        };
        self.phase = next;
        next
    }

    /// Whether the session ended with `build/exit` after `build/shutdown`.
    pub fn exited_cleanly(&self) -> bool {
        self.phase == Phase::Exited && self.clean_exit
    }
}
