//! Stdio session loop.
//!
//! Reads one frame, dispatches it, writes the reply if there is one, and
//! repeats until the input ends, the peer stops reading, or `build/exit`
//! arrives. Requests are answered strictly in arrival order.

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::codec::{write_frame, FrameReader, WriteStatus};
use crate::protocol::dispatch::{Dispatcher, Outcome};
use crate::protocol::fixture::Fixture;
use crate::protocol::lifecycle::Lifecycle;

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Input closed before the next header.
    EndOfStream,
    /// Peer closed its read side while a response was being written.
    PeerClosed,
    /// `build/exit` received; `clean` if it followed `build/shutdown`.
    Exit { clean: bool },
}

/// Server instance
pub struct Server {
    config: Config,
    fixture: Fixture,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let fixture = Fixture::new(config.fixture.clone());
        Server { config, fixture }
    }

    /// Serve one session over this process's stdin and stdout.
    pub async fn run(&self) -> Result<Termination> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve one session over an arbitrary stream pair.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<Termination>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FrameReader::new(reader)
            .with_max_frame_size(self.config.max_frame_size)
            .with_read_timeout(self.config.read_timeout);
        let mut dispatcher = Dispatcher::new(
            self.fixture.clone(),
            Lifecycle::new(self.config.strict),
        );

        info!(
            strict = dispatcher.lifecycle().is_strict(),
            "Session started"
        );

        loop {
            let envelope = match frames.read_frame().await? {
                Some(envelope) => envelope,
                None => {
                    info!(phase = %dispatcher.lifecycle().phase(), "Input closed");
                    return Ok(Termination::EndOfStream);
                }
            };

            debug!(
                method = envelope.method(),
                id = ?envelope.id(),
                has_params = envelope.params().is_some(),
                "Received message"
            );

            match dispatcher.dispatch(envelope)? {
                Outcome::Reply(response) => match write_frame(&mut writer, &response).await? {
                    WriteStatus::Written(bytes) => {
                        debug!(id = %response.id, error = response.is_error(), bytes, "Sent response");
                    }
                    WriteStatus::PeerClosed => {
                        info!("Output closed by peer");
                        return Ok(Termination::PeerClosed);
                    }
                },
                Outcome::NoReply => {}
                Outcome::Exit => {
                    let clean = dispatcher.lifecycle().exited_cleanly();
                    info!(clean, "Exit received");
                    return Ok(Termination::Exit { clean });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::envelope::{Payload, Response};
    use serde_json::{json, Value};

    fn frame(message: Value) -> Vec<u8> {
        let body = serde_json::to_string(&message).unwrap();
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    fn frames(messages: &[Value]) -> Vec<u8> {
        messages.iter().flat_map(|m| frame(m.clone())).collect()
    }

    /// Decode every response frame in `raw`, checking declared lengths.
    fn responses(raw: &[u8]) -> Vec<Response> {
        let mut out = Vec::new();
        let mut rest = raw;
        while !rest.is_empty() {
            let text = std::str::from_utf8(rest).unwrap();
            let header_end = text.find("\r\n\r\n").unwrap();
            let length: usize = text[..header_end]
                .strip_prefix("Content-Length: ")
                .unwrap()
                .parse()
                .unwrap();
            let body_start = header_end + 4;
            out.push(serde_json::from_slice(&rest[body_start..body_start + length]).unwrap());
            rest = &rest[body_start + length..];
        }
        out
    }

    async fn run_session(config: Config, input: &[u8]) -> (Result<Termination>, Vec<u8>) {
        let mut output = Vec::new();
        let result = Server::new(config).serve(input, &mut output).await;
        (result, output)
    }

    fn request(id: Value, method: &str) -> Value {
        json!({"jsonrpc": "2.0", "id": id, "method": method})
    }

    fn notification(method: &str) -> Value {
        json!({"jsonrpc": "2.0", "method": method})
    }

    #[tokio::test]
    async fn test_full_session() {
        let input = frames(&[
            request(json!(1), "build/initialize"),
            notification("build/initialized"),
            request(json!(2), "buildTarget/sources"),
            request(json!(7), "build/shutdown"),
            notification("build/exit"),
        ]);

        let (result, output) = run_session(Config::default(), &input).await;
        assert_eq!(result.unwrap(), Termination::Exit { clean: true });

        let replies = responses(&output);
        let ids: Vec<Value> = replies.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(7)]);

        match &replies[0].payload {
            Payload::Result(value) => {
                assert_eq!(value["bspVersion"], "2.0");
                assert_eq!(value["capabilities"]["languageIds"], json!(["a", "b"]));
                assert_eq!(value["data"]["indexStorePath"], "some/index/store/path");
            }
            other => panic!("unexpected: {:?}", other),
        }
        match &replies[1].payload {
            Payload::Result(value) => {
                let items = value["items"].as_array().unwrap();
                assert_eq!(items.len(), 2);
                for item in items {
                    assert_eq!(item["sources"][0]["kind"], 1);
                    assert_eq!(item["sources"][1]["kind"], 2);
                }
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(replies[2], Response::result(json!(7), Value::Null));
    }

    #[tokio::test]
    async fn test_shutdown_wire_bytes() {
        let input = frame(request(json!(7), "build/shutdown"));
        let (result, output) = run_session(Config::default(), &input).await;
        assert_eq!(result.unwrap(), Termination::EndOfStream);

        let body = r#"{"jsonrpc":"2.0","id":7,"result":null}"#;
        assert_eq!(
            output,
            format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
        );
    }

    #[tokio::test]
    async fn test_unknown_request_gets_error() {
        let input = frame(request(json!(9), "foo/bar"));
        let (result, output) = run_session(Config::default(), &input).await;
        assert_eq!(result.unwrap(), Termination::EndOfStream);
        assert_eq!(
            responses(&output),
            vec![Response::unhandled_method(json!(9), "foo/bar")]
        );
    }

    #[tokio::test]
    async fn test_unknown_notification_writes_nothing_and_continues() {
        let input = frames(&[notification("foo/bar"), request(json!(2), "build/shutdown")]);
        let (result, output) = run_session(Config::default(), &input).await;
        assert_eq!(result.unwrap(), Termination::EndOfStream);

        let replies = responses(&output);
        assert_eq!(replies, vec![Response::result(json!(2), Value::Null)]);
    }

    #[tokio::test]
    async fn test_notifications_alone_write_nothing() {
        let input = frames(&[
            notification("build/initialized"),
            notification("window/showMessage"),
            notification("build/initialize"),
        ]);
        let (result, output) = run_session(Config::default(), &input).await;
        assert_eq!(result.unwrap(), Termination::EndOfStream);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_exit_stops_reading() {
        let trailing = frame(request(json!(3), "build/shutdown"));
        let mut input = frame(notification("build/exit"));
        input.extend_from_slice(&trailing);

        let mut remaining: &[u8] = &input;
        let mut output = Vec::new();
        let result = Server::new(Config::default())
            .serve(&mut remaining, &mut output)
            .await;

        assert_eq!(result.unwrap(), Termination::Exit { clean: false });
        assert!(output.is_empty());
        assert_eq!(remaining, &trailing[..]);
    }

    #[tokio::test]
    async fn test_empty_input_ends_cleanly() {
        let (result, output) = run_session(Config::default(), b"").await;
        assert_eq!(result.unwrap(), Termination::EndOfStream);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_string_ids_echoed() {
        let input = frames(&[
            request(json!("req-a"), "build/initialize"),
            request(json!("req-b"), "nope"),
        ]);
        let (_, output) = run_session(Config::default(), &input).await;
        let ids: Vec<Value> = responses(&output).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![json!("req-a"), json!("req-b")]);
    }

    #[tokio::test]
    async fn test_malformed_header_is_fatal() {
        let mut input = frame(request(json!(1), "build/shutdown"));
        input.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");

        let (result, output) = run_session(Config::default(), &input).await;
        match result {
            Err(e) => assert!(e.is_protocol_violation(), "unexpected: {e:?}"),
            Ok(t) => panic!("unexpected: {:?}", t),
        }
        // The frame before the bad header was still answered
        assert_eq!(responses(&output).len(), 1);
    }

    #[tokio::test]
    async fn test_peer_closed_output_ends_session() {
        let input = frames(&[
            request(json!(1), "build/initialize"),
            request(json!(2), "build/shutdown"),
        ]);
        let mut remaining: &[u8] = &input;
        let writer = tokio_test::io::Builder::new()
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            .build();

        let result = Server::new(Config::default())
            .serve(&mut remaining, writer)
            .await;
        assert_eq!(result.unwrap(), Termination::PeerClosed);
        assert_eq!(remaining, &frame(request(json!(2), "build/shutdown"))[..]);
    }

    #[tokio::test]
    async fn test_strict_rejects_query_before_initialize() {
        let config = Config {
            strict: true,
            ..Config::default()
        };
        let input = frames(&[
            request(json!(1), "buildTarget/sources"),
            request(json!(2), "build/initialize"),
            request(json!(3), "buildTarget/sources"),
            notification("build/exit"),
        ]);

        let (result, output) = run_session(config, &input).await;
        assert_eq!(result.unwrap(), Termination::Exit { clean: false });

        let replies = responses(&output);
        assert_eq!(
            replies[0],
            Response::error(json!(1), -32002, "server not initialized")
        );
        assert!(!replies[1].is_error());
        assert!(!replies[2].is_error());
    }

    #[tokio::test]
    async fn test_permissive_answers_query_before_initialize() {
        let input = frame(request(json!(2), "buildTarget/sources"));
        let (_, output) = run_session(Config::default(), &input).await;
        let replies = responses(&output);
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].is_error());
    }

    #[tokio::test]
    async fn test_read_timeout_is_reported() {
        let config = Config {
            read_timeout: Some(std::time::Duration::from_millis(20)),
            ..Config::default()
        };
        let (_client, server_side) = tokio::io::duplex(64);
        let result = Server::new(config)
            .serve(BufReader::new(server_side), Vec::new())
            .await;
        assert!(matches!(result, Err(Error::ReadTimeout(_))));
    }
}
