//! Connection handler that decodes JSONL requests and dispatches them.
//!
//! A connection carries any number of requests, one per line. Each line is
//! decoded with [`eva_protocol::decode_line`] and answered with exactly one
//! response line, in arrival order. Lines that cannot be decoded are answered
//! with a failure response; the connection stays open. Blank lines are
//! skipped. A line longer than [`MAX_REQUEST_BYTES`] is answered with a
//! failure and the connection is closed, since the rest of the stream can no
//! longer be framed reliably.

use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use eva_protocol::{Response, decode_line};
use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::dispatcher::Dispatcher;
use super::response::ResponseWriter;

/// Maximum size of a single request line in bytes.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Bridges blocking socket connections onto the async dispatcher.
pub(crate) struct DispatchConnectionHandler {
    dispatcher: Arc<Dispatcher>,
    runtime: Handle,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, runtime: Handle) -> Self {
        Self {
            dispatcher,
            runtime,
        }
    }

    fn serve(&self, stream: ConnectionStream) -> io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = ResponseWriter::new(stream);
        let mut line = Vec::new();

        loop {
            match read_request_line(&mut reader, &mut line)? {
                LineRead::Eof => return Ok(()),
                LineRead::TooLarge => {
                    warn!(
                        target: DISPATCH_TARGET,
                        limit = MAX_REQUEST_BYTES,
                        "request line too large; closing connection"
                    );
                    let response = Response::failure(
                        fallback_request_id(),
                        format!("request exceeds maximum size of {MAX_REQUEST_BYTES} bytes"),
                    );
                    return writer.write_response(&response);
                }
                LineRead::Line if line.trim_ascii().is_empty() => {}
                LineRead::Line => {
                    let response = self.respond(&line);
                    writer.write_response(&response)?;
                }
            }
        }
    }

    fn respond(&self, line: &[u8]) -> Response {
        match decode_line(line, fallback_request_id) {
            Ok(request) => self
                .runtime
                .block_on(self.dispatcher.process_request(request)),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    request_id = error.request_id(),
                    field = %error.field(),
                    %error,
                    "malformed request"
                );
                Response::failure(error.request_id(), error.to_string())
            }
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        if let Err(error) = self.serve(stream) {
            debug!(target: DISPATCH_TARGET, %error, "connection ended with error");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    Eof,
    TooLarge,
}

/// Reads one newline-terminated line into `line`, refusing to buffer more
/// than [`MAX_REQUEST_BYTES`]. A final unterminated line counts as a line.
fn read_request_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<LineRead> {
    line.clear();
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        if available.is_empty() {
            return Ok(if line.is_empty() {
                LineRead::Eof
            } else {
                LineRead::Line
            });
        }

        let newline = available.iter().position(|byte| *byte == b'\n');
        let consumed = newline.map_or(available.len(), |pos| pos + 1);
        line.extend_from_slice(available.get(..consumed).unwrap_or(available));
        reader.consume(consumed);

        if line.len() > MAX_REQUEST_BYTES {
            return Ok(LineRead::TooLarge);
        }
        if newline.is_some() {
            return Ok(LineRead::Line);
        }
    }
}

fn fallback_request_id() -> String {
    format!("transport-{}", Uuid::new_v4())
}
