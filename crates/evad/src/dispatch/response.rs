//! JSONL framing for outbound responses.

use std::io::{self, Write};

use eva_protocol::Response;

/// Writes one [`Response`] per line and flushes after each, so a client
/// reading line by line sees every response as soon as it is ready.
pub(crate) struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialises `response` as a single JSONL line.
    pub(crate) fn write_response(&mut self, response: &Response) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, response)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}
