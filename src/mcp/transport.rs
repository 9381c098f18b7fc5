//! Line-delimited message transport.
//!
//! One JSON message per line in each direction. The server runs it over
//! stdin/stdout; stdout carries nothing but messages, so logging goes to
//! stderr.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Reads lines from `R` and writes serialised messages to `W`.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// The transport the server runs on.
pub type StdioTransport = LineTransport<BufReader<Stdin>, Stdout>;

impl StdioTransport {
    /// Attaches to the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W> {
    /// Wraps a reader and a writer.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Reads the next line without its terminator. `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the line is not UTF-8.
    pub async fn recv(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(len);
        Ok(Some(line))
    }

    /// Serialises `message` onto one line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the write fails.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        let mut line = serde_json::to_vec(message)?;
        // Compact serde_json output escapes every newline inside strings.
        debug_assert!(!line.contains(&b'\n'));
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{RequestId, Response, RpcError, ServerNotification};
    use serde_json::json;
    use tokio_test::io::Builder;

    fn reading(input: &[u8]) -> LineTransport<BufReader<tokio_test::io::Mock>, tokio::io::Sink> {
        LineTransport::new(
            BufReader::new(Builder::new().read(input).build()),
            tokio::io::sink(),
        )
    }

    fn writing(expected: &[u8]) -> LineTransport<tokio::io::Empty, tokio_test::io::Mock> {
        LineTransport::new(tokio::io::empty(), Builder::new().write(expected).build())
    }

    #[tokio::test]
    async fn recv_splits_lines_and_strips_crlf() {
        let mut transport = reading(b"{\"a\":1}\r\n\n{\"b\":2}");
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some(""));
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(transport.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn send_response_escapes_newlines() {
        let mut transport =
            writing(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"text\":\"a\\nb\"}}\n");
        let response = Response::new(RequestId::Number(1), json!({ "text": "a\nb" }));
        transport.send(&response).await.unwrap();
    }

    #[tokio::test]
    async fn send_error_with_null_id() {
        let mut transport = writing(
            b"{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32700,\"message\":\"Parse error\"}}\n",
        );
        transport.send(&RpcError::parse_error()).await.unwrap();
    }

    #[tokio::test]
    async fn send_list_changed() {
        let mut transport =
            writing(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/resources/list_changed\"}\n");
        transport
            .send(&ServerNotification::resource_list_changed())
            .await
            .unwrap();
    }
}
