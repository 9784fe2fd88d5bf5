//! Newline-delimited line framing
//!
//! Wire format: one UTF-8 message per line, terminated by `\n`.
//! `\r\n` is accepted as well. Maximum line length: 64KB (sanity limit).

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};

/// Maximum allowed line length in bytes
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Reads lines from a stream, never buffering more than
/// `MAX_LINE_LENGTH + 1` bytes of one line.
///
/// [`LineReader::next_line`] is cancel safe, so it can sit in a
/// `tokio::select!` next to other branches without losing input.
pub struct LineReader<R> {
    reader: BufReader<R>,
    /// Bytes of the line read so far
    buf: Vec<u8>,
    /// Skipping the rest of an oversized line
    discarding: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            discarding: false,
        }
    }

    /// Read the next line without its terminator.
    ///
    /// An oversized line fails once with `InvalidMessage`; the rest of it is
    /// skipped, so the following call returns the next line.
    pub async fn next_line(&mut self) -> Result<String> {
        loop {
            let available = self.reader.fill_buf().await.map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
                _ => Error::Io(e),
            })?;

            // EOF
            if available.is_empty() {
                self.discarding = false;
                if self.buf.is_empty() {
                    return Err(Error::ConnectionClosed);
                }
                return finish_line(std::mem::take(&mut self.buf));
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let end = newline.unwrap_or(available.len());
            if !self.discarding {
                let room = MAX_LINE_LENGTH + 1 - self.buf.len();
                self.buf.extend_from_slice(&available[..end.min(room)]);
            }
            self.reader.consume(newline.map_or(end, |i| i + 1));

            if !self.discarding && self.buf.len() > MAX_LINE_LENGTH {
                self.buf.clear();
                self.discarding = newline.is_none();
                return Err(Error::InvalidMessage(format!(
                    "Line too long (max {} bytes)",
                    MAX_LINE_LENGTH
                )));
            }

            if newline.is_some() {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                return finish_line(std::mem::take(&mut self.buf));
            }
        }
    }
}

fn finish_line(mut bytes: Vec<u8>) -> Result<String> {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|_| Error::InvalidMessage("Line is not valid UTF-8".into()))
}

/// Write one line and flush it
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    if line.len() > MAX_LINE_LENGTH {
        return Err(Error::Encoding(format!(
            "Message too large: {} bytes (max {})",
            line.len(),
            MAX_LINE_LENGTH
        )));
    }

    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    // Flush to ensure delivery
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    #[tokio::test]
    async fn test_line_roundtrip() {
        let mut buf = Vec::new();
        write_line(&mut buf, "PING").await.unwrap();
        write_line(&mut buf, "MOVE~31~7").await.unwrap();
        assert_eq!(buf, b"PING\nMOVE~31~7\n");

        let mut reader = LineReader::new(Cursor::new(buf));
        assert_eq!(reader.next_line().await.unwrap(), "PING");
        assert_eq!(reader.next_line().await.unwrap(), "MOVE~31~7");
        assert!(matches!(
            reader.next_line().await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_carriage_return_stripped() {
        let mut reader = LineReader::new(Cursor::new(b"QUEUE\r\n".to_vec()));
        assert_eq!(reader.next_line().await.unwrap(), "QUEUE");
    }

    #[tokio::test]
    async fn test_last_line_without_newline() {
        let mut reader = LineReader::new(Cursor::new(b"PONG".to_vec()));
        assert_eq!(reader.next_line().await.unwrap(), "PONG");
    }

    #[tokio::test]
    async fn test_oversized_line_skipped() {
        let mut data = vec![b'A'; MAX_LINE_LENGTH + 1];
        data.extend_from_slice(b"\nPING\n");
        let mut reader = LineReader::new(Cursor::new(data));
        assert!(matches!(
            reader.next_line().await,
            Err(Error::InvalidMessage(_))
        ));
        // decoding resumes at the next line
        assert_eq!(reader.next_line().await.unwrap(), "PING");
    }

    /// Endless bytes without a newline, counting what gets read
    struct Flood {
        read: Arc<AtomicUsize>,
    }

    impl AsyncRead for Flood {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let n = buf.remaining().min(4096);
            buf.put_slice(&vec![b'A'; n]);
            self.read.fetch_add(n, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_reading_stops_near_limit() {
        let read = Arc::new(AtomicUsize::new(0));
        let mut reader = LineReader::new(Flood { read: read.clone() });
        assert!(matches!(
            reader.next_line().await,
            Err(Error::InvalidMessage(_))
        ));
        let consumed = read.load(Ordering::SeqCst);
        assert!(consumed <= MAX_LINE_LENGTH + 16 * 1024, "read {consumed} bytes");
        assert!(reader.buf.len() <= MAX_LINE_LENGTH + 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_reader_in_sync() {
        let mut reader = LineReader::new(Cursor::new(b"\xff\xfe\nQUIT\n".to_vec()));
        assert!(matches!(
            reader.next_line().await,
            Err(Error::InvalidMessage(_))
        ));
        assert_eq!(reader.next_line().await.unwrap(), "QUIT");
    }

    #[tokio::test]
    async fn test_oversized_write_rejected() {
        let mut buf = Vec::new();
        let line = "A".repeat(MAX_LINE_LENGTH + 1);
        assert!(write_line(&mut buf, &line).await.is_err());
        assert!(buf.is_empty());
    }
}
