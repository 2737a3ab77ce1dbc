//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use crate::types::Reply;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Bytes read per step while receiving message content.
const DATA_CHUNK: u64 = 8192;

/// A command line read from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Line content without its line ending.
    Complete(Vec<u8>),
    /// The line exceeded the length limit and was discarded.
    TooLong,
    /// The client closed the connection.
    Eof,
}

/// Message content read after `DATA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageData {
    /// Content with dot-stuffing removed.
    Complete(Vec<u8>),
    /// Content exceeded the size limit and was drained; carries the size seen.
    Oversized(usize),
}

/// Buffered server side of an SMTP connection.
#[derive(Debug)]
pub struct SmtpStream<S> {
    reader: BufReader<S>,
}

impl<S> SmtpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    /// Reads one command line of at most `max_len` bytes.
    ///
    /// Both CRLF and bare LF terminate a line. An overlong line is consumed
    /// up to its terminator so the next read starts on a fresh command.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn read_line(&mut self, max_len: usize) -> Result<Line> {
        let limit = u64::try_from(max_len)
            .unwrap_or(u64::MAX)
            .saturating_add(2);
        let mut buf = Vec::new();

        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(Line::Eof);
        }

        if !buf.ends_with(b"\n") && u64::try_from(buf.len()).unwrap_or(u64::MAX) >= limit {
            self.discard_line().await?;
            return Ok(Line::TooLong);
        }

        strip_line_ending(&mut buf);
        if buf.len() > max_len {
            return Ok(Line::TooLong);
        }
        Ok(Line::Complete(buf))
    }

    async fn discard_line(&mut self) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = (&mut self.reader)
                .take(DATA_CHUNK)
                .read_until(b'\n', &mut buf)
                .await?;
            if n == 0 || buf.ends_with(b"\n") {
                return Ok(());
            }
        }
    }

    /// Reads message content up to the `<CRLF>.<CRLF>` terminator.
    ///
    /// Leading dots are unstuffed. Content beyond `max_size` is read and
    /// discarded so the session stays in sync with the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] if the client disconnects before the
    /// terminator, [`Error::Timeout`] if no data arrives within
    /// `idle_timeout`, or an I/O error.
    pub async fn read_data(
        &mut self,
        max_size: usize,
        idle_timeout: Duration,
    ) -> Result<MessageData> {
        let mut data = Vec::new();
        let mut chunk = Vec::new();
        let mut at_line_start = true;
        let mut received: usize = 0;

        loop {
            chunk.clear();
            let mut limited = (&mut self.reader).take(DATA_CHUNK);
            let n = tokio::time::timeout(idle_timeout, limited.read_until(b'\n', &mut chunk))
                .await
                .map_err(|_| Error::Timeout)??;
            if n == 0 {
                return Err(Error::UnexpectedEof);
            }

            let line_complete = chunk.ends_with(b"\n");
            let mut content = chunk.as_slice();
            if at_line_start {
                if content == b".\r\n" || content == b".\n" {
                    break;
                }
                if let Some(unstuffed) = content.strip_prefix(b".") {
                    content = unstuffed;
                }
            }

            received = received.saturating_add(content.len());
            if received <= max_size {
                data.extend_from_slice(content);
            }
            at_line_start = line_complete;
        }

        if received > max_size {
            Ok(MessageData::Oversized(received))
        } else {
            Ok(MessageData::Complete(data))
        }
    }

    /// Writes a reply and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_reply(&mut self, reply: &Reply) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(&reply.serialize()).await?;
        stream.flush().await?;
        Ok(())
    }
}

fn strip_line_ending(buf: &mut Vec<u8>) {
    if buf.ends_with(b"\n") {
        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;
    use tokio_test::io::Builder;

    const IDLE: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_read_line_crlf_and_lf() {
        let mock = Builder::new().read(b"EHLO a\r\nNOOP\n").build();
        let mut stream = SmtpStream::new(mock);
        assert_eq!(
            stream.read_line(512).await.unwrap(),
            Line::Complete(b"EHLO a".to_vec())
        );
        assert_eq!(
            stream.read_line(512).await.unwrap(),
            Line::Complete(b"NOOP".to_vec())
        );
        assert_eq!(stream.read_line(512).await.unwrap(), Line::Eof);
    }

    #[tokio::test]
    async fn test_read_line_too_long_resyncs() {
        let mock = Builder::new().read(b"NOOP 0123456789\r\nQUIT\r\n").build();
        let mut stream = SmtpStream::new(mock);
        assert_eq!(stream.read_line(8).await.unwrap(), Line::TooLong);
        assert_eq!(
            stream.read_line(8).await.unwrap(),
            Line::Complete(b"QUIT".to_vec())
        );
    }

    #[tokio::test]
    async fn test_read_line_exact_limit() {
        let mock = Builder::new().read(b"12345678\r\n123456789\r\n").build();
        let mut stream = SmtpStream::new(mock);
        assert_eq!(
            stream.read_line(8).await.unwrap(),
            Line::Complete(b"12345678".to_vec())
        );
        assert_eq!(stream.read_line(8).await.unwrap(), Line::TooLong);
    }

    #[tokio::test]
    async fn test_read_data_unstuffs_dots() {
        let mock = Builder::new()
            .read(b"Subject: x\r\n\r\n..leading dot\r\n.\r\nQUIT\r\n")
            .build();
        let mut stream = SmtpStream::new(mock);
        assert_eq!(
            stream.read_data(1024, IDLE).await.unwrap(),
            MessageData::Complete(b"Subject: x\r\n\r\n.leading dot\r\n".to_vec())
        );
        assert_eq!(
            stream.read_line(512).await.unwrap(),
            Line::Complete(b"QUIT".to_vec())
        );
    }

    #[tokio::test]
    async fn test_read_data_dot_inside_line_is_content() {
        let mock = Builder::new().read(b"a.\r\n.b\r\n.\r\n").build();
        let mut stream = SmtpStream::new(mock);
        assert_eq!(
            stream.read_data(1024, IDLE).await.unwrap(),
            MessageData::Complete(b"a.\r\nb\r\n".to_vec())
        );
    }

    #[tokio::test]
    async fn test_read_data_oversized_is_drained() {
        let mock = Builder::new()
            .read(b"0123456789\r\n0123456789\r\n.\r\nQUIT\r\n")
            .build();
        let mut stream = SmtpStream::new(mock);
        assert_eq!(
            stream.read_data(16, IDLE).await.unwrap(),
            MessageData::Oversized(24)
        );
        assert_eq!(
            stream.read_line(512).await.unwrap(),
            Line::Complete(b"QUIT".to_vec())
        );
    }

    #[tokio::test]
    async fn test_read_data_eof() {
        let mock = Builder::new().read(b"Subject: x\r\n").build();
        let mut stream = SmtpStream::new(mock);
        assert!(matches!(
            stream.read_data(1024, IDLE).await,
            Err(Error::UnexpectedEof)
        ));
    }

    #[tokio::test]
    async fn test_write_reply() {
        let mock = Builder::new().write(b"250 OK\r\n").build();
        let mut stream = SmtpStream::new(mock);
        stream
            .write_reply(&Reply::single(ReplyCode::OK, "OK"))
            .await
            .unwrap();
    }
}
