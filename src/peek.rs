use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::HeaderErrorKind;

/// Longest valid v1 header line is 107 bytes, one byte of headroom for the
/// delimiter search
pub(crate) const MAX_BUFFERED: usize = 108;

/// Buffered look-ahead over a raw stream.
///
/// Bytes move from the transport into the buffer only on demand and leave it
/// only through the consuming methods, so nothing a `peek` touched can be
/// lost: whatever was buffered but not consumed comes back out of
/// `into_parts`.
pub(crate) struct Peeker<S> {
    io: S,
    buf: BytesMut,
}

impl<S: AsyncRead + Unpin> Peeker<S> {
    pub(crate) fn new(io: S) -> Self {
        Peeker {
            io,
            buf: BytesMut::with_capacity(MAX_BUFFERED),
        }
    }

    /// Buffer transport bytes until at least `n` are available
    async fn fill_to(&mut self, n: usize) -> Result<(), HeaderErrorKind> {
        if n > MAX_BUFFERED {
            return Err(HeaderErrorKind::InsufficientData(n));
        }
        while self.buf.len() < n {
            if self.io.read_buf(&mut self.buf).await? == 0 {
                return Err(HeaderErrorKind::InsufficientData(n));
            }
        }
        Ok(())
    }

    /// Non-consuming view of the next `n` bytes, idempotent until a
    /// consuming method runs
    pub(crate) async fn peek(&mut self, n: usize) -> Result<&[u8], HeaderErrorKind> {
        self.fill_to(n).await?;
        Ok(&self.buf[..n])
    }

    /// Consume exactly `n` bytes, buffering more if needed
    pub(crate) async fn skip(&mut self, n: usize) -> Result<(), HeaderErrorKind> {
        self.fill_to(n).await?;
        self.buf.advance(n);
        Ok(())
    }

    /// Consume exactly `n` bytes and return them
    pub(crate) async fn take(&mut self, n: usize) -> Result<Bytes, HeaderErrorKind> {
        self.fill_to(n).await?;
        Ok(self.buf.split_to(n).freeze())
    }

    /// Consume up to and including `delim`, returning the bytes before it
    pub(crate) async fn read_until(&mut self, delim: u8) -> Result<Bytes, HeaderErrorKind> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == delim) {
                let field = self.buf.split_to(pos).freeze();
                self.buf.advance(1);
                return Ok(field);
            }
            if self.buf.len() >= MAX_BUFFERED {
                return Err(HeaderErrorKind::InsufficientData(self.buf.len() + 1));
            }
            if self.io.read_buf(&mut self.buf).await? == 0 {
                return Err(HeaderErrorKind::Io(io::ErrorKind::UnexpectedEof.into()));
            }
        }
    }

    /// Consume exactly one byte
    pub(crate) async fn read_byte(&mut self) -> Result<u8, HeaderErrorKind> {
        self.fill_to(1).await?;
        let b = self.buf[0];
        self.buf.advance(1);
        Ok(b)
    }

    pub(crate) fn into_parts(self) -> (S, BytesMut) {
        (self.io, self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn peeker(data: &[u8]) -> Peeker<Cursor<Vec<u8>>> {
        Peeker::new(Cursor::new(data.to_vec()))
    }

    #[tokio::test]
    async fn test_peek_is_idempotent() {
        let mut p = peeker(b"PROXY TCP4");
        assert_eq!(p.peek(6).await.unwrap(), b"PROXY ");
        assert_eq!(p.peek(6).await.unwrap(), b"PROXY ");
        assert_eq!(p.peek(4).await.unwrap(), b"PROX");
    }

    #[tokio::test]
    async fn test_skip_advances_past_peeked_bytes() {
        let mut p = peeker(b"PROXY rest");
        p.peek(6).await.unwrap();
        p.skip(6).await.unwrap();
        assert_eq!(p.peek(4).await.unwrap(), b"rest");
    }

    #[tokio::test]
    async fn test_read_until_strips_delimiter() {
        let mut p = peeker(b"192.168.0.1 443");
        let field = p.read_until(b' ').await.unwrap();
        assert_eq!(&field[..], b"192.168.0.1");
        assert_eq!(p.peek(3).await.unwrap(), b"443");
    }

    #[tokio::test]
    async fn test_peek_past_eof_is_insufficient() {
        let mut p = peeker(b"PROX");
        match p.peek(6).await {
            Err(HeaderErrorKind::InsufficientData(6)) => {}
            other => panic!("expected InsufficientData, got {:?}", other.map(|b| b.to_vec())),
        }
        // the short peek itself still works
        assert_eq!(p.peek(4).await.unwrap(), b"PROX");
    }

    #[tokio::test]
    async fn test_peek_past_capacity_is_insufficient() {
        let mut p = peeker(&[b'a'; 256]);
        match p.peek(MAX_BUFFERED + 1).await {
            Err(HeaderErrorKind::InsufficientData(_)) => {}
            other => panic!("expected InsufficientData, got {:?}", other.map(|b| b.to_vec())),
        }
    }

    #[tokio::test]
    async fn test_read_until_bounded_by_capacity() {
        let mut p = peeker(&[b'a'; 256]);
        match p.read_until(b' ').await {
            Err(HeaderErrorKind::InsufficientData(_)) => {}
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_until_eof_is_io_error() {
        let mut p = peeker(b"no delimiter here");
        match p.read_until(b'\r').await {
            Err(HeaderErrorKind::Io(err)) => {
                assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof)
            }
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_into_parts_returns_unconsumed_bytes() {
        let mut p = peeker(b"PROXY payload");
        p.peek(6).await.unwrap();
        p.skip(6).await.unwrap();
        let (_, rest) = p.into_parts();
        assert_eq!(&rest[..], b"payload");
    }
}
