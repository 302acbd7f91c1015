use std::{
    cmp, fmt, io,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::BytesMut;
use log::debug;
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpStream,
};

use crate::{
    error::HeaderErrorKind,
    parser::{self, ForwardedAddrs},
    peek::Peeker,
};

/// Stream decorator that recovers the originating client address from a
/// PROXY protocol v1 header.
///
/// The wrapper owns the raw stream exclusively. Header detection happens
/// once, inside [`ProxiedStream::wrap`], before the value exists; afterwards
/// the wrapper behaves as an ordinary bidirectional stream whose reads start
/// at the first payload byte. Consumers that care about client identity use
/// [`ProxiedStream::remote_addr`] instead of asking the socket.
pub struct ProxiedStream<S> {
    io: S,
    // bytes buffered during detection that belong to the application payload
    pending: BytesMut,
    peer_addr: SocketAddr,
    addrs: Option<ForwardedAddrs>,
}

impl<S: AsyncRead + Unpin> ProxiedStream<S> {
    /// Wrap a raw inbound stream, detecting and consuming a PROXY protocol
    /// v1 header if one is present.
    ///
    /// `peer_addr` is the transport-level peer, reported by
    /// [`ProxiedStream::remote_addr`] whenever no header declared a client
    /// address. A stream that starts with anything other than the 6-byte
    /// `PROXY ` prefix, or that ends before 6 bytes arrive, wraps
    /// successfully with no addresses and nothing consumed. A malformed
    /// header after the prefix is fatal: the error is returned, the stream is
    /// dropped and must not be read again, its bytes are split mid-protocol.
    ///
    /// Detection blocks until the prefix can be judged; owners that need a
    /// deadline wrap the call in [`tokio::time::timeout`].
    pub async fn wrap(io: S, peer_addr: SocketAddr) -> Result<Self, HeaderErrorKind> {
        let mut peeker = Peeker::new(io);

        let has_header = match peeker.peek(parser::PREFIX.len()).await {
            Ok(head) => head == parser::PREFIX,
            // a legitimate peer may close before 6 bytes, not a protocol error
            Err(HeaderErrorKind::InsufficientData(_)) => false,
            Err(err) => return Err(err),
        };

        let addrs = if has_header {
            parser::parse_header(&mut peeker).await?
        } else {
            debug!("no PROXY protocol header, keeping socket address");
            None
        };

        let (io, pending) = peeker.into_parts();
        Ok(ProxiedStream {
            io,
            pending,
            peer_addr,
            addrs,
        })
    }
}

impl<S> ProxiedStream<S> {
    /// Client-perspective peer address: the client address declared by the
    /// header, or the transport peer address when no header was parsed
    pub fn remote_addr(&self) -> SocketAddr {
        self.addrs.map(|a| a.client).unwrap_or(self.peer_addr)
    }

    /// Address the proxy declared for itself, `None` when no header was
    /// parsed
    pub fn proxy_addr(&self) -> Option<SocketAddr> {
        self.addrs.map(|a| a.proxy)
    }

    /// Shared reference to the raw stream
    pub fn get_ref(&self) -> &S {
        &self.io
    }

    /// Mutable reference to the raw stream.
    ///
    /// Reading from it directly skips bytes still buffered by the wrapper.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.io
    }

    /// Dismantle the wrapper into the raw stream and any payload bytes that
    /// were buffered during header detection but not yet read
    pub fn into_parts(self) -> (S, BytesMut) {
        (self.io, self.pending)
    }
}

impl ProxiedStream<TcpStream> {
    /// Wrap a freshly accepted TCP stream, using its socket peer address as
    /// the fallback for [`ProxiedStream::remote_addr`]
    pub async fn wrap_tcp(io: TcpStream) -> Result<Self, HeaderErrorKind> {
        let peer_addr = io.peer_addr()?;
        Self::wrap(io, peer_addr).await
    }

    /// Local address of the underlying socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.io.local_addr()
    }
}

impl<S> fmt::Debug for ProxiedStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ProxiedStream")
            .field("remote_addr", &self.remote_addr())
            .field("proxy_addr", &self.proxy_addr())
            .finish()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ProxiedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &mut ReadBuf,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        // serve bytes buffered during header detection first
        if !this.pending.is_empty() {
            let n = cmp::min(buf.remaining(), this.pending.len());
            buf.put_slice(&this.pending.split_to(n));
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.io).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ProxiedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().io).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}
