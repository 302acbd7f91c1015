//! Transparent PROXY protocol v1 connection decorator
//!
//! Servers behind a TCP load balancer only see the proxy's address on
//! accepted sockets. Proxies that speak the
//! [PROXY protocol](https://www.haproxy.org/download/1.8/doc/proxy-protocol.txt)
//! prepend one human-readable header line declaring the original client and
//! proxy addresses. [`ProxiedStream`] peeks a fresh connection for that
//! header, consumes it when present, and then serves reads and writes as an
//! ordinary bidirectional stream starting at the first payload byte.
//!
//! A connection with no header passes through untouched, so the wrapper is a
//! drop-in substitute for the raw stream whether or not a proxy sits in
//! front of it.
//!
//! ```no_run
//! use proxy_wrap::ProxiedStream;
//! use tokio::net::TcpListener;
//!
//! # async fn accept_one() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = TcpListener::bind("0.0.0.0:7777").await?;
//! let (stream, _) = listener.accept().await?;
//! let conn = ProxiedStream::wrap_tcp(stream).await?;
//! println!("client address: {}", conn.remote_addr());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

// Error module
pub mod error;
// Header line decoder
mod parser;
// Buffered look-ahead over the raw stream
mod peek;
// The decorator itself
mod stream;

pub use crate::{error::HeaderErrorKind, stream::ProxiedStream};
