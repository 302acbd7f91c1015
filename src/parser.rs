//! Sequential decoder for the PROXY protocol v1 header line
//!
//! Format: `PROXY <INET_PROTO> <SRC_ADDR> <DST_ADDR> <SRC_PORT> <DST_PORT>\r\n`
//! or the literal `PROXY UNKNOWN\r\n`.
//!
//! Reference: https://www.haproxy.org/download/1.8/doc/proxy-protocol.txt

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use log::debug;
use tokio::io::AsyncRead;

use crate::{error::HeaderErrorKind, peek::Peeker};

/// Literal prefix every v1 header line starts with
pub(crate) const PREFIX: &[u8] = b"PROXY ";
/// Literal tail a proxy sends when it declines to report addresses
const UNKNOWN: &[u8] = b"UNKNOWN\r\n";
/// Family tokens, trailing separator included
const FAMILY_TCP4: &[u8] = b"TCP4 ";
const FAMILY_TCP6: &[u8] = b"TCP6 ";

/// Addresses declared by a fully parsed header line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ForwardedAddrs {
    /// Original client of the forwarded connection
    pub(crate) client: SocketAddr,
    /// Proxy that forwarded it
    pub(crate) proxy: SocketAddr,
}

/// Decode one header line whose prefix has already been matched by a peek.
///
/// Each step consumes exactly the bytes it expects and fails with a distinct
/// error kind on mismatch. Every consuming step is destructive: an error
/// leaves the stream desynchronized and the connection must be discarded,
/// there is no rollback.
pub(crate) async fn parse_header<S: AsyncRead + Unpin>(
    peeker: &mut Peeker<S>,
) -> Result<Option<ForwardedAddrs>, HeaderErrorKind> {
    peeker.skip(PREFIX.len()).await?;

    if peeker.peek(UNKNOWN.len()).await? == UNKNOWN {
        peeker.skip(UNKNOWN.len()).await?;
        debug!("PROXY UNKNOWN header, keeping socket address");
        return Ok(None);
    }

    // TCP4 and TCP6 share the textual address grammar below, the token is
    // only validated
    let family = peeker.take(FAMILY_TCP4.len()).await?;
    if family != FAMILY_TCP4 && family != FAMILY_TCP6 {
        return Err(HeaderErrorKind::UnrecognizedFamily(lossy(&family)));
    }

    let client_ip = read_ip(peeker).await?;
    let proxy_ip = read_ip(peeker).await?;
    let client_port = read_port(peeker, b' ').await?;
    let proxy_port = read_port(peeker, b'\r').await?;

    match peeker.read_byte().await {
        Ok(b'\n') => {}
        Ok(other) => return Err(HeaderErrorKind::InvalidTrailer(Some(other))),
        Err(_) => return Err(HeaderErrorKind::InvalidTrailer(None)),
    }

    let addrs = ForwardedAddrs {
        client: SocketAddr::new(client_ip, client_port),
        proxy: SocketAddr::new(proxy_ip, proxy_port),
    };
    debug!(
        "PROXY v1 parsed: client={} proxy={}",
        addrs.client, addrs.proxy
    );
    Ok(Some(addrs))
}

/// Consume one space-terminated field and parse it as a textual IP address,
/// dotted-decimal or colon-hex
async fn read_ip<S: AsyncRead + Unpin>(peeker: &mut Peeker<S>) -> Result<IpAddr, HeaderErrorKind> {
    let field = peeker.read_until(b' ').await?;
    std::str::from_utf8(&field)
        .ok()
        .and_then(|s| s.parse::<IpAddr>().ok())
        .ok_or_else(|| HeaderErrorKind::InvalidAddress(lossy(&field)))
}

/// Consume one `delim`-terminated field and parse it as a base-10 port
async fn read_port<S: AsyncRead + Unpin>(
    peeker: &mut Peeker<S>,
    delim: u8,
) -> Result<u16, HeaderErrorKind> {
    let field = peeker.read_until(delim).await?;
    std::str::from_utf8(&field)
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| HeaderErrorKind::InvalidPort(lossy(&field)))
}

fn lossy(field: &Bytes) -> String {
    String::from_utf8_lossy(field).into_owned()
}
