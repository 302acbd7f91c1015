//! The error types

use std::io::Error as IOError;
use thiserror::Error;

#[derive(Error, Debug)]
/// Header parse error
pub enum HeaderErrorKind {
    /// IO error
    #[error("proxy header io error: `{0:?}`")]
    Io(#[from] IOError),
    /// Fewer bytes than requested could be buffered, either because the
    /// peer closed the stream or because the look-ahead capacity was reached
    #[error("could not buffer `{0}` bytes, stream closed or capacity reached")]
    InsufficientData(usize),
    /// Inet family token is neither `TCP4` nor `TCP6`
    #[error("unrecognized inet family: `{0}`")]
    UnrecognizedFamily(String),
    /// Address field is not a textual IP address
    #[error("cannot parse IP address: `{0}`")]
    InvalidAddress(String),
    /// Port field is not a base-10 port number
    #[error("cannot parse port: `{0}`")]
    InvalidPort(String),
    /// Header line does not end with LF, `None` means the byte could not be read
    #[error("invalid trailing byte: `{0:?}`")]
    InvalidTrailer(Option<u8>),
}
