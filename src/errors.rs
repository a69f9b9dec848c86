//! A module to handle errors

use std::fmt;
use std::io;

/// An error enum which covers decoding and encoding failures
#[derive(Debug)]
pub enum Error {
    /// Io error
    Io(io::Error),
    /// The source reached end of stream before the requested primitive
    /// was complete
    Underflow,
    /// A single primitive was requested which is larger than the window
    /// capacity
    BufferTooSmall {
        /// Physical size of the window
        capacity: usize,
        /// Bytes the primitive needed resident at once
        required: usize,
    },
    /// The output buffer has no room left for the write
    OutputBufferTooSmall,
    /// A caller-supplied argument is invalid
    InvalidArgument(&'static str),
    /// A string payload does not follow the two-mode encoding
    MalformedString(&'static str),
}

/// A wrapper for the proper error handling
pub type Result<T> = ::std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::Io(e) => e,
            Error::Underflow => io::Error::new(io::ErrorKind::UnexpectedEof, Error::Underflow),
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Underflow => write!(f, "buffer underflow"),
            Error::BufferTooSmall {
                capacity,
                required,
            } => write!(f, "buffer too small: capacity: {capacity}, required: {required}"),
            Error::OutputBufferTooSmall => write!(f, "output buffer too small"),
            Error::InvalidArgument(s) => write!(f, "invalid argument: {s}"),
            Error::MalformedString(s) => write!(f, "malformed string: {s}"),
        }
    }
}
