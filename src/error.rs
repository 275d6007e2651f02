//! Error kinds for the container engine (spec.md §7).

use std::fmt;

/// A path component, kept around for error messages.
///
/// `fmt_extra::AsciiStr` is used elsewhere for formatting raw on-disk name
/// bytes; this type formats a component that is already known to be valid
/// UTF-8 (it came from the CLI or from a decoded, validated slot name).
#[derive(Debug, Clone)]
pub struct Component(pub String);

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("container I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("short transfer: expected {expected} bytes, got {got}")]
    ShortIo { expected: usize, got: usize },

    #[error("sector {0} is out of range")]
    OutOfRange(u32),

    #[error("no free sectors remain in container")]
    NoSpace,

    #[error("path component not found: {0}")]
    NotFound(Component),

    #[error("invalid path component {name:?}: {reason}")]
    BadName { name: String, reason: &'static str },

    #[error("corrupt on-disk structure at sector {sector}: {reason}")]
    Corrupt { sector: u32, reason: &'static str },

    #[error("container already exists")]
    AlreadyExists,

    #[error("'{0}' is not supported")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
