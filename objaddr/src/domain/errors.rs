//! Structured error types for objaddr
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these ever escape a batch: the resolver reports them to a
//! diagnostic sink and degrades to an unresolved frame.

use object::FileKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of an OS module lookup primitive
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("failed to determine the running executable's path: {0}")]
    ExecutablePath(#[source] io::Error),

    #[error("module lookup failed: {0}")]
    Os(#[source] io::Error),
}

/// Failure to extract a link-time image base from a binary
#[derive(Error, Debug)]
pub enum ImageBaseError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed binary headers: {0}")]
    Parse(#[from] object::Error),

    #[error("unsupported binary format: {0:?}")]
    UnsupportedFormat(FileKind),

    #[error("ELF file has no PT_LOAD program headers")]
    NoLoadableSegments,

    #[error("Mach-O file has no __TEXT segment")]
    NoTextSegment,

    #[error("universal binary has no slice for the host architecture")]
    NoMatchingArchitecture,
}

impl ImageBaseError {
    /// Whether retrying later in the same process could succeed
    ///
    /// I/O failures may be transient; a file that parsed wrong once will parse
    /// wrong again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ImageBaseError::Io { .. })
    }
}

/// Failure to read or parse a process memory map listing
#[derive(Error, Debug)]
pub enum MapsError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed maps line {line}: {reason}")]
    Malformed { line: usize, reason: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_transient() {
        let err = ImageBaseError::Io {
            path: PathBuf::from("/usr/lib/libfoo.so"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("/usr/lib/libfoo.so"));
    }

    #[test]
    fn test_format_errors_are_permanent() {
        assert!(!ImageBaseError::NoLoadableSegments.is_transient());
        assert!(!ImageBaseError::UnsupportedFormat(FileKind::DyldCache).is_transient());
    }

    #[test]
    fn test_malformed_maps_display() {
        let err = MapsError::Malformed { line: 3, reason: "missing address range" };
        assert_eq!(err.to_string(), "malformed maps line 3: missing address range");
    }
}
