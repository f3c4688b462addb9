//! Failure reporting for address resolution.
//!
//! Nothing that goes wrong while resolving one address is allowed to abort the
//! rest of a batch, so OS and file-format failures are handed to a
//! [`DiagnosticSink`] instead of being returned. The default sink forwards to
//! the `log` facade; tests and embedders can install their own.

use log::warn;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::domain::{FramePtr, ImageBaseError, LocateError};

/// A non-fatal failure observed while resolving an address
#[derive(Debug)]
pub enum Diagnostic<'a> {
    /// The OS module lookup failed; the address is reported as unresolved
    LocateFailed { address: FramePtr, error: &'a LocateError },
    /// The binary could not be read or parsed; its image base is taken as 0
    ImageBaseUnavailable { path: &'a Path, error: &'a ImageBaseError },
    /// `address - runtime_base + image_base` left the address range
    AddressOverflow { address: FramePtr, runtime_base: u64, image_base: u64 },
}

/// Discriminant of a [`Diagnostic`], for matching without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    LocateFailed,
    ImageBaseUnavailable,
    AddressOverflow,
}

impl Diagnostic<'_> {
    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::LocateFailed { .. } => DiagnosticKind::LocateFailed,
            Diagnostic::ImageBaseUnavailable { .. } => DiagnosticKind::ImageBaseUnavailable,
            Diagnostic::AddressOverflow { .. } => DiagnosticKind::AddressOverflow,
        }
    }
}

impl std::fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::LocateFailed { address, error } => {
                write!(f, "could not locate module for {address}: {error}")
            }
            Diagnostic::ImageBaseUnavailable { path, error } => {
                write!(f, "no image base for {}: {error}", path.display())
            }
            Diagnostic::AddressOverflow { address, runtime_base, image_base } => write!(
                f,
                "address {address} does not fit module (runtime base 0x{runtime_base:x}, image base 0x{image_base:x})"
            ),
        }
    }
}

/// Receiver for non-fatal resolution failures
///
/// Called from whichever thread hit the failure, possibly with internal locks
/// held, so implementations must not call back into the resolver.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic<'_>);
}

/// Forwards every diagnostic to `log::warn!`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: &Diagnostic<'_>) {
        warn!("{diagnostic}");
    }
}

/// Drops every diagnostic
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _diagnostic: &Diagnostic<'_>) {}
}

/// Keeps every diagnostic it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(DiagnosticKind, String)>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far, oldest first
    pub fn records(&self) -> Vec<(DiagnosticKind, String)> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of reports of the given kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: &Diagnostic<'_>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((diagnostic.kind(), diagnostic.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_recording_sink_keeps_order_and_kind() {
        let sink = RecordingSink::new();
        let locate = LocateError::Os(io::Error::from(io::ErrorKind::NotFound));
        sink.report(&Diagnostic::LocateFailed { address: FramePtr(0x10), error: &locate });
        sink.report(&Diagnostic::AddressOverflow {
            address: FramePtr(0x10),
            runtime_base: 0x20,
            image_base: 0,
        });

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, DiagnosticKind::LocateFailed);
        assert!(records[0].1.contains("0x0000000000000010"));
        assert_eq!(records[1].0, DiagnosticKind::AddressOverflow);
        assert_eq!(sink.count(DiagnosticKind::ImageBaseUnavailable), 0);
    }

    #[test]
    fn test_image_base_diagnostic_mentions_path() {
        let error = ImageBaseError::NoTextSegment;
        let diagnostic = Diagnostic::ImageBaseUnavailable {
            path: Path::new("/usr/lib/libfoo.dylib"),
            error: &error,
        };
        assert_eq!(diagnostic.kind(), DiagnosticKind::ImageBaseUnavailable);
        assert!(diagnostic.to_string().starts_with("no image base for /usr/lib/libfoo.dylib"));
    }
}
