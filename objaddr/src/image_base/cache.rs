//! Per-module memoization of image bases.
//!
//! One mutex guards the whole map and is held across both the lookup and, on
//! a miss, the parse that fills it. Concurrent misses on *different* paths
//! therefore serialize, but two threads can never parse the same binary
//! twice. Binaries are assumed not to change on disk while mapped, so entries
//! are never invalidated.

use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::ImageBaseSource;
use crate::diagnostics::{Diagnostic, DiagnosticSink, LogSink};

/// Memoizing front for an [`ImageBaseSource`]
pub struct ImageBaseCache<S> {
    source: S,
    entries: Mutex<HashMap<PathBuf, u64>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl<S: ImageBaseSource> ImageBaseCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_sink(source, Arc::new(LogSink))
    }

    pub fn with_sink(source: S, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { source, entries: Mutex::new(HashMap::new()), sink }
    }

    /// Image base of the module at `path`, computing it on first use
    ///
    /// Fails closed: if the source errors, the failure is reported to the sink
    /// and `0` is returned. Format errors are remembered as `0`; I/O errors are
    /// not stored, so a later call may try again.
    pub fn image_base_of(&self, path: &Path) -> u64 {
        // Entries are plain integers, a panic elsewhere cannot leave them torn
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&base) = entries.get(path) {
            return base;
        }

        debug!("Image base cache miss for {}", path.display());
        match self.source.image_base(path) {
            Ok(base) => {
                entries.insert(path.to_path_buf(), base);
                base
            }
            Err(error) => {
                self.sink.report(&Diagnostic::ImageBaseUnavailable { path, error: &error });
                if !error.is_transient() {
                    entries.insert(path.to_path_buf(), 0);
                }
                0
            }
        }
    }

    /// Whether a value for `path` is already stored
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, RecordingSink};
    use crate::domain::ImageBaseError;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that counts how often it is asked
    struct CountingSource {
        calls: AtomicUsize,
        result: fn(&Path) -> Result<u64, ImageBaseError>,
    }

    impl CountingSource {
        fn new(result: fn(&Path) -> Result<u64, ImageBaseError>) -> Self {
            Self { calls: AtomicUsize::new(0), result }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ImageBaseSource for CountingSource {
        fn image_base(&self, path: &Path) -> Result<u64, ImageBaseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)(path)
        }
    }

    #[test]
    fn test_hit_does_not_reparse() {
        let cache = ImageBaseCache::new(CountingSource::new(|_| Ok(0x40_0000)));
        let path = Path::new("/usr/bin/app");

        assert_eq!(cache.image_base_of(path), 0x40_0000);
        assert_eq!(cache.image_base_of(path), 0x40_0000);
        assert_eq!(cache.source().calls(), 1);
        assert!(cache.contains(path));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_paths_parse_once_each() {
        let cache = ImageBaseCache::new(CountingSource::new(|path| {
            Ok(if path.ends_with("libfoo.so") { 0x400 } else { 0 })
        }));

        for _ in 0..3 {
            assert_eq!(cache.image_base_of(Path::new("/lib/libfoo.so")), 0x400);
            assert_eq!(cache.image_base_of(Path::new("/bin/main")), 0);
        }
        assert_eq!(cache.source().calls(), 2);
    }

    #[test]
    fn test_io_failure_is_retried() {
        let sink = Arc::new(RecordingSink::new());
        let cache = ImageBaseCache::with_sink(
            CountingSource::new(|path| {
                Err(ImageBaseError::Io {
                    path: path.to_path_buf(),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                })
            }),
            sink.clone(),
        );
        let path = Path::new("/opt/locked/libbar.so");

        assert_eq!(cache.image_base_of(path), 0);
        assert_eq!(cache.image_base_of(path), 0);
        assert_eq!(cache.source().calls(), 2);
        assert!(!cache.contains(path));
        assert_eq!(sink.count(DiagnosticKind::ImageBaseUnavailable), 2);
    }

    #[test]
    fn test_format_failure_is_remembered() {
        let sink = Arc::new(RecordingSink::new());
        let cache = ImageBaseCache::with_sink(
            CountingSource::new(|_| Err(ImageBaseError::NoLoadableSegments)),
            sink.clone(),
        );
        let path = Path::new("/lib/libweird.so");

        assert_eq!(cache.image_base_of(path), 0);
        assert_eq!(cache.image_base_of(path), 0);
        assert_eq!(cache.source().calls(), 1);
        assert_eq!(sink.count(DiagnosticKind::ImageBaseUnavailable), 1);
    }
}
