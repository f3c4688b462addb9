//! Capturing a frame must stay silent: it may run inside a crash handler.
//!
//! Installs a process-wide logger, so this binary holds a single test.

use log::{LevelFilter, Log, Metadata, Record};
use objaddr::diagnostics::NullSink;
use objaddr::{FramePtr, ImageBaseError, MappedModules, ObjectResolver};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingLogger {
    calls: AtomicUsize,
}

impl CountingLogger {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Log for CountingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, _record: &Record<'_>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn flush(&self) {}
}

static LOGGER: CountingLogger = CountingLogger { calls: AtomicUsize::new(0) };

#[inline(never)]
fn marker() -> u32 {
    11
}

#[test]
fn test_capture_safe_never_logs() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    #[cfg(any(unix, windows))]
    {
        let native = objaddr::NativeResolver::native();
        let frame = native.capture_safe(FramePtr::from(marker as usize));
        assert!(frame.is_resolved());
        assert_eq!(LOGGER.calls(), 0, "native capture logged");
    }

    let table = MappedModules::new().with("/app/libfoo.so", 0x5000, 0x9000);
    let source = |_: &Path| -> Result<u64, ImageBaseError> { Ok(0x400) };
    let resolver = ObjectResolver::with_sink(table, source, Arc::new(NullSink));

    let captured = resolver.capture_safe_batch(&[FramePtr(0x5080), FramePtr(0x9000)]);
    assert_eq!(LOGGER.calls(), 0, "table capture logged");

    // The logger is live: the expensive half does log
    let frame = resolver.resolve_safe(&captured[0]);
    assert_eq!(frame.object_address, 0x480);
    resolver.resolve(FramePtr(0x5080));
    assert!(LOGGER.calls() > 0);
    assert_eq!(marker(), 11);
}
