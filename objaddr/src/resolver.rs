//! Object resolution: raw addresses to link-time addresses.
//!
//! [`ObjectResolver`] composes a [`ModuleLocator`] with an [`ImageBaseCache`]:
//!
//! ```text
//! object_address = address - runtime_base(module) + image_base(module)
//! ```
//!
//! The computation can also be split in time. [`ObjectResolver::capture_safe`]
//! performs only the module lookup and stores `address - runtime_base`; it
//! never opens a file, so a crash handler can call it on the spot.
//! [`ObjectResolver::resolve_safe`] adds the image base later, from ordinary
//! code. As long as no module is unloaded in between, both routes give the
//! same answer.

use log::debug;
use std::path::Path;
use std::sync::Arc;

use crate::diagnostics::{Diagnostic, DiagnosticSink, LogSink};
use crate::domain::{FramePtr, ModuleRecord, ObjectFrame, SafeObjectFrame};
use crate::image_base::{ImageBaseCache, ImageBaseSource};
use crate::locator::ModuleLocator;

#[cfg(any(unix, windows))]
use crate::{image_base::ObjectFileBase, locator::NativeLocator};

/// Resolver for the running process: native locator, on-disk binaries
#[cfg(any(unix, windows))]
pub type NativeResolver = ObjectResolver<NativeLocator, ObjectFileBase>;

/// Turns raw addresses into [`ObjectFrame`]s
///
/// Safe to share between threads; every method takes `&self`.
pub struct ObjectResolver<L, S> {
    locator: L,
    cache: ImageBaseCache<S>,
    sink: Arc<dyn DiagnosticSink>,
}

#[cfg(any(unix, windows))]
impl NativeResolver {
    /// Resolver for this process, logging failures through `log`
    #[must_use]
    pub fn native() -> Self {
        Self::new(NativeLocator::default(), ObjectFileBase)
    }
}

impl<L: ModuleLocator, S: ImageBaseSource> ObjectResolver<L, S> {
    pub fn new(locator: L, source: S) -> Self {
        Self::with_sink(locator, source, Arc::new(LogSink))
    }

    /// Like [`new`](Self::new), reporting failures to `sink`
    pub fn with_sink(locator: L, source: S, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { locator, cache: ImageBaseCache::with_sink(source, sink.clone()), sink }
    }

    /// Resolve one address
    ///
    /// Addresses outside every known module, and any failure along the way,
    /// give [`ObjectFrame::unresolved`].
    pub fn resolve(&self, address: FramePtr) -> ObjectFrame {
        let Some(module) = self.locate(address) else {
            return ObjectFrame::unresolved(address);
        };
        let image_base = self.cache.image_base_of(&module.path);

        match module.object_address(address, image_base) {
            Some(object_address) => {
                debug!(
                    "{address} is in {} loaded at 0x{:x}, object address 0x{object_address:x}",
                    module.path.display(),
                    module.runtime_base
                );
                ObjectFrame { raw_address: address, object_address, object_path: module.path }
            }
            None => {
                self.sink.report(&Diagnostic::AddressOverflow {
                    address,
                    runtime_base: module.runtime_base,
                    image_base,
                });
                ObjectFrame::unresolved(address)
            }
        }
    }

    /// Resolve every address, preserving input order
    pub fn resolve_batch(&self, addresses: &[FramePtr]) -> Vec<ObjectFrame> {
        let frames: Vec<ObjectFrame> =
            addresses.iter().map(|&address| self.resolve(address)).collect();
        debug!(
            "Resolved {} of {} frames",
            frames.iter().filter(|frame| frame.is_resolved()).count(),
            frames.len()
        );
        frames
    }

    /// First half of deferred resolution: identify the module only
    ///
    /// Never consults the image base cache, parses a binary or logs. Failures
    /// still reach the diagnostic sink, so callers in a signal handler should
    /// install one that does neither I/O nor locking, such as
    /// [`NullSink`](crate::diagnostics::NullSink).
    ///
    /// The loader registry walk takes the dynamic loader's own lock. A signal
    /// that interrupts `dlopen` or `dlclose` on the same thread can therefore
    /// deadlock here; the `dladdr` and Windows strategies have the same
    /// limitation. The first lookup of an address in the main executable also
    /// resolves its path through `current_exe`, which allocates.
    pub fn capture_safe(&self, address: FramePtr) -> SafeObjectFrame {
        let Some(module) = self.locate(address) else {
            return SafeObjectFrame::unresolved(address);
        };

        match address.checked_offset_from(module.runtime_base) {
            Some(offset) => SafeObjectFrame {
                raw_address: address,
                address_relative_to_object_start: offset,
                object_path: module.path,
            },
            None => {
                self.sink.report(&Diagnostic::AddressOverflow {
                    address,
                    runtime_base: module.runtime_base,
                    image_base: 0,
                });
                SafeObjectFrame::unresolved(address)
            }
        }
    }

    pub fn capture_safe_batch(&self, addresses: &[FramePtr]) -> Vec<SafeObjectFrame> {
        addresses.iter().map(|&address| self.capture_safe(address)).collect()
    }

    /// Second half of deferred resolution: add the module's image base
    pub fn resolve_safe(&self, frame: &SafeObjectFrame) -> ObjectFrame {
        if !frame.is_resolved() {
            return ObjectFrame::unresolved(frame.raw_address);
        }
        let image_base = self.cache.image_base_of(&frame.object_path);

        match frame.address_relative_to_object_start.checked_add(image_base) {
            Some(object_address) => ObjectFrame {
                raw_address: frame.raw_address,
                object_address,
                object_path: frame.object_path.clone(),
            },
            None => {
                self.sink.report(&Diagnostic::AddressOverflow {
                    address: frame.raw_address,
                    runtime_base: frame
                        .raw_address
                        .get()
                        .wrapping_sub(frame.address_relative_to_object_start),
                    image_base,
                });
                ObjectFrame::unresolved(frame.raw_address)
            }
        }
    }

    pub fn resolve_safe_batch(&self, frames: &[SafeObjectFrame]) -> Vec<ObjectFrame> {
        frames.iter().map(|frame| self.resolve_safe(frame)).collect()
    }

    /// Image base of the module at `path`, through the cache
    pub fn image_base_of(&self, path: &Path) -> u64 {
        self.cache.image_base_of(path)
    }

    pub fn cache(&self) -> &ImageBaseCache<S> {
        &self.cache
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Module lookup with failures reported and folded into "not found"
    fn locate(&self, address: FramePtr) -> Option<ModuleRecord> {
        match self.locator.locate(address) {
            Ok(Some(module)) if !module.path.as_os_str().is_empty() => Some(module),
            Ok(_) => None,
            Err(error) => {
                self.sink.report(&Diagnostic::LocateFailed { address, error: &error });
                None
            }
        }
    }
}
