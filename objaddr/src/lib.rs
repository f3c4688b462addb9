//! # objaddr - Raw Instruction Pointers to Link-Time Addresses
//!
//! Stack unwinding yields runtime instruction pointers. ASLR places every
//! executable and shared library at a different address on each run, while
//! the debug information inside those binaries is expressed relative to the
//! addresses the linker chose. Before any line-table lookup can happen, each
//! raw address has to be mapped to the binary that contains it and rebased
//! into that binary's link-time address space. That is all this crate does.
//!
//! ## Architecture Overview
//!
//! ```text
//!   raw addresses (from an unwinder)
//!        │
//!        ▼
//! ┌──────────────────┐  module path,   ┌────────────────────┐
//! │  ModuleLocator   │  runtime base   │   ObjectResolver   │
//! │ dl_iterate_phdr  │────────────────▶│                    │
//! │ dladdr / HMODULE │                 │ addr - runtime     │
//! │ /proc/pid/maps   │                 │      + image base  │
//! └──────────────────┘                 └─────────┬──────────┘
//!                                                │ path
//!                                                ▼
//!                                      ┌────────────────────┐
//!                                      │   ImageBaseCache   │ one parse per
//!                                      │  ELF / Mach-O / PE │ module per process
//!                                      └────────────────────┘
//!        │
//!        ▼
//!   ObjectFrame { raw_address, object_address, object_path }
//! ```
//!
//! ## Module Structure
//!
//! - [`domain`]: `FramePtr`, `ModuleRecord`, `ObjectFrame`, `SafeObjectFrame`
//!   and the error types
//! - [`locator`]: per-platform module lookup, plus a `/proc/<pid>/maps`
//!   table usable for other processes
//! - [`image_base`]: link-time base extraction per binary format and the
//!   per-path cache in front of it
//! - [`resolver`]: one-shot, batch and deferred ("safe") resolution
//! - [`diagnostics`]: where non-fatal failures go
//!
//! ## Deferred Resolution
//!
//! Parsing a binary allocates, does I/O and takes locks, none of which is
//! acceptable inside, say, a signal handler. [`ObjectResolver::capture_safe`]
//! only identifies the module and records the offset into it;
//! [`ObjectResolver::resolve_safe`] finishes the job later:
//!
//! ```rust,ignore
//! let resolver = objaddr::global();
//! let captured = resolver.capture_safe_batch(&addresses); // at crash time
//! // ... later, in normal execution
//! let frames = resolver.resolve_safe_batch(&captured);
//! ```
//!
//! ## Failure Model
//!
//! Resolution never fails as a whole. An address outside every module, an OS
//! lookup error or an unreadable binary each affect only that frame, which
//! comes back with an empty path and a zero object address (or a zero image
//! base). Details go to a [`DiagnosticSink`], by default the `log` facade.
//!
//! ## Limitations
//!
//! - Mach-O images with more than one `__TEXT` segment use the first one
//! - JIT code and anonymous mappings are never resolved
//! - Nothing is cached across process restarts

pub mod cli;
pub mod diagnostics;
pub mod domain;
pub mod image_base;
pub mod locator;
pub mod process_lookup;
pub mod resolver;

pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, LogSink, RecordingSink};
pub use domain::{FramePtr, ImageBaseError, LocateError, ModuleRecord, ObjectFrame, SafeObjectFrame};
pub use image_base::{ImageBaseCache, ImageBaseSource, ObjectFileBase};
pub use locator::{MappedModules, ModuleLocator};
pub use resolver::ObjectResolver;

#[cfg(any(unix, windows))]
pub use locator::NativeLocator;
#[cfg(any(unix, windows))]
pub use resolver::NativeResolver;

#[cfg(any(unix, windows))]
static GLOBAL: std::sync::OnceLock<NativeResolver> = std::sync::OnceLock::new();

/// Process-wide resolver for the running process, created on first use
#[cfg(any(unix, windows))]
pub fn global() -> &'static NativeResolver {
    GLOBAL.get_or_init(NativeResolver::native)
}
