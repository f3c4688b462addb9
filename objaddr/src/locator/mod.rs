//! # Module Location
//!
//! Given a raw instruction pointer, find the loaded module that contains it,
//! the address the loader placed it at, and its path on disk. This is the
//! cheap half of resolution: it never opens or parses the binary.
//!
//! ## Strategies
//!
//! Exactly one native strategy is compiled in, exposed as [`NativeLocator`]:
//!
//! - **Loader registry** (Linux, Android, FreeBSD): walk the dynamic loader's
//!   list of loaded objects with `dl_iterate_phdr`. Fast and safe against
//!   concurrent `dlopen`/`dlclose`.
//! - **Symbol probe** (other unix, or any unix with the `symbol-probe`
//!   feature): `dladdr`, which reports the containing object as a side effect
//!   of looking up the nearest symbol.
//! - **Module handle** (Windows): `GetModuleHandleExW` without touching the
//!   module's reference count, then a cached handle → path lookup.
//!
//! [`MappedModules`] is a table-driven locator independent of the platform,
//! built from `/proc/<pid>/maps` or from explicit records.
//!
//! A lookup that finds nothing is `Ok(None)`, a normal outcome for addresses
//! in generated code or stale captures. `Err` is reserved for OS failures,
//! which callers report and then treat exactly like `Ok(None)`.

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub mod loader_registry;
pub mod memory_maps;
#[cfg(windows)]
pub mod module_handle;
#[cfg(unix)]
pub mod symbol_probe;

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub use loader_registry::LoaderRegistryLocator;
pub use memory_maps::{MappedModule, MappedModules, MemoryRange};
#[cfg(windows)]
pub use module_handle::{ModuleHandleLocator, ModuleNameCache};
#[cfg(unix)]
pub use symbol_probe::SymbolProbeLocator;

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::domain::{FramePtr, LocateError, ModuleRecord};

/// Finds the module owning an address
pub trait ModuleLocator: Send + Sync {
    /// # Errors
    /// Returns an error only when the underlying OS query itself fails.
    fn locate(&self, address: FramePtr) -> Result<Option<ModuleRecord>, LocateError>;
}

impl<L: ModuleLocator + ?Sized> ModuleLocator for &L {
    fn locate(&self, address: FramePtr) -> Result<Option<ModuleRecord>, LocateError> {
        (**self).locate(address)
    }
}

impl<L: ModuleLocator + ?Sized> ModuleLocator for std::sync::Arc<L> {
    fn locate(&self, address: FramePtr) -> Result<Option<ModuleRecord>, LocateError> {
        (**self).locate(address)
    }
}

/// The platform's preferred locator
#[cfg(all(
    any(target_os = "linux", target_os = "android", target_os = "freebsd"),
    not(feature = "symbol-probe")
))]
pub type NativeLocator = LoaderRegistryLocator;

/// The platform's preferred locator
#[cfg(all(
    unix,
    any(
        feature = "symbol-probe",
        not(any(target_os = "linux", target_os = "android", target_os = "freebsd"))
    )
))]
pub type NativeLocator = SymbolProbeLocator;

/// The platform's preferred locator
#[cfg(windows)]
pub type NativeLocator = ModuleHandleLocator;

/// Path of the running executable, remembered after the first success
///
/// Loaders report the main program with an empty name, so its path has to be
/// recovered separately.
#[derive(Debug, Default)]
pub(crate) struct ExecutablePath {
    cached: OnceLock<PathBuf>,
}

impl ExecutablePath {
    pub(crate) fn get(&self) -> Result<PathBuf, LocateError> {
        if let Some(path) = self.cached.get() {
            return Ok(path.clone());
        }
        let path = std::env::current_exe().map_err(LocateError::ExecutablePath)?;
        Ok(self.cached.get_or_init(|| path).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_path_is_stable() {
        let exe = ExecutablePath::default();
        let first = exe.get().unwrap();
        let second = exe.get().unwrap();
        assert_eq!(first, second);
        assert!(!first.as_os_str().is_empty());
    }
}
