//! Module lookup through `dladdr`.
//!
//! Portable across unix flavours and thread safe, but slower than walking the
//! loader registry because it also searches for the nearest symbol.

#![allow(unsafe_code)] // dladdr is FFI

use std::ffi::{CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use super::{ExecutablePath, ModuleLocator};
use crate::domain::{FramePtr, LocateError, ModuleRecord};

/// Locator backed by `dladdr`
#[derive(Debug, Default)]
pub struct SymbolProbeLocator {
    executable: ExecutablePath,
}

impl SymbolProbeLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleLocator for SymbolProbeLocator {
    fn locate(&self, address: FramePtr) -> Result<Option<ModuleRecord>, LocateError> {
        let Ok(ptr) = usize::try_from(address.get()) else {
            return Ok(None);
        };

        // SAFETY: dladdr only reads the loader's tables and writes `info`.
        let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
        let found = unsafe { libc::dladdr(ptr as *const libc::c_void, &mut info) };
        if found == 0 || info.dli_fbase.is_null() {
            return Ok(None);
        }

        let path = if info.dli_fname.is_null() || unsafe { *info.dli_fname } == 0 {
            self.executable.get()?
        } else {
            // SAFETY: dladdr returned a NUL-terminated name owned by the loader
            let bytes = unsafe { CStr::from_ptr(info.dli_fname) }.to_bytes();
            PathBuf::from(OsStr::from_bytes(bytes))
        };
        let runtime_base = info.dli_fbase as usize as u64;

        Ok(Some(ModuleRecord::new(path, runtime_base)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn marker() -> u32 {
        7
    }

    #[test]
    fn test_locates_own_code() {
        let locator = SymbolProbeLocator::new();
        let address = FramePtr::from(marker as usize);

        let module = locator.locate(address).unwrap().expect("test binary is a loaded module");
        assert!(!module.path.as_os_str().is_empty());
        assert!(module.runtime_base <= address.get());
        assert_eq!(marker(), 7);
    }

    #[test]
    fn test_unmapped_address() {
        let locator = SymbolProbeLocator::new();
        assert!(locator.locate(FramePtr(0x10)).unwrap().is_none());
    }
}
