//! Module lookup through Windows module handles.
//!
//! `GetModuleHandleExW` maps an address to the `HMODULE` of the image that
//! contains it; the handle value is the image's load address. The lookup
//! leaves the reference count alone, so it neither pins nor releases the
//! module. Turning a handle into a path costs a second system call, so those
//! results are memoized per handle in [`ModuleNameCache`].

#![allow(unsafe_code)] // Win32 FFI

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::os::windows::ffi::OsStringExt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use windows_sys::Win32::Foundation::{HMODULE, MAX_PATH};
use windows_sys::Win32::System::LibraryLoader::{
    GetModuleFileNameW, GetModuleHandleExW, GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS,
    GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
};

use super::ModuleLocator;
use crate::domain::{FramePtr, LocateError, ModuleRecord};

/// Longest path `GetModuleFileNameW` can produce, in UTF-16 units
const MAX_LONG_PATH: usize = 32_768;

/// Memoized `HMODULE` → path lookups
///
/// Handles stay valid for as long as the module is loaded, so entries are
/// never invalidated. Failed lookups are not stored. Guarded by its own lock,
/// independent of the image base cache.
#[derive(Debug, Default)]
pub struct ModuleNameCache {
    names: Mutex<HashMap<usize, PathBuf>>,
}

impl ModuleNameCache {
    /// Path of the module behind `handle`
    ///
    /// # Errors
    /// Returns the OS error if `GetModuleFileNameW` fails.
    pub fn path_of(&self, handle: HMODULE) -> Result<PathBuf, LocateError> {
        let key = handle as usize;
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = names.get(&key) {
            return Ok(path.clone());
        }

        let path = module_file_name(handle).map_err(LocateError::Os)?;
        names.insert(key, path.clone());
        Ok(path)
    }

    pub fn len(&self) -> usize {
        self.names.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn module_file_name(handle: HMODULE) -> io::Result<PathBuf> {
    let mut buffer = vec![0u16; MAX_PATH as usize];
    loop {
        let capacity = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        // SAFETY: the buffer is writable for `capacity` UTF-16 units
        let len = unsafe { GetModuleFileNameW(handle, buffer.as_mut_ptr(), capacity) } as usize;
        if len == 0 {
            return Err(io::Error::last_os_error());
        }
        // A full buffer means the name was truncated
        if len < buffer.len() || buffer.len() >= MAX_LONG_PATH {
            buffer.truncate(len);
            return Ok(PathBuf::from(OsString::from_wide(&buffer)));
        }
        buffer.resize(buffer.len() * 2, 0);
    }
}

/// Locator backed by `GetModuleHandleExW`
#[derive(Debug, Default)]
pub struct ModuleHandleLocator {
    names: ModuleNameCache,
}

impl ModuleHandleLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> &ModuleNameCache {
        &self.names
    }
}

impl ModuleLocator for ModuleHandleLocator {
    fn locate(&self, address: FramePtr) -> Result<Option<ModuleRecord>, LocateError> {
        let Ok(ptr) = usize::try_from(address.get()) else {
            return Ok(None);
        };

        let mut handle: HMODULE = 0;
        // SAFETY: with FROM_ADDRESS the name argument is only used as an
        // address; UNCHANGED_REFCOUNT keeps the module's load state untouched.
        let ok = unsafe {
            GetModuleHandleExW(
                GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS
                    | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
                ptr as *const u16,
                &mut handle,
            )
        };
        if ok == 0 {
            return Err(LocateError::Os(io::Error::last_os_error()));
        }

        let path = self.names.path_of(handle)?;
        let runtime_base = handle as usize as u64;
        Ok(Some(ModuleRecord::new(path, runtime_base)))
    }
}
