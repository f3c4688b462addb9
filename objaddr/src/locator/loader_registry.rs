//! Module lookup through the dynamic loader's registry (`dl_iterate_phdr`).
//!
//! The loader hands the callback every loaded object in turn, holding its own
//! lock for the duration, so concurrent `dlopen`/`dlclose` cannot tear the
//! walk. The same lock makes the walk unsafe from a signal handler that
//! interrupted `dlopen`/`dlclose` on this thread: it is not async-signal-safe.
//! The main program appears with an empty name.

#![allow(unsafe_code)] // dl_iterate_phdr is an FFI callback API

use std::ffi::{CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use super::{ExecutablePath, ModuleLocator};
use crate::domain::{FramePtr, LocateError, ModuleRecord};

/// Locator backed by `dl_iterate_phdr`
#[derive(Debug, Default)]
pub struct LoaderRegistryLocator {
    executable: ExecutablePath,
}

impl LoaderRegistryLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// State threaded through the loader callback
struct Search {
    address: u64,
    found: Option<Found>,
}

struct Found {
    /// `None` for the main program
    name: Option<PathBuf>,
    runtime_base: u64,
}

impl ModuleLocator for LoaderRegistryLocator {
    fn locate(&self, address: FramePtr) -> Result<Option<ModuleRecord>, LocateError> {
        let mut search = Search { address: address.get(), found: None };

        // SAFETY: the callback only dereferences what the loader passes it and
        // `search` outlives the call.
        unsafe {
            libc::dl_iterate_phdr(Some(callback), std::ptr::addr_of_mut!(search).cast());
        }

        let Some(found) = search.found else {
            return Ok(None);
        };
        let path = match found.name {
            Some(name) => name,
            None => self.executable.get()?,
        };
        Ok(Some(ModuleRecord::new(path, found.runtime_base)))
    }
}

unsafe extern "C" fn callback(
    info: *mut libc::dl_phdr_info,
    _size: libc::size_t,
    data: *mut libc::c_void,
) -> libc::c_int {
    let search = &mut *data.cast::<Search>();
    let info = &*info;
    if info.dlpi_phdr.is_null() {
        return 0;
    }

    let bias = u64::from(info.dlpi_addr);
    let headers = std::slice::from_raw_parts(info.dlpi_phdr, usize::from(info.dlpi_phnum));

    let mut lowest_vaddr: Option<u64> = None;
    let mut contains = false;
    for header in headers.iter().filter(|header| header.p_type == libc::PT_LOAD) {
        let vaddr = u64::from(header.p_vaddr);
        let start = bias.wrapping_add(vaddr);
        let end = start.wrapping_add(u64::from(header.p_memsz));
        if (start..end).contains(&search.address) {
            contains = true;
        }
        lowest_vaddr = Some(lowest_vaddr.map_or(vaddr, |lowest| lowest.min(vaddr)));
    }

    let Some(lowest_vaddr) = lowest_vaddr.filter(|_| contains) else {
        return 0;
    };

    let name = if info.dlpi_name.is_null() || *info.dlpi_name == 0 {
        None
    } else {
        let bytes = CStr::from_ptr(info.dlpi_name).to_bytes();
        Some(PathBuf::from(OsStr::from_bytes(bytes)))
    };

    search.found = Some(Found { name, runtime_base: bias.wrapping_add(lowest_vaddr) });
    // Non-zero stops the walk
    1
}
