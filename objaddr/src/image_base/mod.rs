//! # Link-Time Image Bases
//!
//! Debug and symbol information inside a binary is expressed relative to the
//! addresses the linker assigned, while captured instruction pointers are
//! runtime addresses shifted by ASLR. Translating one into the other needs the
//! link-time *image base* declared in the binary's own headers:
//!
//! | format | image base |
//! |---|---|
//! | ELF | lowest `p_vaddr` of any `PT_LOAD` program header |
//! | Mach-O | `vmaddr` of the first `__TEXT` segment command |
//! | PE | optional header `ImageBase` |
//!
//! Universal (fat) Mach-O files are narrowed to the slice for the running
//! architecture first.
//!
//! Parsing is done on demand through [`ImageBaseSource`] and memoized per path
//! by [`ImageBaseCache`].

pub mod cache;
pub mod elf;
pub mod macho;
pub mod pe;

pub use cache::ImageBaseCache;

use log::debug;
use object::elf::{FileHeader32, FileHeader64};
use object::macho::{MachHeader32, MachHeader64};
use object::pe::{ImageNtHeaders32, ImageNtHeaders64};
use object::{Endianness, FileKind};
use std::fs;
use std::path::Path;

use crate::domain::ImageBaseError;

/// Something that can produce the link-time image base of a module
///
/// This is the expensive half of resolution: implementations typically open
/// and parse a file, so they must never be called from a restricted context.
pub trait ImageBaseSource: Send + Sync {
    /// # Errors
    /// Returns an error if the binary cannot be read or its headers parsed.
    fn image_base(&self, path: &Path) -> Result<u64, ImageBaseError>;
}

impl<F> ImageBaseSource for F
where
    F: Fn(&Path) -> Result<u64, ImageBaseError> + Send + Sync,
{
    fn image_base(&self, path: &Path) -> Result<u64, ImageBaseError> {
        self(path)
    }
}

/// Reads the binary from disk and parses whichever format it turns out to be
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectFileBase;

impl ImageBaseSource for ObjectFileBase {
    fn image_base(&self, path: &Path) -> Result<u64, ImageBaseError> {
        let data = fs::read(path)
            .map_err(|source| ImageBaseError::Io { path: path.to_path_buf(), source })?;
        let base = image_base_from_bytes(&data)?;
        debug!("Image base of {}: 0x{base:x}", path.display());
        Ok(base)
    }
}

/// Extract the link-time image base from an in-memory binary
///
/// # Errors
/// Returns an error for unrecognised containers or malformed headers.
pub fn image_base_from_bytes(data: &[u8]) -> Result<u64, ImageBaseError> {
    match FileKind::parse(data)? {
        FileKind::Elf32 => elf::image_base::<FileHeader32<Endianness>>(data),
        FileKind::Elf64 => elf::image_base::<FileHeader64<Endianness>>(data),
        FileKind::MachO32 => macho::image_base::<MachHeader32<Endianness>>(data),
        FileKind::MachO64 => macho::image_base::<MachHeader64<Endianness>>(data),
        FileKind::MachOFat32 => thin_macho_base(macho::host_slice(data, false)?),
        FileKind::MachOFat64 => thin_macho_base(macho::host_slice(data, true)?),
        FileKind::Pe32 => pe::image_base::<ImageNtHeaders32>(data),
        FileKind::Pe64 => pe::image_base::<ImageNtHeaders64>(data),
        kind => Err(ImageBaseError::UnsupportedFormat(kind)),
    }
}

/// Image base of one slice of a universal binary
///
/// Slices must be thin Mach-O images; anything else, a nested fat header in
/// particular, is rejected rather than dispatched again.
fn thin_macho_base(slice: &[u8]) -> Result<u64, ImageBaseError> {
    match FileKind::parse(slice)? {
        FileKind::MachO32 => macho::image_base::<MachHeader32<Endianness>>(slice),
        FileKind::MachO64 => macho::image_base::<MachHeader64<Endianness>>(slice),
        kind => Err(ImageBaseError::UnsupportedFormat(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_rejected() {
        let result = image_base_from_bytes(b"definitely not a binary");
        assert!(matches!(result, Err(ImageBaseError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ObjectFileBase.image_base(Path::new("/nonexistent/objaddr/libmissing.so"));
        let err = result.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }

    #[test]
    fn test_closure_source() {
        let source = |_: &Path| -> Result<u64, ImageBaseError> { Ok(0x400) };
        assert_eq!(source.image_base(Path::new("/bin/app")).unwrap(), 0x400);
    }
}
