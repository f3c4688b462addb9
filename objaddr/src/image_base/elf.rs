//! ELF image base: the lowest virtual address of any loadable segment.

use object::elf::PT_LOAD;
use object::read::elf::{FileHeader, ProgramHeader};
use object::Endianness;

use crate::domain::ImageBaseError;

/// Lowest `p_vaddr` among the `PT_LOAD` program headers of `data`
///
/// # Errors
/// Fails if the headers cannot be parsed or no loadable segment exists.
pub fn image_base<Elf: FileHeader<Endian = Endianness>>(
    data: &[u8],
) -> Result<u64, ImageBaseError> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;

    header
        .program_headers(endian, data)?
        .iter()
        .filter(|segment| segment.p_type(endian) == PT_LOAD)
        .map(|segment| -> u64 { segment.p_vaddr(endian).into() })
        .min()
        .ok_or(ImageBaseError::NoLoadableSegments)
}
