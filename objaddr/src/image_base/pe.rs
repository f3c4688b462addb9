//! PE image base: the optional header's `ImageBase` field.

use object::pe::ImageDosHeader;
use object::read::pe::{ImageNtHeaders, ImageOptionalHeader};

use crate::domain::ImageBaseError;

/// `ImageBase` from the optional header of a PE32 or PE32+ image
///
/// # Errors
/// Fails if the DOS or NT headers cannot be parsed.
pub fn image_base<Pe: ImageNtHeaders>(data: &[u8]) -> Result<u64, ImageBaseError> {
    let dos_header = ImageDosHeader::parse(data)?;
    let mut offset = u64::from(dos_header.nt_headers_offset());
    let (nt_headers, _) = Pe::parse(data, &mut offset)?;
    Ok(nt_headers.optional_header().image_base())
}
