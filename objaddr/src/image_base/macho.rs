//! Mach-O image base.
//!
//! The base is the `vmaddr` of the first `__TEXT` segment load command, which
//! is where the Mach header itself is mapped. Binaries carrying more than one
//! `__TEXT` command are not handled specially: only the first one counts.

use object::read::macho::{FatArch, MachHeader, MachOFatFile32, MachOFatFile64, Segment};
use object::{Architecture, Endianness};

use crate::domain::ImageBaseError;

const TEXT_SEGMENT: &[u8] = b"__TEXT";

/// `vmaddr` of the first `__TEXT` segment in a thin Mach-O image
///
/// # Errors
/// Fails if the load commands cannot be parsed or there is no `__TEXT`.
pub fn image_base<Mach: MachHeader<Endian = Endianness>>(
    data: &[u8],
) -> Result<u64, ImageBaseError> {
    let header = Mach::parse(data, 0)?;
    let endian = header.endian()?;
    let mut commands = header.load_commands(endian, data, 0)?;

    while let Some(command) = commands.next()? {
        if let Some((segment, _)) = Mach::Segment::from_command(command)? {
            if segment.name() == TEXT_SEGMENT {
                return Ok(segment.vmaddr(endian).into());
            }
        }
    }

    Err(ImageBaseError::NoTextSegment)
}

/// Slice of a universal binary built for the running architecture
///
/// # Errors
/// Fails if the fat header is malformed or no slice matches.
pub fn host_slice(data: &[u8], is_64: bool) -> Result<&[u8], ImageBaseError> {
    let host = host_architecture();
    let slice = if is_64 {
        let fat = MachOFatFile64::parse(data)?;
        fat.arches().iter().find(|arch| arch.architecture() == host).map(|arch| arch.data(data))
    } else {
        let fat = MachOFatFile32::parse(data)?;
        fat.arches().iter().find(|arch| arch.architecture() == host).map(|arch| arch.data(data))
    };

    match slice {
        Some(data) => Ok(data?),
        None => Err(ImageBaseError::NoMatchingArchitecture),
    }
}

fn host_architecture() -> Architecture {
    if cfg!(target_arch = "aarch64") {
        Architecture::Aarch64
    } else if cfg!(target_arch = "x86_64") {
        Architecture::X86_64
    } else if cfg!(target_arch = "x86") {
        Architecture::I386
    } else if cfg!(target_arch = "arm") {
        Architecture::Arm
    } else if cfg!(target_arch = "powerpc64") {
        Architecture::PowerPc64
    } else if cfg!(target_arch = "powerpc") {
        Architecture::PowerPc
    } else {
        Architecture::Unknown
    }
}
