//! Domain types providing compile-time safety and self-documentation
//!
//! Raw instruction pointers, module records and resolved frames. Addresses are
//! kept as `u64` regardless of the host pointer width so a frame captured in
//! one process can be carried around and resolved elsewhere.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Raw instruction-pointer value as captured by an unwinder
///
/// Only meaningful inside the process (and mapping generation) it was
/// captured in. All arithmetic on it is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct FramePtr(pub u64);

impl FramePtr {
    /// Create a frame pointer from a code pointer
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u64)
    }

    /// The address as a plain integer
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Distance from `base` up to this address
    ///
    /// Returns `None` if the address lies below `base`.
    #[must_use]
    pub fn checked_offset_from(self, base: u64) -> Option<u64> {
        self.0.checked_sub(base)
    }

    /// Add a byte offset, returning `None` on overflow
    #[must_use]
    pub fn checked_add(self, offset: u64) -> Option<Self> {
        self.0.checked_add(offset).map(Self)
    }
}

impl fmt::Display for FramePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl From<u64> for FramePtr {
    fn from(addr: u64) -> Self {
        FramePtr(addr)
    }
}

impl From<usize> for FramePtr {
    fn from(addr: usize) -> Self {
        FramePtr(addr as u64)
    }
}

/// A loaded module owning some address
///
/// Derived per lookup, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Filesystem path of the executable or shared object
    pub path: PathBuf,
    /// Address at which the loader placed the module's first byte
    pub runtime_base: u64,
}

impl ModuleRecord {
    pub fn new(path: impl Into<PathBuf>, runtime_base: u64) -> Self {
        Self { path: path.into(), runtime_base }
    }

    /// Translate `address` into this module's link-time address space
    ///
    /// Computes `address - runtime_base + image_base`, or `None` if either
    /// step leaves the `u64` range.
    #[must_use]
    pub fn object_address(&self, address: FramePtr, image_base: u64) -> Option<u64> {
        address.checked_offset_from(self.runtime_base)?.checked_add(image_base)
    }
}

/// A fully resolved frame
///
/// `object_address` is only meaningful together with `object_path`: it is the
/// address to hand to an offline symbolizer working on that exact binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectFrame {
    pub raw_address: FramePtr,
    pub object_address: u64,
    pub object_path: PathBuf,
}

impl ObjectFrame {
    /// Frame for an address outside any known module
    #[must_use]
    pub fn unresolved(raw_address: FramePtr) -> Self {
        Self { raw_address, object_address: 0, object_path: PathBuf::new() }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.object_path.as_os_str().is_empty()
    }
}

impl fmt::Display for ObjectFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_resolved() {
            write!(
                f,
                "{} -> 0x{:08x} in {}",
                self.raw_address,
                self.object_address,
                self.object_path.display()
            )
        } else {
            write!(f, "{} -> <unknown>", self.raw_address)
        }
    }
}

/// A frame identified to its module but not yet rebased
///
/// Produced without parsing any binary, so it can be captured in restricted
/// contexts and finished later with the image base of `object_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeObjectFrame {
    pub raw_address: FramePtr,
    pub address_relative_to_object_start: u64,
    pub object_path: PathBuf,
}

impl SafeObjectFrame {
    #[must_use]
    pub fn unresolved(raw_address: FramePtr) -> Self {
        Self { raw_address, address_relative_to_object_start: 0, object_path: PathBuf::new() }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.object_path.as_os_str().is_empty()
    }

    #[must_use]
    pub fn object_path(&self) -> &Path {
        &self.object_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_address_rebases() {
        let module = ModuleRecord::new("/usr/lib/libfoo.so", 0x5000);
        assert_eq!(module.object_address(FramePtr(0x5080), 0x400), Some(0x480));
        assert_eq!(module.object_address(FramePtr(0x5000), 0), Some(0));
    }

    #[test]
    fn test_object_address_rejects_underflow() {
        let module = ModuleRecord::new("/bin/app", 0x5000);
        assert_eq!(module.object_address(FramePtr(0x4fff), 0x400), None);
    }

    #[test]
    fn test_object_address_rejects_overflow() {
        let module = ModuleRecord::new("/bin/app", 0);
        assert_eq!(module.object_address(FramePtr(u64::MAX), 1), None);
    }

    #[test]
    fn test_unresolved_frame() {
        let frame = ObjectFrame::unresolved(FramePtr(0x9000));
        assert!(!frame.is_resolved());
        assert_eq!(frame.object_address, 0);
        assert_eq!(frame.to_string(), "0x0000000000009000 -> <unknown>");
    }

    #[test]
    fn test_frame_display() {
        let frame = ObjectFrame {
            raw_address: FramePtr(0x1050),
            object_address: 0x50,
            object_path: PathBuf::from("/bin/main"),
        };
        assert_eq!(frame.to_string(), "0x0000000000001050 -> 0x00000050 in /bin/main");
    }
}
