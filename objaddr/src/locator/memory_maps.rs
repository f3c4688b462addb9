//! Memory mapping utilities for process address space analysis
//!
//! This module parses `/proc/<pid>/maps` into a table of file-backed modules
//! and their address ranges. The table is itself a [`ModuleLocator`], which
//! makes it possible to resolve addresses captured from *another* process, or
//! to describe an address space explicitly.
//!
//! A module is one contiguous run of mappings of the same file. A file can be
//! mapped more than once (loaded by `dlopen` and separately `mmap`ed to read
//! its debug info, say), so each run is its own module with its own base: the
//! address at which file offset 0 lies in that run.

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use super::ModuleLocator;
use crate::domain::{FramePtr, LocateError, MapsError, ModuleRecord};

/// Memory range of a mapping in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Suffix the kernel appends to mappings whose file has been unlinked
const DELETED_SUFFIX: &str = " (deleted)";

/// One contiguous run of mappings of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedModule {
    pub path: PathBuf,
    /// File offset mapped at the start of the first range
    pub offset: u64,
    /// Ascending and adjacent
    pub ranges: Vec<MemoryRange>,
}

impl MappedModule {
    /// Address at which file offset 0 lies in this run
    #[must_use]
    pub fn runtime_base(&self) -> u64 {
        self.ranges
            .first()
            .map_or(0, |first| first.start.checked_sub(self.offset).unwrap_or(first.start))
    }

    /// Whether a mapping of `offset` at `range` continues this run
    fn continues_with(&self, range: MemoryRange, offset: u64) -> bool {
        offset != 0 && self.ranges.last().is_some_and(|last| last.end == range.start)
    }

    /// Range from the lowest start to the highest end
    #[must_use]
    pub fn span(&self) -> Option<MemoryRange> {
        let start = self.ranges.iter().map(|range| range.start).min()?;
        let end = self.ranges.iter().map(|range| range.end).max()?;
        Some(MemoryRange { start, end })
    }

    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        self.ranges.iter().any(|range| range.contains(addr))
    }
}

/// Snapshot of the modules mapped into an address space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedModules {
    modules: Vec<MappedModule>,
}

impl MappedModules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `range` of the address space maps `path` from file
    /// `offset` onwards
    ///
    /// Mappings must be pushed in ascending address order, as the kernel lists
    /// them. A mapping extends the latest run of the same path when it starts
    /// where that run ends at a non-zero offset; otherwise it starts a new
    /// module.
    pub fn push(&mut self, path: impl Into<PathBuf>, range: MemoryRange, offset: u64) {
        let path = path.into();
        if let Some(module) = self.modules.iter_mut().rev().find(|module| module.path == path) {
            if module.continues_with(range, offset) {
                module.ranges.push(range);
                return;
            }
        }
        self.modules.push(MappedModule { path, offset, ranges: vec![range] });
    }

    /// Builder for a module mapped from file offset 0 at `start..end`
    #[must_use]
    pub fn with(mut self, path: impl Into<PathBuf>, start: u64, end: u64) -> Self {
        self.push(path, MemoryRange { start, end }, 0);
        self
    }

    /// Parse the text of a `/proc/<pid>/maps` file
    ///
    /// Each line reads `start-end perms offset dev inode [pathname]`. Only
    /// mappings whose pathname is absolute are kept; anonymous memory, pseudo
    /// entries such as `[heap]` or `[vdso]`, and files deleted since they were
    /// mapped are skipped.
    ///
    /// # Errors
    /// Returns an error if a line has no parseable address range or file
    /// offset.
    pub fn parse(maps: &str) -> Result<Self, MapsError> {
        let mut table = Self::new();

        for (index, line) in maps.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = index + 1;
            let (range, rest) = next_field(line)
                .ok_or(MapsError::Malformed { line: line_no, reason: "missing address range" })?;
            let range = parse_range(range)
                .ok_or(MapsError::Malformed { line: line_no, reason: "invalid address range" })?;

            let rest = next_field(rest).map_or("", |(_, tail)| tail); // perms
            let (offset, rest) = next_field(rest)
                .ok_or(MapsError::Malformed { line: line_no, reason: "missing file offset" })?;
            let offset = u64::from_str_radix(offset, 16)
                .map_err(|_| MapsError::Malformed { line: line_no, reason: "invalid file offset" })?;
            // dev, inode
            let rest = next_field(rest).map_or("", |(_, tail)| tail);
            let rest = next_field(rest).map_or("", |(_, tail)| tail);

            let pathname = rest.trim();
            if pathname.starts_with('/') && !pathname.ends_with(DELETED_SUFFIX) {
                table.push(pathname, range, offset);
            }
        }

        Ok(table)
    }

    /// Read and parse `/proc/<pid>/maps`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn for_process(pid: i32) -> Result<Self, MapsError> {
        Self::from_file(&PathBuf::from(format!("/proc/{pid}/maps")))
    }

    /// Read and parse `/proc/self/maps`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn for_current_process() -> Result<Self, MapsError> {
        Self::from_file(Path::new("/proc/self/maps"))
    }

    fn from_file(maps_path: &Path) -> Result<Self, MapsError> {
        let maps = fs::read_to_string(maps_path)
            .map_err(|source| MapsError::Read { path: maps_path.to_path_buf(), source })?;
        let table = Self::parse(&maps)?;
        debug!("Found {} file-backed modules in {}", table.len(), maps_path.display());
        Ok(table)
    }

    /// Address range covered by the first module mapped from `path`
    #[must_use]
    pub fn range_of(&self, path: &Path) -> Option<MemoryRange> {
        self.modules.iter().find(|module| module.path == path)?.span()
    }

    /// Module containing `addr`, if any
    #[must_use]
    pub fn find(&self, addr: u64) -> Option<&MappedModule> {
        self.modules.iter().find(|module| module.contains(addr))
    }

    pub fn modules(&self) -> &[MappedModule] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLocator for MappedModules {
    fn locate(&self, address: FramePtr) -> Result<Option<ModuleRecord>, LocateError> {
        Ok(self
            .find(address.get())
            .map(|module| ModuleRecord::new(module.path.clone(), module.runtime_base())))
    }
}

/// Split off the first whitespace-delimited field
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Some(s.split_once(char::is_whitespace).unwrap_or((s, "")))
}

fn parse_range(field: &str) -> Option<MemoryRange> {
    let (start, end) = field.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    (start <= end).then_some(MemoryRange { start, end })
}
