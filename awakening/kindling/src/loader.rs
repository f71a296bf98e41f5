//! # Image Loader
//!
//! Drives the whole boot: stage the image prefix, check the magic, walk the
//! segment table copying each segment into place, then jump to the entry
//! point. The only way off that path is an invalid image (or, with
//! `check_disk_errors`, a disk fault), which signals the external observer
//! and parks the machine.
//!
//! ```text
//! Start -> HeaderLoaded -> Validated -> SegmentsLoaded -> Jumped
//!                       \-> Invalid -> Halted
//! ```
//!
//! Nothing checks that a segment fits in memory or stays clear of this
//! loader or the scratch window. The image builder is trusted to lay
//! segments out so nothing still needed is overwritten.

use core::fmt;

use crate::ata::{AtaPio, DiskFault};
use crate::config::LoaderConfig;
use crate::elf::{ImageHeader, SegmentDescriptor, PHDR_SIZE};
use crate::fatal::{self, Handoff};
use crate::phys::{PhysAddr, PhysicalMemory};
use crate::port::PortBus;
use crate::segment::SegmentCopier;

/// Why a boot was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The staged header does not start with the ELF magic
    InvalidImageMagic { found: u32 },
    /// The drive flagged a read (only reported with `check_disk_errors`)
    DiskFault(DiskFault),
}

impl From<DiskFault> for LoadError {
    fn from(fault: DiskFault) -> Self {
        LoadError::DiskFault(fault)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::InvalidImageMagic { found } => {
                write!(f, "Invalid image magic {:#010x}", found)
            }
            LoadError::DiskFault(fault) => write!(f, "{}", fault),
        }
    }
}

/// Where the boot sequence has got to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    Start,
    HeaderLoaded,
    Validated,
    SegmentsLoaded,
    Jumped,
    Invalid,
    Halted,
}

impl fmt::Display for BootStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootStage::Start => "start",
            BootStage::HeaderLoaded => "header loaded",
            BootStage::Validated => "validated",
            BootStage::SegmentsLoaded => "segments loaded",
            BootStage::Jumped => "jumped",
            BootStage::Invalid => "invalid",
            BootStage::Halted => "halted",
        };
        f.write_str(name)
    }
}

/// The staged image prefix
///
/// Holds the ELF header and segment table once the prefix has been read.
/// Its contents are only trustworthy until a segment load overlaps it:
/// descriptors are therefore read one at a time, right before the copy that
/// uses them, and a segment that overwrites entries it has not reached yet
/// will have the loader act on whatever landed there.
#[derive(Debug, Clone, Copy)]
pub struct ScratchWindow {
    base: PhysAddr,
    len: u32,
}

impl ScratchWindow {
    pub const fn new(base: PhysAddr, len: u32) -> Self {
        Self { base, len }
    }

    pub const fn base(&self) -> PhysAddr {
        self.base
    }

    pub const fn len(&self) -> u32 {
        self.len
    }

    pub fn header<M: PhysicalMemory>(&self, memory: &M) -> ImageHeader {
        ImageHeader::read_from(memory, self.base)
    }

    /// Entry `index` of the segment table the header points at
    ///
    /// Not bounded by the window: a table reaching past the staged prefix
    /// reads whatever memory follows it.
    pub fn descriptor<M: PhysicalMemory>(
        &self,
        memory: &M,
        header: &ImageHeader,
        index: u16,
    ) -> SegmentDescriptor {
        let at = self
            .base
            .offset(header.table_offset)
            .offset(index as u32 * PHDR_SIZE as u32);
        SegmentDescriptor::read_from(memory, at)
    }
}

/// Loads the kernel image and hands control to it
pub struct ImageLoader<B: PortBus, M: PhysicalMemory> {
    copier: SegmentCopier<B, M>,
    config: LoaderConfig,
    stage: BootStage,
}

impl<B: PortBus, M: PhysicalMemory> ImageLoader<B, M> {
    pub fn new(bus: B, memory: M, config: LoaderConfig) -> Self {
        let reader = AtaPio::with_error_check(bus, config.check_disk_errors);
        Self {
            copier: SegmentCopier::new(reader, memory),
            config,
            stage: BootStage::Start,
        }
    }

    pub fn stage(&self) -> BootStage {
        self.stage
    }

    pub fn scratch(&self) -> ScratchWindow {
        ScratchWindow::new(self.config.scratch, self.config.scratch_len())
    }

    fn advance(&mut self, stage: BootStage) {
        crate::serial_println!("[BOOT] {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// Stage the image prefix into the scratch window
    pub fn load_header(&mut self) -> Result<ImageHeader, LoadError> {
        let scratch = self.scratch();
        self.copier.copy_range(scratch.base(), scratch.len(), 0)?;
        self.advance(BootStage::HeaderLoaded);
        Ok(scratch.header(self.copier.memory()))
    }

    /// Check the staged header's magic
    pub fn validate(&mut self, header: &ImageHeader) -> Result<(), LoadError> {
        if !header.has_valid_magic() {
            self.advance(BootStage::Invalid);
            return Err(LoadError::InvalidImageMagic { found: header.magic });
        }
        crate::serial_println!(
            "[ELF] entry={} table at {:#x}, {} segments",
            header.entry,
            header.table_offset,
            header.segment_count
        );
        self.advance(BootStage::Validated);
        Ok(())
    }

    /// Copy every segment table entry into place, in table order
    pub fn load_segments(&mut self, header: &ImageHeader) -> Result<(), LoadError> {
        let scratch = self.scratch();
        for index in 0..header.segment_count {
            let segment = scratch.descriptor(self.copier.memory(), header, index);
            if self.config.loadable_only && !segment.is_loadable() {
                crate::serial_println!("[SEG] #{} skipped ({})", index, segment);
                continue;
            }
            crate::serial_println!("[SEG] #{} {}", index, segment);
            self.copier
                .copy_range(segment.phys_addr, segment.mem_size, segment.image_offset)?;
        }
        self.advance(BootStage::SegmentsLoaded);
        Ok(())
    }

    /// Everything up to the jump; returns the entry point
    pub fn load(&mut self) -> Result<PhysAddr, LoadError> {
        let header = self.load_header()?;
        self.validate(&header)?;
        self.load_segments(&header)?;
        Ok(header.entry)
    }

    /// Boot the image. Never returns.
    ///
    /// On success control passes to the image's entry point through
    /// `handoff`. On failure the diagnostic codes are written and the machine
    /// is parked; no further disk or memory access happens.
    pub fn boot<H: Handoff>(mut self, handoff: &mut H) -> ! {
        match self.load() {
            Ok(entry) => {
                self.advance(BootStage::Jumped);
                crate::serial_println!("[BOOT] entering kernel at {}", entry);
                handoff.enter(entry)
            }
            Err(err) => {
                crate::serial_println!("[BOOT] fatal: {}", err);
                fatal::signal_failure(self.copier.reader_mut().bus_mut());
                self.advance(BootStage::Halted);
                handoff.park()
            }
        }
    }
}
