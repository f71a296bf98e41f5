//! # ELF32 Image Header
//!
//! The kernel image is a 32-bit ELF executable. Only the handful of fields
//! the loader acts on are interpreted: the magic, the entry point and the
//! program header table. Class, machine, version and type are not checked;
//! once the magic matches the image producer is trusted completely.

use core::fmt;
use core::mem::size_of;

use crate::config::ELF_MAGIC;
use crate::phys::{PhysAddr, PhysicalMemory};

/// Program header type: loadable segment
pub const PT_LOAD: u32 = 1;

/// ELF32 file header, as laid out on disk
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Elf32Ehdr {
    /// `\x7fELF` as a little-endian u32
    pub e_magic: u32,
    /// Class, data encoding, version, ABI and padding
    pub e_elf: [u8; 12],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    /// Physical address execution resumes at
    pub e_entry: u32,
    /// Program header table file offset
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    /// Program header entry count
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// ELF32 program header, as laid out on disk
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Elf32Phdr {
    pub p_type: u32,
    /// Segment file offset
    pub p_offset: u32,
    pub p_va: u32,
    /// Load address
    pub p_pa: u32,
    pub p_filesz: u32,
    /// Bytes to materialize in memory
    pub p_memsz: u32,
    pub p_flags: u32,
    pub p_align: u32,
}

/// Bytes in an ELF32 file header
pub const EHDR_SIZE: usize = size_of::<Elf32Ehdr>();

/// Stride of the program header table
///
/// `e_phentsize` is not consulted; entries are assumed to be exactly one
/// ELF32 program header apart.
pub const PHDR_SIZE: usize = size_of::<Elf32Phdr>();

/// The header fields the loader acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: u32,
    pub entry: PhysAddr,
    /// Offset of the segment table from the start of the image
    pub table_offset: u32,
    pub segment_count: u16,
}

impl ImageHeader {
    pub fn from_bytes(bytes: &[u8; EHDR_SIZE]) -> Self {
        // The buffer has byte alignment only
        let ehdr = unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const Elf32Ehdr) };
        Self {
            magic: ehdr.e_magic,
            entry: PhysAddr::new(ehdr.e_entry),
            table_offset: ehdr.e_phoff,
            segment_count: ehdr.e_phnum,
        }
    }

    pub fn read_from<M: PhysicalMemory>(memory: &M, at: PhysAddr) -> Self {
        let mut bytes = [0u8; EHDR_SIZE];
        memory.read(at, &mut bytes);
        Self::from_bytes(&bytes)
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == ELF_MAGIC
    }
}

/// One segment table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub kind: u32,
    pub phys_addr: PhysAddr,
    pub mem_size: u32,
    /// Offset of the segment's bytes from the start of the image
    pub image_offset: u32,
}

impl SegmentDescriptor {
    pub fn from_bytes(bytes: &[u8; PHDR_SIZE]) -> Self {
        let phdr = unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const Elf32Phdr) };
        Self {
            kind: phdr.p_type,
            phys_addr: PhysAddr::new(phdr.p_pa),
            mem_size: phdr.p_memsz,
            image_offset: phdr.p_offset,
        }
    }

    pub fn read_from<M: PhysicalMemory>(memory: &M, at: PhysAddr) -> Self {
        let mut bytes = [0u8; PHDR_SIZE];
        memory.read(at, &mut bytes);
        Self::from_bytes(&bytes)
    }

    pub fn is_loadable(&self) -> bool {
        self.kind == PT_LOAD
    }
}

impl fmt::Display for SegmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={} pa={} memsz={:#x} offset={:#x}",
            self.kind, self.phys_addr, self.mem_size, self.image_offset
        )
    }
}
