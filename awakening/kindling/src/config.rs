//! # Fixed Hardware Contract
//!
//! Every port number, magic value and physical address the loader relies on
//! lives here, so the contract with the disk controller, the image producer
//! and the external observer can be audited in one place.

use crate::phys::PhysAddr;

/// Size of one disk sector in bytes
pub const SECTOR_SIZE: usize = 512;

/// Number of 32-bit words moved through the data port per sector
pub const SECTOR_DWORDS: usize = SECTOR_SIZE / 4;

/// First LBA of the kernel image (LBA 0 holds the loader itself)
pub const IMAGE_START_LBA: u32 = 1;

/// Physical address the image prefix is staged at
pub const SCRATCH_ADDR: PhysAddr = PhysAddr::new(0x10000);

/// Sectors staged into the scratch window before the header is examined
///
/// 4 KiB covers the ELF header plus any segment table a cooperating image
/// builder will emit.
pub const HEADER_SECTORS: u32 = 8;

/// ATA primary bus register file
pub mod ata_ports {
    pub const DATA: u16 = 0x1F0;
    pub const SECTOR_COUNT: u16 = 0x1F2;
    pub const LBA_LOW: u16 = 0x1F3;
    pub const LBA_MID: u16 = 0x1F4;
    pub const LBA_HIGH: u16 = 0x1F5;
    pub const DRIVE_HEAD: u16 = 0x1F6;
    /// Status on read, command on write
    pub const STATUS_COMMAND: u16 = 0x1F7;
}

/// READ SECTORS (PIO, 28-bit LBA)
pub const ATA_CMD_READ_SECTORS: u8 = 0x20;

/// Drive/head high nibble: LBA mode, drive 0
pub const DRIVE_SELECT_LBA_MASTER: u8 = 0xE0;

/// Largest LBA expressible in 28 bits
pub const LBA28_MAX: u32 = (1 << 28) - 1;

/// Port an emulator or debug harness watches for the fatal signal
pub const DIAGNOSTIC_PORT: u16 = 0x8A00;

/// Values written, in order, to [`DIAGNOSTIC_PORT`] before halting
pub const DIAGNOSTIC_CODES: [u16; 2] = [0x8A00, 0x8E00];

/// `\x7fELF` read as a little-endian u32
pub const ELF_MAGIC: u32 = 0x464C_457F;

/// Per-boot knobs
///
/// [`LoaderConfig::DEFAULT`] is the faithful behavior: no disk error
/// inspection and every segment table entry is copied. The `strict-disk`
/// and `loadable-only` Cargo features flip the respective defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Where the image prefix is staged
    pub scratch: PhysAddr,
    /// How many sectors of the image prefix to stage
    pub header_sectors: u32,
    /// Treat ERR/DF after a sector command as fatal
    pub check_disk_errors: bool,
    /// Skip table entries whose type is not `PT_LOAD`
    pub loadable_only: bool,
}

impl LoaderConfig {
    pub const DEFAULT: Self = Self {
        scratch: SCRATCH_ADDR,
        header_sectors: HEADER_SECTORS,
        check_disk_errors: cfg!(feature = "strict-disk"),
        loadable_only: cfg!(feature = "loadable-only"),
    };

    /// Bytes of the image prefix staged into the scratch window
    pub const fn scratch_len(&self) -> u32 {
        self.header_sectors * SECTOR_SIZE as u32
    }
}
