//! ATA/IDE sector reader (PIO mode)
//!
//! Reads one 512-byte sector at a time from the first disk on the primary
//! bus, draining the data port straight into physical memory.
//!
//! **Supported:**
//! - Primary bus (0x1F0-0x1F7)
//! - Master drive
//! - 28-bit LBA addressing
//! - Single-sector reads
//!
//! **Not supported:**
//! - Timeouts (there is no clock to time out against)
//! - Writes, DMA, 48-bit LBA, secondary bus, slave drive

use core::fmt;

use crate::config::{
    ata_ports, ATA_CMD_READ_SECTORS, DRIVE_SELECT_LBA_MASTER, LBA28_MAX, SECTOR_DWORDS,
    SECTOR_SIZE,
};
use crate::port::PortBus;

bitflags::bitflags! {
    /// ATA status register
    pub struct AtaStatus: u8 {
        /// Busy
        const BSY  = 0x80;
        /// Drive ready
        const DRDY = 0x40;
        /// Drive fault
        const DF   = 0x20;
        /// Data request ready
        const DRQ  = 0x08;
        /// Error
        const ERR  = 0x01;
    }
}

impl AtaStatus {
    /// Drive ready and not busy
    pub fn is_ready(self) -> bool {
        self & (Self::BSY | Self::DRDY) == Self::DRDY
    }

    pub fn is_faulted(self) -> bool {
        self.intersects(Self::ERR | Self::DF)
    }
}

/// 28-bit linear block address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Lba(u32);

impl Lba {
    /// Bits above 27 are dropped; they cannot be expressed on the wire.
    pub const fn new(lba: u32) -> Self {
        Self(lba & LBA28_MAX)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn next(self) -> Self {
        Self::new(self.0 + 1)
    }

    /// Register bytes in the order they go out: low, mid, high, drive/head
    pub const fn register_bytes(self) -> [u8; 4] {
        [
            self.0 as u8,
            (self.0 >> 8) as u8,
            (self.0 >> 16) as u8,
            ((self.0 >> 24) & 0x0F) as u8 | DRIVE_SELECT_LBA_MASTER,
        ]
    }
}

impl fmt::Display for Lba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The drive reported ERR or DF after a read command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskFault {
    pub lba: Lba,
    pub status: AtaStatus,
}

impl fmt::Display for DiskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Disk fault at LBA {} (status {:#04x})", self.lba, self.status.bits())
    }
}

/// PIO sector reader for drive 0 on the primary bus
pub struct AtaPio<B: PortBus> {
    bus: B,
    check_errors: bool,
}

impl<B: PortBus> AtaPio<B> {
    /// A reader that trusts the drive: the error bit is never looked at
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            check_errors: false,
        }
    }

    /// A reader that reports ERR/DF after each command as a [`DiskFault`]
    pub fn with_error_check(bus: B, check_errors: bool) -> Self {
        Self { bus, check_errors }
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn status(&mut self) -> AtaStatus {
        AtaStatus::from_bits_truncate(self.bus.read_u8(ata_ports::STATUS_COMMAND))
    }

    /// Poll the status register until the drive is ready and not busy
    ///
    /// Blocks forever if the drive never gets there. There is no timer to
    /// bound the wait and nobody to report a timeout to, so this is only
    /// suitable for hardware that is known to answer.
    pub fn wait_until_ready(&mut self) -> AtaStatus {
        loop {
            let status = self.status();
            if status.is_ready() {
                return status;
            }
            core::hint::spin_loop();
        }
    }

    /// Read the sector at `lba` into `dst`
    ///
    /// Exactly 128 dwords are pulled from the data port. Unless the reader
    /// was built with error checking, a failed read goes unnoticed and `dst`
    /// receives whatever the port yields.
    pub fn read_sector(&mut self, dst: &mut [u8; SECTOR_SIZE], lba: Lba) -> Result<(), DiskFault> {
        self.wait_until_ready();

        let [low, mid, high, drive_head] = lba.register_bytes();
        self.bus.write_u8(ata_ports::SECTOR_COUNT, 1);
        self.bus.write_u8(ata_ports::LBA_LOW, low);
        self.bus.write_u8(ata_ports::LBA_MID, mid);
        self.bus.write_u8(ata_ports::LBA_HIGH, high);
        self.bus.write_u8(ata_ports::DRIVE_HEAD, drive_head);
        self.bus.write_u8(ata_ports::STATUS_COMMAND, ATA_CMD_READ_SECTORS);

        let status = self.wait_until_ready();
        if self.check_errors && status.is_faulted() {
            crate::serial_println!("[ATA] read of LBA {} failed, status {:#04x}", lba, status.bits());
            return Err(DiskFault { lba, status });
        }

        for word in dst.chunks_exact_mut(4).take(SECTOR_DWORDS) {
            word.copy_from_slice(&self.bus.read_u32(ata_ports::DATA).to_le_bytes());
        }

        Ok(())
    }
}
