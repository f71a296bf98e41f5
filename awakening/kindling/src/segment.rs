//! # Segment Copier
//!
//! Materializes a byte range of the kernel image at a physical address by
//! reading whole sectors. The range does not have to be sector aligned, so
//! up to one sector before the start and one sector after the end can be
//! overwritten as well. Callers must tolerate both.

use crate::ata::{AtaPio, DiskFault, Lba};
use crate::config::{IMAGE_START_LBA, SECTOR_SIZE};
use crate::phys::{PhysAddr, PhysicalMemory};
use crate::port::PortBus;

/// Copies image byte ranges from disk into physical memory
pub struct SegmentCopier<B: PortBus, M: PhysicalMemory> {
    reader: AtaPio<B>,
    memory: M,
}

impl<B: PortBus, M: PhysicalMemory> SegmentCopier<B, M> {
    pub fn new(reader: AtaPio<B>, memory: M) -> Self {
        Self { reader, memory }
    }

    pub fn reader_mut(&mut self) -> &mut AtaPio<B> {
        &mut self.reader
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Copy `count` bytes starting at `image_offset` of the kernel image to
    /// `addr`
    ///
    /// The destination is rounded down to a sector boundary and whole sectors
    /// are read until the destination reaches `addr + count`. For the
    /// requested bytes to land where asked, `addr` and `image_offset` must
    /// agree modulo the sector size, which ELF guarantees for loadable
    /// segments.
    pub fn copy_range(&mut self, addr: PhysAddr, count: u32, image_offset: u32) -> Result<(), DiskFault> {
        // The end wraps with the 32-bit address: a range past 4 GiB copies nothing
        let end = addr.offset(count);
        let mut dst = addr.align_down_sector();
        let mut lba = Lba::new(image_offset / SECTOR_SIZE as u32 + IMAGE_START_LBA);
        let mut sector = [0u8; SECTOR_SIZE];

        while dst < end {
            self.reader.read_sector(&mut sector, lba)?;
            self.memory.write_sector(dst, &sector);
            dst = dst.offset(SECTOR_SIZE as u32);
            lba = lba.next();
            if dst.as_u32() == 0 {
                break;
            }
        }

        Ok(())
    }
}
