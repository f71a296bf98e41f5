//! Mock hardware for testing
//!
//! An emulated ATA primary bus over an in-memory disk, a RAM arena standing
//! in for physical memory, a hand-off that unwinds instead of jumping, and a
//! builder for synthetic ELF32 kernel images.

use std::panic::{self, AssertUnwindSafe};

use crate::ata::AtaStatus;
use crate::config::{
    ata_ports, ATA_CMD_READ_SECTORS, DIAGNOSTIC_PORT, ELF_MAGIC, SECTOR_SIZE,
};
use crate::elf::{EHDR_SIZE, PHDR_SIZE, PT_LOAD};
use crate::fatal::Handoff;
use crate::phys::{PhysAddr, PhysicalMemory};
use crate::port::PortBus;

/// Fill byte of loader sector 0 on a [`MockDisk::with_image`] disk
pub const LOADER_FILL: u8 = 0xB0;

/// Fill byte of fresh [`MockMemory`]
pub const SENTINEL: u8 = 0xEE;

/// One access to the port space, as seen by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOp {
    In8(u16),
    Out8(u16, u8),
    Out16(u16, u16),
    In32(u16),
}

/// Emulated ATA primary bus with drive 0 attached
///
/// Every port access is logged. After each READ SECTORS command the status
/// register reports BSY for a configurable number of polls before the data
/// becomes available.
pub struct MockDisk {
    disk: Vec<u8>,
    registers: [u8; 8],
    buffer: [u8; SECTOR_SIZE],
    cursor: usize,
    faulted: bool,
    busy_polls: usize,
    busy_remaining: usize,
    failing: Vec<u32>,
    commands: Vec<u32>,
    ops: Vec<PortOp>,
}

impl MockDisk {
    /// A disk with exactly these bytes, sector 0 first
    pub fn new(disk: Vec<u8>) -> Self {
        Self {
            disk,
            registers: [0; 8],
            buffer: [0; SECTOR_SIZE],
            cursor: SECTOR_SIZE,
            faulted: false,
            busy_polls: 0,
            busy_remaining: 0,
            failing: Vec::new(),
            commands: Vec::new(),
            ops: Vec::new(),
        }
    }

    /// A loader sector followed by `image` starting at LBA 1
    pub fn with_image(image: &[u8]) -> Self {
        let mut disk = vec![LOADER_FILL; SECTOR_SIZE];
        disk.extend_from_slice(image);
        Self::new(disk)
    }

    /// Status polls that report BSY after each command
    pub fn set_busy_polls(&mut self, polls: usize) {
        self.busy_polls = polls;
    }

    /// Status polls that report BSY before the first command
    pub fn set_initial_busy_polls(&mut self, polls: usize) {
        self.busy_remaining = polls;
    }

    /// Reads of `lba` raise ERR and deliver no data
    pub fn fail_lba(&mut self, lba: u32) {
        self.failing.push(lba);
    }

    pub fn sector(&self, lba: u32) -> &[u8] {
        let start = lba as usize * SECTOR_SIZE;
        &self.disk[start..start + SECTOR_SIZE]
    }

    pub fn ops(&self) -> &[PortOp] {
        &self.ops
    }

    pub fn command_lbas(&self) -> Vec<u32> {
        self.commands.clone()
    }

    pub fn commands_issued(&self) -> usize {
        self.commands.len()
    }

    pub fn last_command_lba(&self) -> Option<u32> {
        self.commands.last().copied()
    }

    pub fn status_reads(&self) -> usize {
        self.count(|op| op == PortOp::In8(ata_ports::STATUS_COMMAND))
    }

    pub fn data_reads(&self) -> usize {
        self.count(|op| op == PortOp::In32(ata_ports::DATA))
    }

    /// Values written to the diagnostic port, in order
    pub fn diagnostics(&self) -> Vec<u16> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                PortOp::Out16(DIAGNOSTIC_PORT, value) => Some(value),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(PortOp) -> bool) -> usize {
        self.ops.iter().filter(|&&op| pred(op)).count()
    }

    fn register(&self, port: u16) -> u8 {
        self.registers[(port - ata_ports::DATA) as usize]
    }

    fn command_lba(&self) -> u32 {
        self.register(ata_ports::LBA_LOW) as u32
            | (self.register(ata_ports::LBA_MID) as u32) << 8
            | (self.register(ata_ports::LBA_HIGH) as u32) << 16
            | ((self.register(ata_ports::DRIVE_HEAD) & 0x0F) as u32) << 24
    }

    fn execute_read(&mut self) {
        assert_eq!(self.register(ata_ports::SECTOR_COUNT), 1, "only single-sector reads");
        assert_eq!(self.register(ata_ports::DRIVE_HEAD) & 0xF0, 0xE0, "LBA mode, drive 0");

        let lba = self.command_lba();
        self.commands.push(lba);
        self.busy_remaining = self.busy_polls;

        if self.failing.contains(&lba) {
            self.faulted = true;
            self.cursor = SECTOR_SIZE;
            return;
        }

        self.faulted = false;
        self.buffer = [0; SECTOR_SIZE];
        let start = lba as usize * SECTOR_SIZE;
        if start < self.disk.len() {
            let end = (start + SECTOR_SIZE).min(self.disk.len());
            self.buffer[..end - start].copy_from_slice(&self.disk[start..end]);
        }
        self.cursor = 0;
    }
}

impl PortBus for MockDisk {
    fn read_u8(&mut self, port: u16) -> u8 {
        self.ops.push(PortOp::In8(port));
        if port != ata_ports::STATUS_COMMAND {
            return 0;
        }

        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return AtaStatus::BSY.bits();
        }

        let mut status = AtaStatus::DRDY;
        if self.faulted {
            status |= AtaStatus::ERR;
        } else if self.cursor < SECTOR_SIZE {
            status |= AtaStatus::DRQ;
        }
        status.bits()
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.ops.push(PortOp::Out8(port, value));
        if (ata_ports::DATA..=ata_ports::STATUS_COMMAND).contains(&port) {
            self.registers[(port - ata_ports::DATA) as usize] = value;
        }
        if port == ata_ports::STATUS_COMMAND && value == ATA_CMD_READ_SECTORS {
            self.execute_read();
        }
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        self.ops.push(PortOp::Out16(port, value));
    }

    fn read_u32(&mut self, port: u16) -> u32 {
        self.ops.push(PortOp::In32(port));
        if port != ata_ports::DATA || self.cursor + 4 > SECTOR_SIZE {
            return 0;
        }
        let word = u32::from_le_bytes([
            self.buffer[self.cursor],
            self.buffer[self.cursor + 1],
            self.buffer[self.cursor + 2],
            self.buffer[self.cursor + 3],
        ]);
        self.cursor += 4;
        word
    }
}

/// Physical memory arena covering `[base, base + len)`
pub struct MockMemory {
    base: u32,
    bytes: Vec<u8>,
}

impl MockMemory {
    pub fn new(base: u32, len: usize) -> Self {
        Self {
            base,
            bytes: vec![SENTINEL; len],
        }
    }

    fn index(&self, addr: u32, len: usize) -> usize {
        let start = addr
            .checked_sub(self.base)
            .unwrap_or_else(|| panic!("physical address {:#x} below mock RAM", addr)) as usize;
        assert!(
            start + len <= self.bytes.len(),
            "physical range {:#x}+{:#x} past end of mock RAM",
            addr,
            len
        );
        start
    }

    pub fn slice(&self, addr: u32, len: usize) -> &[u8] {
        let start = self.index(addr, len);
        &self.bytes[start..start + len]
    }
}

impl PhysicalMemory for MockMemory {
    fn write_sector(&mut self, addr: PhysAddr, data: &[u8; SECTOR_SIZE]) {
        let start = self.index(addr.as_u32(), SECTOR_SIZE);
        self.bytes[start..start + SECTOR_SIZE].copy_from_slice(data);
    }

    fn read(&self, addr: PhysAddr, out: &mut [u8]) {
        out.copy_from_slice(self.slice(addr.as_u32(), out.len()));
    }
}

/// How a boot left the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Entered(PhysAddr),
    Parked,
}

/// Hand-off that unwinds with an [`Outcome`] instead of leaving
pub struct MockHandoff;

impl Handoff for MockHandoff {
    fn enter(&mut self, entry: PhysAddr) -> ! {
        panic::panic_any(Outcome::Entered(entry))
    }

    fn park(&mut self) -> ! {
        panic::panic_any(Outcome::Parked)
    }
}

/// Run a boot to its divergent exit and report which exit it took
pub fn intercept<F: FnOnce()>(boot: F) -> Outcome {
    let payload = match panic::catch_unwind(AssertUnwindSafe(boot)) {
        Ok(()) => panic!("boot returned"),
        Err(payload) => payload,
    };
    match payload.downcast::<Outcome>() {
        Ok(outcome) => *outcome,
        Err(other) => panic::resume_unwind(other),
    }
}

/// Builds ELF32 executables the way a cooperating image builder would
///
/// Header and segment table come first; each segment's bytes start at a
/// file offset congruent to its load address modulo the sector size.
pub struct ElfImageBuilder {
    entry: u32,
    segments: Vec<(u32, u32, Vec<u8>)>,
}

impl ElfImageBuilder {
    pub fn new(entry: u32) -> Self {
        Self {
            entry,
            segments: Vec::new(),
        }
    }

    /// A `PT_LOAD` segment loaded at `pa`
    pub fn segment(self, pa: u32, data: &[u8]) -> Self {
        self.raw_segment(PT_LOAD, pa, data)
    }

    pub fn raw_segment(mut self, kind: u32, pa: u32, data: &[u8]) -> Self {
        self.segments.push((kind, pa, data.to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let table_len = PHDR_SIZE * self.segments.len();
        let mut image = vec![0u8; EHDR_SIZE + table_len];

        image[0..4].copy_from_slice(&ELF_MAGIC.to_le_bytes());
        image[4] = 1; // ELFCLASS32
        image[5] = 1; // little-endian
        image[6] = 1; // EV_CURRENT
        image[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        image[18..20].copy_from_slice(&3u16.to_le_bytes()); // EM_386
        image[20..24].copy_from_slice(&1u32.to_le_bytes());
        image[24..28].copy_from_slice(&self.entry.to_le_bytes());
        image[28..32].copy_from_slice(&(EHDR_SIZE as u32).to_le_bytes());
        image[40..42].copy_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        image[42..44].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        image[44..46].copy_from_slice(&(self.segments.len() as u16).to_le_bytes());

        let mut cursor = image.len();
        for (index, (kind, pa, data)) in self.segments.iter().enumerate() {
            let offset = align_up(cursor, SECTOR_SIZE) + *pa as usize % SECTOR_SIZE;
            let len = data.len() as u32;

            let phdr = EHDR_SIZE + index * PHDR_SIZE;
            let fields = [*kind, offset as u32, *pa, *pa, len, len, 0x5, SECTOR_SIZE as u32];
            for (i, field) in fields.iter().enumerate() {
                image[phdr + i * 4..phdr + i * 4 + 4].copy_from_slice(&field.to_le_bytes());
            }

            image.resize(offset, 0);
            image.extend_from_slice(data);
            cursor = image.len();
        }

        image
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}
