//! # Physical Memory
//!
//! The loader runs before paging, with physical memory identity mapped.
//! Addresses named by the kernel image are plain 32-bit physical addresses;
//! they are wrapped in [`PhysAddr`] so they never mix with lengths or LBAs.

use core::fmt;

use crate::config::SECTOR_SIZE;

/// A 32-bit physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(u32);

impl PhysAddr {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Round down to the start of the enclosing sector
    pub const fn align_down_sector(self) -> Self {
        Self(self.0 & !(SECTOR_SIZE as u32 - 1))
    }

    pub const fn is_sector_aligned(self) -> bool {
        self.0 & (SECTOR_SIZE as u32 - 1) == 0
    }

    /// Offset by `bytes`, wrapping at 4 GiB like the address bus does
    pub const fn offset(self, bytes: u32) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Byte-addressable physical memory
///
/// The loader only ever needs two things from RAM: a way to store a sector
/// drained from the disk data port, and a way to read back what was staged.
/// No bounds or overlap checks happen at this level.
pub trait PhysicalMemory {
    /// Store one sector at `addr`
    fn write_sector(&mut self, addr: PhysAddr, data: &[u8; SECTOR_SIZE]);

    /// Copy `out.len()` bytes starting at `addr` into `out`
    fn read(&self, addr: PhysAddr, out: &mut [u8]);
}

impl<T: PhysicalMemory + ?Sized> PhysicalMemory for &mut T {
    fn write_sector(&mut self, addr: PhysAddr, data: &[u8; SECTOR_SIZE]) {
        (**self).write_sector(addr, data)
    }

    fn read(&self, addr: PhysAddr, out: &mut [u8]) {
        (**self).read(addr, out)
    }
}

/// Identity-mapped RAM, addressed through raw pointers
///
/// Physical address 0 is a valid load target, so memory is never viewed
/// through a Rust reference: every access is a volatile byte load or store
/// on a pointer computed from the address.
pub struct IdentityMapped {
    base: usize,
}

impl IdentityMapped {
    /// # Safety
    ///
    /// Physical memory must be identity mapped, and every address the kernel
    /// image names (plus the scratch window) must be writable RAM that nothing
    /// else still needs. Nothing here checks either.
    pub const unsafe fn new() -> Self {
        Self { base: 0 }
    }

    /// Physical memory whose address 0 sits at `base`
    ///
    /// # Safety
    ///
    /// Same as [`IdentityMapped::new`], with every address taken relative to
    /// `base`.
    pub unsafe fn with_base(base: *mut u8) -> Self {
        Self { base: base as usize }
    }

    fn ptr(&self, addr: PhysAddr) -> *mut u8 {
        self.base.wrapping_add(addr.as_u32() as usize) as *mut u8
    }
}

impl PhysicalMemory for IdentityMapped {
    fn write_sector(&mut self, addr: PhysAddr, data: &[u8; SECTOR_SIZE]) {
        let dst = self.ptr(addr);
        for (i, &byte) in data.iter().enumerate() {
            // SAFETY: upheld by the contract of the constructor
            unsafe { core::ptr::write_volatile(dst.wrapping_add(i), byte) };
        }
    }

    fn read(&self, addr: PhysAddr, out: &mut [u8]) {
        let src = self.ptr(addr);
        for (i, byte) in out.iter_mut().enumerate() {
            // SAFETY: upheld by the contract of the constructor
            *byte = unsafe { core::ptr::read_volatile(src.wrapping_add(i)) };
        }
    }
}
