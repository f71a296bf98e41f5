//! # Kindling
//!
//! The first stage of the Awakening: a loader that runs straight after the
//! startup code has put the CPU in a usable mode and set up a stack. It finds
//! the kernel image on the first ATA disk, copies its segments to the
//! physical addresses they ask for, and jumps to the entry point.
//!
//! Disk layout:
//! - LBA 0 holds this loader
//! - LBA 1 onward holds the kernel image, an ELF32 executable
//!
//! There is no heap, no interrupts and no second chance. An image with the
//! wrong magic gets the diagnostic codes written to the debug port and the
//! machine idles forever.

#![cfg_attr(not(test), no_std)]

pub mod ata;
pub mod config;
pub mod elf;
pub mod fatal;
pub mod loader;
pub mod phys;
pub mod port;
pub mod segment;
pub mod serial;

#[cfg(test)]
mod mock;

pub use ata::{AtaPio, AtaStatus, DiskFault, Lba};
pub use config::LoaderConfig;
pub use elf::{ImageHeader, SegmentDescriptor};
pub use fatal::{BareMetal, Handoff};
pub use loader::{BootStage, ImageLoader, LoadError, ScratchWindow};
pub use phys::{IdentityMapped, PhysAddr, PhysicalMemory};
pub use port::{HardwarePorts, PortBus};
pub use segment::SegmentCopier;
