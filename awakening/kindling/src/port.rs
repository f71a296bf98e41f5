//! # Port I/O
//!
//! Everything the loader says to hardware goes through [`PortBus`]. On the
//! machine that is the `in`/`out` instruction family; under test it is an
//! emulated register file.

use x86_64::instructions::port::Port;

/// x86 I/O port space
pub trait PortBus {
    fn read_u8(&mut self, port: u16) -> u8;
    fn write_u8(&mut self, port: u16, value: u8);
    fn write_u16(&mut self, port: u16, value: u16);
    fn read_u32(&mut self, port: u16) -> u32;
}

impl<T: PortBus + ?Sized> PortBus for &mut T {
    fn read_u8(&mut self, port: u16) -> u8 {
        (**self).read_u8(port)
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        (**self).write_u8(port, value)
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        (**self).write_u16(port, value)
    }

    fn read_u32(&mut self, port: u16) -> u32 {
        (**self).read_u32(port)
    }
}

/// The real I/O port space
pub struct HardwarePorts {
    _private: (),
}

impl HardwarePorts {
    /// # Safety
    ///
    /// Port writes have device side effects. The caller must be the only
    /// code driving the ATA primary bus and the diagnostic port.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortBus for HardwarePorts {
    fn read_u8(&mut self, port: u16) -> u8 {
        unsafe { Port::<u8>::new(port).read() }
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        unsafe { Port::<u8>::new(port).write(value) }
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        unsafe { Port::<u16>::new(port).write(value) }
    }

    fn read_u32(&mut self, port: u16) -> u32 {
        unsafe { Port::<u32>::new(port).read() }
    }
}
