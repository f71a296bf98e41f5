//! # The Point of No Return
//!
//! Both ways out of the loader diverge: either control passes to the kernel
//! entry point, or the diagnostic codes go out and the machine idles forever.
//! [`Handoff`] is the seam between those two exits and the machine.

use crate::config::{DIAGNOSTIC_CODES, DIAGNOSTIC_PORT};
use crate::phys::PhysAddr;
use crate::port::PortBus;

/// The two divergent exits of the loader
pub trait Handoff {
    /// Transfer control to `entry`. Never returns.
    fn enter(&mut self, entry: PhysAddr) -> !;

    /// Idle forever with no further work
    fn park(&mut self) -> !;
}

impl<T: Handoff + ?Sized> Handoff for &mut T {
    fn enter(&mut self, entry: PhysAddr) -> ! {
        (**self).enter(entry)
    }

    fn park(&mut self) -> ! {
        (**self).park()
    }
}

/// Jump and spin on the real machine
pub struct BareMetal {
    _private: (),
}

impl BareMetal {
    /// # Safety
    ///
    /// `enter` calls whatever address it is handed. The caller vouches that
    /// the loaded image put executable code there.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Handoff for BareMetal {
    fn enter(&mut self, entry: PhysAddr) -> ! {
        // SAFETY: upheld by the contract of `BareMetal::new`
        let kernel_entry: extern "C" fn() -> ! =
            unsafe { core::mem::transmute(entry.as_u32() as usize) };
        kernel_entry()
    }

    fn park(&mut self) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
}

/// Emit the fatal diagnostic codes on the diagnostic port
///
/// Nobody is listening on real hardware; an emulator or debug harness
/// watching the port sees the boot fail.
pub fn signal_failure<B: PortBus>(bus: &mut B) {
    for code in DIAGNOSTIC_CODES {
        bus.write_u16(DIAGNOSTIC_PORT, code);
    }
}
