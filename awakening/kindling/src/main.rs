#![no_std]
#![no_main]

//! # Kindling
//!
//! Bare-metal entry. The startup code in the boot sector has already
//! disabled interrupts, switched modes, identity mapped low memory and set
//! up a stack before calling `bootmain`.

use kindling::{serial_println, BareMetal, HardwarePorts, IdentityMapped, ImageLoader, LoaderConfig};

#[no_mangle]
pub extern "C" fn bootmain() -> ! {
    // SAFETY: nothing else runs yet; we own every port and all of RAM
    let (ports, memory, mut handoff) = unsafe {
        kindling::serial::init();
        (HardwarePorts::new(), IdentityMapped::new(), BareMetal::new())
    };

    serial_println!("[BOOT] kindling: loading kernel from LBA 1");

    ImageLoader::new(ports, memory, LoaderConfig::DEFAULT).boot(&mut handoff)
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    serial_println!("[BOOT] panic: {}", info);
    loop {
        core::hint::spin_loop();
    }
}
