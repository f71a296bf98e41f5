//! Serial Port Logging (UART 16550)
//!
//! Boot-progress lines go to COM1. The port is brought up once from the
//! entry point; before that, output is simply lost. Host tests route the
//! same macros to stderr instead of touching I/O ports.

use core::fmt;
use spin::Mutex;
use x86_64::instructions::port::Port;

/// COM1 base port
const COM1: u16 = 0x3F8;

/// Serial port registers (offsets from base)
const DATA: u16 = 0;          // Data register (DLAB=0), divisor LSB (DLAB=1)
const INT_ENABLE: u16 = 1;    // Interrupt Enable (DLAB=0), divisor MSB (DLAB=1)
const FIFO_CTRL: u16 = 2;
const LINE_CTRL: u16 = 3;
const MODEM_CTRL: u16 = 4;
const LINE_STATUS: u16 = 5;

/// Line status: transmit holding register empty
const LSR_THR_EMPTY: u8 = 0x20;

/// COM1 transmitter
pub struct SerialPort {
    data: Port<u8>,
    int_enable: Port<u8>,
    fifo_ctrl: Port<u8>,
    line_ctrl: Port<u8>,
    modem_ctrl: Port<u8>,
    line_status: Port<u8>,
    ready: bool,
}

impl SerialPort {
    const fn new(base: u16) -> Self {
        Self {
            data: Port::new(base + DATA),
            int_enable: Port::new(base + INT_ENABLE),
            fifo_ctrl: Port::new(base + FIFO_CTRL),
            line_ctrl: Port::new(base + LINE_CTRL),
            modem_ctrl: Port::new(base + MODEM_CTRL),
            line_status: Port::new(base + LINE_STATUS),
            ready: false,
        }
    }

    /// 115200 baud, 8N1, FIFOs on, no interrupts
    unsafe fn init(&mut self) {
        self.int_enable.write(0x00);

        // DLAB on, divisor 1
        self.line_ctrl.write(0x80);
        self.data.write(0x01);
        self.int_enable.write(0x00);

        // 8 data bits, no parity, 1 stop bit, DLAB off
        self.line_ctrl.write(0x03);
        self.fifo_ctrl.write(0xC7);
        self.modem_ctrl.write(0x03);

        self.ready = true;
    }

    unsafe fn write_byte(&mut self, byte: u8) {
        while self.line_status.read() & LSR_THR_EMPTY == 0 {
            core::hint::spin_loop();
        }
        self.data.write(byte);
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if !self.ready {
            return Ok(());
        }
        for byte in s.bytes() {
            unsafe {
                if byte == b'\n' {
                    self.write_byte(b'\r');
                }
                self.write_byte(byte);
            }
        }
        Ok(())
    }
}

static SERIAL1: Mutex<SerialPort> = Mutex::new(SerialPort::new(COM1));

/// Bring up COM1
///
/// # Safety
///
/// Programs the UART registers; nothing else may be driving COM1.
pub unsafe fn init() {
    if cfg!(feature = "serial-log") {
        SERIAL1.lock().init();
    }
}

/// Macro for serial output (like print!)
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

/// Macro for serial output with newline (like println!)
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}

#[doc(hidden)]
#[cfg(not(test))]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    if cfg!(feature = "serial-log") {
        // The port never reports an error; a lost log line is not worth halting over
        let _ = SERIAL1.lock().write_fmt(args);
    }
}

#[doc(hidden)]
#[cfg(test)]
pub fn _print(args: fmt::Arguments) {
    if cfg!(feature = "serial-log") {
        std::eprint!("{}", args);
    }
}
