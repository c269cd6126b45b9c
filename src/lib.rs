//! Trap and interrupt dispatch for a small x86_64 kernel.
//!
//! Everything that moves control between user mode, kernel mode and
//! device interrupts funnels through one place: the assembly entry
//! stubs capture a [`trap::TrapFrame`] and hand it to the
//! [`trap::Dispatcher`], which classifies the vector and decides
//! whether the interrupted context resumes, yields, dies, or takes
//! the whole machine down with it.
//!
//! The library builds for the host as well so the dispatcher core can
//! be unit tested; only the `boot`-gated binary touches real hardware
//! state.

#![cfg_attr(not(test), no_std)]

use spin::Mutex;
use uart_16550::SerialPort;

pub mod devices;
pub mod interrupts;
pub mod kernel;
pub mod memory;
pub mod proc;
pub mod syscalls;
pub mod trap;

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(0x3F8) });

#[cfg(not(test))]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut serial = $crate::SERIAL.lock();
        let _ = writeln!(serial, $($arg)*);
    }};
}

#[cfg(test)]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        std::println!($($arg)*);
    }};
}
