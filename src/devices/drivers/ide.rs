//! # IDE Disk Driver (interrupt side)
//!
//! Only the interrupt service half lives here; request submission and
//! the buffer cache are separate concerns. Reading the status register
//! is what deasserts the drive's pending IRQ line.

use x86_64::instructions::port::Port;

const STATUS_PORT: u16 = 0x1F7;

const STATUS_ERR: u8 = 1 << 0;
const STATUS_BUSY: u8 = 1 << 7;

/// Interrupt-side service routine for the primary IDE channel.
pub fn interrupt() {
    let status: u8 = unsafe { Port::new(STATUS_PORT).read() };

    if status & STATUS_BUSY != 0 {
        // Controller raised the line early; it will interrupt again
        // when the transfer settles.
        return;
    }
    if status & STATUS_ERR != 0 {
        crate::println!("ide: drive reported error, status {:#04x}", status);
    }
}
