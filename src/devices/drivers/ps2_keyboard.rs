//! # PS/2 Keyboard Driver
//!
//! Handles PS/2 keyboard input via IRQ1.
//!
//! The interrupt handler reads the scancode from port 0x60 and pushes
//! it into a lock-free single-producer/single-consumer ring buffer;
//! consumers drain it outside interrupt context with
//! [`dequeue_scancode`]. When the buffer is full the newest scancode
//! is dropped rather than blocking in the handler.

use core::sync::atomic::{AtomicUsize, Ordering};

const DATA_PORT: u16 = 0x60;
const BUFFER_SIZE: usize = 256;

static mut RING_BUF: [u8; BUFFER_SIZE] = [0; BUFFER_SIZE];
static HEAD: AtomicUsize = AtomicUsize::new(0);
static TAIL: AtomicUsize = AtomicUsize::new(0);

/// Interrupt-side service routine: pull the pending scancode off the
/// controller and buffer it.
pub fn interrupt() {
    let scancode: u8 = unsafe { x86_64::instructions::port::Port::new(DATA_PORT).read() };
    enqueue_scancode(scancode);
}

pub fn enqueue_scancode(scancode: u8) {
    let head = HEAD.load(Ordering::Relaxed);
    let next = head.wrapping_add(1) % BUFFER_SIZE;
    let tail = TAIL.load(Ordering::Acquire);
    if next != tail {
        unsafe {
            core::ptr::addr_of_mut!(RING_BUF[head]).write(scancode);
        }
        HEAD.store(next, Ordering::Release);
    }
}

pub fn dequeue_scancode() -> Option<u8> {
    let tail = TAIL.load(Ordering::Relaxed);
    let head = HEAD.load(Ordering::Acquire);
    if tail == head {
        None
    } else {
        let scancode = unsafe { core::ptr::addr_of!(RING_BUF[tail]).read() };
        let next = tail.wrapping_add(1) % BUFFER_SIZE;
        TAIL.store(next, Ordering::Release);
        Some(scancode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The ring is global state; exercise it in one test to keep the
    // producer/consumer pairing deterministic.
    #[test]
    fn scancodes_come_back_out_in_order() {
        assert_eq!(dequeue_scancode(), None);

        enqueue_scancode(0x1e);
        enqueue_scancode(0x9e);
        assert_eq!(dequeue_scancode(), Some(0x1e));
        assert_eq!(dequeue_scancode(), Some(0x9e));
        assert_eq!(dequeue_scancode(), None);
    }
}
