//! # Programmable Interrupt Controller (8259 PIC)
//!
//! Remaps the legacy 8259 pair away from the CPU exception vectors and
//! names the vectors this kernel services.
//!
//! ## Vector Remapping
//!
//! By default, IRQ 0-15 conflict with CPU exception vectors.
//! We remap them:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! ## Interrupt Assignments
//!
//! | IRQ | Vector | Source              |
//! |-----|--------|---------------------|
//! | 0   | 32     | Timer               |
//! | 1   | 33     | Keyboard            |
//! | 7   | 39     | Spurious            |
//! | 14  | 46     | IDE disk            |

use pic8259::ChainedPics;
use spin::Mutex;

pub const PIC_1_OFFSET: u8 = 32; // Primary PIC handles IRQs 0-7
pub const PIC_2_OFFSET: u8 = 40; // Secondary PIC handles IRQs 8-15

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

// Interrupt indices - these are the actual vector numbers the CPU sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,        // 32 - IRQ0
    Keyboard = PIC_1_OFFSET + 1, // 33 - IRQ1
    Spurious = PIC_1_OFFSET + 7, // 39 - IRQ7, raised with no real source
    Disk = PIC_2_OFFSET + 6,     // 46 - IRQ14, primary IDE channel
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.as_u8())
    }
}

/// Remap the controller pair and unmask the lines this kernel
/// services (timer, keyboard, cascade, disk). Everything else stays
/// masked until a driver claims it.
pub fn init() {
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize();
        let primary = !(1u8 << 0 | 1 << 1 | 1 << 2);
        let secondary = !(1u8 << 6);
        pics.write_masks(primary, secondary);
    }
}

/// Signal end-of-interrupt for the given vector. Must be called
/// exactly once per serviced hardware interrupt, after its handler.
pub fn end_of_interrupt(vector: u8) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(vector);
    }
}
