//! Device Subsystem
//!
//! Hardware device drivers whose interrupts arrive through the trap
//! dispatcher:
//! - `drivers::ps2_keyboard`: PS/2 keyboard (IRQ1)
//! - `drivers::ide`: IDE disk (IRQ14)

pub mod drivers;
