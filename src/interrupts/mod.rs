//! Interrupt delivery plumbing: segmentation, the trap vector table,
//! and the legacy 8259 interrupt controller.

pub mod gdt;
pub mod idt;
pub mod pic;

/// Activate the shared trap vector table on the executing core. The
/// table is shared, read-only data, but the IDTR register is per-core,
/// so every core passes through here once during bring-up.
pub fn activate() {
    idt::load();
}

/// Initial APIC id of the executing core, from CPUID leaf 1.
pub fn core_id() -> usize {
    let leaf = unsafe { core::arch::x86_64::__cpuid(1) };
    (leaf.ebx >> 24) as usize
}
