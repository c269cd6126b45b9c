//! # Trap Vector Table
//!
//! Builds the interrupt descriptor table once at boot and activates it
//! per core. All 256 vectors point at their generic entry stub from
//! `trap.S`; only the syscall vector carries a Ring 3 gate, so a user
//! instruction can name exactly one vector on purpose while every
//! fault and device interrupt still arrives through hardware.

use core::mem::size_of_val;

use spin::Lazy;
use x86_64::instructions::tables::lidt;
use x86_64::structures::idt::Entry;
use x86_64::structures::DescriptorTablePointer;
use x86_64::{PrivilegeLevel, VirtAddr};

use crate::interrupts::gdt;

core::arch::global_asm!(include_str!("trap.S"));

pub const VECTOR_COUNT: usize = 256;

/// Deliberate entry from user mode (`int 0x80`).
pub const SYSCALL_VECTOR: u8 = 0x80;
pub const DOUBLE_FAULT_VECTOR: u8 = 8;
pub const PAGE_FAULT_VECTOR: u8 = 14;

extern "C" {
    #[link_name = "trap_vector_table"]
    static VECTORS: [usize; VECTOR_COUNT];
}

static IDT: Lazy<[Entry<()>; VECTOR_COUNT]> = Lazy::new(build);

/// Minimum privilege allowed to raise a vector with an `int`
/// instruction. The hardware gate check rejects anything else coming
/// from user mode before it reaches kernel code.
pub fn gate_privilege(vector: u8) -> PrivilegeLevel {
    if vector == SYSCALL_VECTOR {
        PrivilegeLevel::Ring3
    } else {
        PrivilegeLevel::Ring0
    }
}

pub fn user_may_invoke(vector: u8) -> bool {
    gate_privilege(vector) == PrivilegeLevel::Ring3
}

fn build() -> [Entry<()>; VECTOR_COUNT] {
    let mut table = [const { Entry::missing() }; VECTOR_COUNT];

    // The stub array lives in read-only data and is never mutated, so
    // the shared borrow is always sound.
    let vectors = unsafe { &VECTORS };

    for (vector, &stub) in vectors.iter().enumerate() {
        let mut options = unsafe { table[vector].set_handler_addr(VirtAddr::new(stub as u64)) };
        if user_may_invoke(vector as u8) {
            options.set_privilege_level(PrivilegeLevel::Ring3);
        }
        if vector == DOUBLE_FAULT_VECTOR as usize {
            // Double fault needs its own stack to avoid cascading failures
            unsafe {
                options.set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
            }
        }
    }

    table
}

/// Build the shared table. Runs once, before any core activates it;
/// later calls are no-ops against the same immutable table.
pub fn init() {
    Lazy::force(&IDT);
}

/// Program IDTR with the shared table. Per-core: the table is shared
/// data but the register is not.
pub fn load() {
    let table: &'static [Entry<()>; VECTOR_COUNT] = &IDT;
    let pointer = DescriptorTablePointer {
        limit: (size_of_val(table) - 1) as u16,
        base: VirtAddr::new(table.as_ptr() as u64),
    };
    unsafe { lidt(&pointer) };
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_vector_has_a_stub() {
        let vectors = unsafe { &VECTORS };
        assert_eq!(vectors.len(), VECTOR_COUNT);
        assert!(vectors.iter().all(|&stub| stub != 0));

        let distinct: HashSet<usize> = vectors.iter().copied().collect();
        assert_eq!(distinct.len(), VECTOR_COUNT);
    }

    #[test]
    fn built_table_points_every_gate_at_its_stub() {
        let table = build();
        let vectors = unsafe { &VECTORS };
        for (vector, entry) in table.iter().enumerate() {
            assert_eq!(
                entry.handler_addr().as_u64(),
                vectors[vector] as u64,
                "vector {vector}"
            );
        }
    }

    #[test]
    fn only_the_syscall_gate_opens_to_user_mode() {
        for vector in 0..=u8::MAX {
            assert_eq!(user_may_invoke(vector), vector == SYSCALL_VECTOR);
        }
    }
}
