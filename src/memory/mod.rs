//! Virtual-memory boundary consumed by the trap path.
//!
//! Page tables and frame management belong to the memory manager
//! proper; the trap dispatcher only needs the physical-memory mapping
//! captured at boot and a verdict on whether a faulting address can be
//! serviced.

use core::sync::atomic::{AtomicU64, Ordering};

use bootloader_api::BootInfo;
use x86_64::structures::paging::{OffsetPageTable, PageTable, Translate};
use x86_64::VirtAddr;

use crate::trap::Unresolved;

static PHYSICAL_MEMORY_OFFSET: AtomicU64 = AtomicU64::new(0);

/// Capture the bootloader's physical-memory mapping. Must run before
/// the first page fault can be taken.
pub fn init(boot_info: &BootInfo) {
    let phys_offset = boot_info.physical_memory_offset.into_option().unwrap_or(0);
    PHYSICAL_MEMORY_OFFSET.store(phys_offset, Ordering::Release);
}

pub fn physical_memory_offset() -> u64 {
    PHYSICAL_MEMORY_OFFSET.load(Ordering::Acquire)
}

/// The page table the executing core is currently using.
///
/// Callers must guarantee the physical-memory offset recorded at boot
/// still maps all page-table frames.
pub unsafe fn active_page_table() -> OffsetPageTable<'static> {
    let (level_4_frame, _) = x86_64::registers::control::Cr3::read();
    let offset = physical_memory_offset();
    let virt = VirtAddr::new(level_4_frame.start_address().as_u64() + offset);
    let page_table_ptr: *mut PageTable = virt.as_mut_ptr();

    OffsetPageTable::new(&mut *page_table_ptr, VirtAddr::new(offset))
}

/// Attempt to satisfy a user page fault.
///
/// Demand mappings are not populated yet, so the only serviceable
/// case is a fault that lost a race: another core already installed
/// the translation and this core faulted on a stale TLB entry.
pub fn resolve_page_fault(address: VirtAddr) -> Result<(), Unresolved> {
    let mapper = unsafe { active_page_table() };
    match mapper.translate_addr(address) {
        Some(_) => Ok(()),
        None => Err(Unresolved),
    }
}
