/// Kernel initialization phases
use crate::kernel::status::{register_component, update_component_status, InitStatus};
use crate::println;

const PHASES: usize = 3;

/// Initialize kernel in proper order with error handling
pub fn init_kernel() -> Result<(), &'static str> {
    register_component("Segmentation");
    register_component("Trap Vectors");
    register_component("Interrupt Controller");

    println!("vexos: bringing up trap delivery");

    init_phase(1, "Segmentation", init_segmentation)?;
    init_phase(2, "Trap Vectors", init_trap_vectors)?;
    init_phase(3, "Interrupt Controller", init_interrupt_controller)?;

    println!("vexos: interrupts live\n");
    Ok(())
}

fn init_phase(
    index: usize,
    name: &'static str,
    init_fn: fn() -> Result<(), &'static str>,
) -> Result<(), &'static str> {
    update_component_status(name, InitStatus::InProgress);
    println!("[{}/{}] Initializing {}...", index, PHASES, name);

    match init_fn() {
        Ok(()) => {
            update_component_status(name, InitStatus::Completed);
            Ok(())
        }
        Err(e) => {
            update_component_status(name, InitStatus::Failed(e));
            println!("    {} failed: {}", name, e);
            Err(e)
        }
    }
}

fn init_segmentation() -> Result<(), &'static str> {
    crate::interrupts::gdt::init();
    Ok(())
}

fn init_trap_vectors() -> Result<(), &'static str> {
    crate::interrupts::idt::init();
    crate::interrupts::idt::load();
    Ok(())
}

fn init_interrupt_controller() -> Result<(), &'static str> {
    crate::interrupts::pic::init();
    x86_64::instructions::interrupts::enable();
    Ok(())
}
