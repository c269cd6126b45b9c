//! Trap handling: the frame captured at entry, the tick clock, the
//! dispatcher core, and the glue binding them to real hardware.

pub mod dispatch;
pub mod frame;
pub mod ticks;

pub use dispatch::{Dispatcher, Fatal, FatalKind, Services, TrapKind, TrapOutcome, Unresolved};
pub use frame::TrapFrame;
pub use ticks::{TickClock, TIMEKEEPER_CORE};

use x86_64::registers::control::Cr2;
use x86_64::VirtAddr;

use crate::proc::{scheduler, Process, WaitChannel};
use crate::{devices, interrupts, memory, println, syscalls};

/// The kernel's time base, advanced by the timekeeping core.
pub static TICKS: TickClock = TickClock::new();

/// [`Services`] wired to the machine.
struct Hardware;

impl Services for Hardware {
    fn core_id(&self) -> usize {
        interrupts::core_id()
    }

    fn fault_address(&self) -> VirtAddr {
        match Cr2::read() {
            Ok(address) => address,
            Err(_) => VirtAddr::new(0),
        }
    }

    fn end_of_interrupt(&self, vector: u8) {
        interrupts::pic::end_of_interrupt(vector);
    }

    fn wake_all(&self, channel: WaitChannel) {
        scheduler::wake_all(channel);
    }

    fn service_syscall(&self, process: &Process) {
        syscalls::dispatch(process);
    }

    fn resolve_page_fault(&self, address: VirtAddr) -> Result<(), Unresolved> {
        memory::resolve_page_fault(address)
    }

    fn disk_interrupt(&self) {
        devices::drivers::ide::interrupt();
    }

    fn keyboard_interrupt(&self) {
        devices::drivers::ps2_keyboard::interrupt();
    }
}

/// Entry point from `alltraps`. The stub hands over the stack-resident
/// frame; whatever context the frame describes when this returns is
/// the context the stub restores.
#[no_mangle]
extern "C" fn handle_trap(frame: *mut TrapFrame) {
    let frame = unsafe { &mut *frame };

    let dispatcher = Dispatcher::new(&Hardware, &TICKS);
    match dispatcher.dispatch(frame, scheduler::current()) {
        TrapOutcome::Resume => {}
        TrapOutcome::Yield => scheduler::yield_now(),
        TrapOutcome::Exit => scheduler::exit_current(),
        TrapOutcome::Halt(fatal) => halt(&fatal),
    }
}

/// Print the diagnostics and stop the core for good.
fn halt(fatal: &Fatal) -> ! {
    x86_64::instructions::interrupts::disable();
    println!("{}", fatal);
    loop {
        x86_64::instructions::hlt();
    }
}
