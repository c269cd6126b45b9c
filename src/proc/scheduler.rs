//! Scheduler boundary.
//!
//! The run queue and context switching belong to the scheduler proper;
//! the trap path only needs the current-process slot, the voluntary
//! preemption point, channel wakeups, and process teardown. The boot
//! shell schedules a single context per core, which keeps these thin.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::println;
use crate::proc::{ProcState, Process, WaitChannel};

static CURRENT: AtomicPtr<Process> = AtomicPtr::new(ptr::null_mut());

/// The process that was executing when the current trap fired, if
/// any. `None` during early boot and on pure kernel-thread cores.
pub fn current() -> Option<&'static Process> {
    let process = CURRENT.load(Ordering::Acquire);
    if process.is_null() {
        None
    } else {
        Some(unsafe { &*process })
    }
}

pub fn set_current(process: &'static Process) {
    CURRENT.store(process as *const Process as *mut Process, Ordering::Release);
}

/// Voluntarily relinquish the processor; returns when this context is
/// scheduled again. With a single runnable context per core that is
/// immediately, but every preemption still funnels through here.
pub fn yield_now() {
    core::hint::spin_loop();
}

/// Wake every context sleeping on the channel.
pub fn wake_all(channel: WaitChannel) {
    if let Some(process) = current() {
        process.wake_if_waiting_on(channel);
    }
}

/// Terminate the current process and reclaim its slot. Does not
/// return; with nothing else runnable the core parks until reset.
pub fn exit_current() -> ! {
    if let Some(process) = current() {
        println!("pid {} ({}): terminated", process.pid(), process.name());
        process.set_state(ProcState::Zombie);
    }
    CURRENT.store(ptr::null_mut(), Ordering::Release);

    loop {
        x86_64::instructions::hlt();
    }
}
