//! # Time System Call Handlers
//!
//! Both calls are views of the tick counter the timekeeping core
//! advances on every timer interrupt.

use crate::proc::Process;
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};
use crate::trap::TICKS;

/// Sleep for the given number of ticks.
///
/// The single-context boot shell has nobody to run instead, so this
/// waits in place with interrupts enabled rather than parking the
/// process on the tick channel. A pending kill cuts the wait short.
pub fn sys_sleep(process: &Process, duration: u64) -> SyscallResult {
    let target = TICKS.ticks() + duration;
    while TICKS.ticks() < target {
        if process.killed() {
            return Err(SyscallError::Interrupted);
        }
        x86_64::instructions::interrupts::enable_and_hlt();
    }
    Ok(0)
}

/// Ticks since boot.
pub fn sys_gettime() -> SyscallResult {
    Ok(TICKS.ticks() as usize)
}
