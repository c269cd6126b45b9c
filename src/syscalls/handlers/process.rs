use crate::proc::Process;
use crate::syscalls::dispatcher::SyscallResult;

/// Exit the current process. The caller is marked killed here; the
/// trap dispatcher enacts the termination on the way back out, once
/// no kernel invariants are held.
pub fn sys_exit(process: &Process, status: i32) -> SyscallResult {
    crate::println!(
        "pid {} ({}): exit({})",
        process.pid(),
        process.name(),
        status
    );
    process.kill();
    Ok(0)
}

/// Get current process ID
pub fn sys_getpid(process: &Process) -> SyscallResult {
    Ok(process.pid() as usize)
}
