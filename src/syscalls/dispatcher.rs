use crate::proc::Process;
use crate::syscalls::handlers;
use crate::syscalls::numbers::SyscallNumber;
use crate::trap::TrapFrame;

/// System call result type
pub type SyscallResult = Result<usize, SyscallError>;

/// System call errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidSyscall,
    InvalidArgument,
    Interrupted,
    PermissionDenied,
    NotImplemented,
    BadFileDescriptor,
    IoError,
}

impl SyscallError {
    pub fn as_errno(self) -> isize {
        match self {
            Self::InvalidSyscall => -1,
            Self::InvalidArgument => -22,  // EINVAL
            Self::Interrupted => -4,       // EINTR
            Self::PermissionDenied => -13, // EACCES
            Self::NotImplemented => -38,   // ENOSYS
            Self::BadFileDescriptor => -9, // EBADF
            Self::IoError => -5,           // EIO
        }
    }
}

/// System call context - the registers of the interrupted caller.
#[derive(Debug, Clone, Copy)]
pub struct SyscallContext {
    pub syscall_num: usize,
    pub arg0: usize,
    pub arg1: usize,
    pub arg2: usize,
}

impl SyscallContext {
    /// Pull the call out of the saved registers.
    ///
    /// x86_64 syscall convention:
    ///   rax = syscall number (return value on the way out)
    ///   rdi = arg0
    ///   rsi = arg1
    ///   rdx = arg2
    pub fn from_frame(frame: &TrapFrame) -> Self {
        Self {
            syscall_num: frame.rax as usize,
            arg0: frame.rdi as usize,
            arg1: frame.rsi as usize,
            arg2: frame.rdx as usize,
        }
    }
}

/// Run the system call named by the process's recorded trap frame and
/// write the result back into its saved `rax`.
pub fn dispatch(process: &Process) {
    let Some(frame_ptr) = process.trap_frame_ptr() else {
        // A syscall trap always records the frame first; a missing
        // frame means the handle is stale.
        process.kill();
        return;
    };
    // Valid for the duration of this trap; the dispatcher clears the
    // slot before returning to the interrupted context.
    let frame = unsafe { &mut *frame_ptr.as_ptr() };

    let ctx = SyscallContext::from_frame(frame);
    let result = dispatch_syscall(process, ctx);

    frame.rax = match result {
        Ok(value) => value as u64,
        Err(error) => error.as_errno() as u64,
    };
}

fn dispatch_syscall(process: &Process, ctx: SyscallContext) -> SyscallResult {
    match SyscallNumber::from(ctx.syscall_num) {
        // I/O Operations
        SyscallNumber::Read => {
            handlers::io::sys_read(ctx.arg0 as i32, ctx.arg1 as *mut u8, ctx.arg2)
        }
        SyscallNumber::Write => {
            handlers::io::sys_write(ctx.arg0 as i32, ctx.arg1 as *const u8, ctx.arg2)
        }

        // Process Management
        SyscallNumber::Exit => handlers::process::sys_exit(process, ctx.arg0 as i32),
        SyscallNumber::GetPid => handlers::process::sys_getpid(process),

        // Time
        SyscallNumber::Sleep => handlers::time::sys_sleep(process, ctx.arg0 as u64),
        SyscallNumber::GetTime => handlers::time::sys_gettime(),

        SyscallNumber::Unknown => {
            crate::println!(
                "pid {} ({}): unknown syscall {}",
                process.pid(),
                process.name(),
                ctx.syscall_num
            );
            Err(SyscallError::InvalidSyscall)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ProcState;

    fn process_with_frame(frame: &mut TrapFrame) -> Process {
        let process = Process::new(11, "sh");
        process.set_state(ProcState::Running);
        process.set_trap_frame(frame);
        process
    }

    #[test]
    fn getpid_returns_through_the_saved_rax() {
        let mut frame = TrapFrame::zeroed();
        frame.rax = SyscallNumber::GetPid as u64;
        let process = process_with_frame(&mut frame);

        dispatch(&process);

        assert_eq!(frame.rax, 11);
        assert!(!process.killed());
    }

    #[test]
    fn exit_marks_the_caller_killed() {
        let mut frame = TrapFrame::zeroed();
        frame.rax = SyscallNumber::Exit as u64;
        let process = process_with_frame(&mut frame);

        dispatch(&process);

        assert!(process.killed());
    }

    #[test]
    fn unknown_numbers_report_an_errno() {
        let mut frame = TrapFrame::zeroed();
        frame.rax = 999;
        let process = process_with_frame(&mut frame);

        dispatch(&process);

        assert_eq!(frame.rax as i64, -1);
    }

    #[test]
    fn a_stale_handle_without_a_frame_is_killed() {
        let process = Process::new(12, "sh");
        dispatch(&process);
        assert!(process.killed());
    }
}
