//! The process handle consumed by the trap path.
//!
//! The process table itself lives elsewhere; the dispatcher only reads
//! a handle: the kill flag, the scheduling state, identity for
//! diagnostics, and the slot that carries the active trap frame while
//! a system call is serviced.

pub mod scheduler;

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

use spin::Mutex;

use crate::trap::TrapFrame;

/// Identity of a sleep/wake rendezvous: the address of the object
/// being waited on. Never zero, since no waitable object lives at
/// address zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitChannel(usize);

impl WaitChannel {
    pub fn of<T>(object: &T) -> Self {
        Self(object as *const T as usize)
    }

    fn raw(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Embryo,
    Runnable,
    Running,
    Sleeping,
    Zombie,
}

pub struct Process {
    pid: u32,
    name: &'static str,
    state: Mutex<ProcState>,
    killed: AtomicBool,
    wait_channel: AtomicUsize,
    trap_frame: AtomicPtr<TrapFrame>,
}

impl Process {
    pub const fn new(pid: u32, name: &'static str) -> Self {
        Self {
            pid,
            name,
            state: Mutex::new(ProcState::Embryo),
            killed: AtomicBool::new(false),
            wait_channel: AtomicUsize::new(0),
            trap_frame: AtomicPtr::new(core::ptr::null_mut()),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ProcState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: ProcState) {
        *self.state.lock() = state;
    }

    /// Mark the process for termination. The flag may be set from any
    /// core; the trap path enacts it at the next user-mode checkpoint.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub fn killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Park on a channel. The caller transitions the state; waking is
    /// the scheduler's side via [`Process::wake_if_waiting_on`].
    pub fn begin_sleep(&self, channel: WaitChannel) {
        self.wait_channel.store(channel.raw(), Ordering::SeqCst);
        *self.state.lock() = ProcState::Sleeping;
    }

    /// Make the process runnable again if it is sleeping on exactly
    /// this channel. Returns whether it was woken.
    pub fn wake_if_waiting_on(&self, channel: WaitChannel) -> bool {
        let mut state = self.state.lock();
        if *state == ProcState::Sleeping && self.wait_channel.load(Ordering::SeqCst) == channel.raw()
        {
            *state = ProcState::Runnable;
            self.wait_channel.store(0, Ordering::SeqCst);
            return true;
        }
        false
    }

    /// Record the frame of the in-flight trap so the syscall service
    /// can read and mutate the saved registers. The pointer is only
    /// valid until the matching trap return; the dispatcher clears it
    /// on the way out.
    pub fn set_trap_frame(&self, frame: &mut TrapFrame) {
        self.trap_frame.store(frame, Ordering::SeqCst);
    }

    pub fn clear_trap_frame(&self) {
        self.trap_frame
            .store(core::ptr::null_mut(), Ordering::SeqCst);
    }

    pub fn trap_frame_ptr(&self) -> Option<NonNull<TrapFrame>> {
        NonNull::new(self.trap_frame.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_matches_only_its_own_channel() {
        let ticks = 0u64;
        let other = 0u64;
        let process = Process::new(1, "sh");

        process.begin_sleep(WaitChannel::of(&ticks));
        assert_eq!(process.state(), ProcState::Sleeping);

        assert!(!process.wake_if_waiting_on(WaitChannel::of(&other)));
        assert_eq!(process.state(), ProcState::Sleeping);

        assert!(process.wake_if_waiting_on(WaitChannel::of(&ticks)));
        assert_eq!(process.state(), ProcState::Runnable);

        // A second wake on the same channel finds no sleeper.
        assert!(!process.wake_if_waiting_on(WaitChannel::of(&ticks)));
    }

    #[test]
    fn trap_frame_slot_holds_one_frame_at_a_time() {
        let process = Process::new(2, "cat");
        assert!(process.trap_frame_ptr().is_none());

        let mut frame = TrapFrame::zeroed();
        process.set_trap_frame(&mut frame);
        assert!(process.trap_frame_ptr().is_some());

        process.clear_trap_frame();
        assert!(process.trap_frame_ptr().is_none());
    }
}
