//! Central trap classification and dispatch.
//!
//! One invocation per trap. The dispatcher never enacts scheduling
//! decisions itself; it returns a [`TrapOutcome`] and the entry glue
//! resumes, yields, terminates the process, or halts the machine.
//! That keeps every irrevocable decision observable as a value.

use core::fmt;

use x86_64::VirtAddr;

use crate::interrupts::idt::{PAGE_FAULT_VECTOR, SYSCALL_VECTOR};
use crate::interrupts::pic::InterruptIndex;
use crate::println;
use crate::proc::{ProcState, Process, WaitChannel};
use crate::trap::frame::TrapFrame;
use crate::trap::ticks::{TickClock, TIMEKEEPER_CORE};

const SYSCALL: u64 = SYSCALL_VECTOR as u64;
const TIMER: u64 = InterruptIndex::Timer as u64;
const KEYBOARD: u64 = InterruptIndex::Keyboard as u64;
const SPURIOUS: u64 = InterruptIndex::Spurious as u64;
const DISK: u64 = InterruptIndex::Disk as u64;
const PAGE_FAULT: u64 = PAGE_FAULT_VECTOR as u64;

/// The closed set of trap classes this kernel distinguishes. Any
/// vector without a dedicated arm lands in `Other` and is treated as
/// unexpected; nothing falls through silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    Syscall,
    Timer,
    Disk,
    Keyboard,
    Spurious,
    PageFault,
    Other(u64),
}

impl TrapKind {
    pub fn of(vector: u64) -> Self {
        match vector {
            SYSCALL => Self::Syscall,
            TIMER => Self::Timer,
            DISK => Self::Disk,
            KEYBOARD => Self::Keyboard,
            SPURIOUS => Self::Spurious,
            PAGE_FAULT => Self::PageFault,
            vector => Self::Other(vector),
        }
    }
}

/// What the interrupted core does after the dispatcher returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Restore the interrupted context.
    Resume,
    /// Give up the processor at the designated preemption point.
    Yield,
    /// Terminate the current process; it does not return from this
    /// trap.
    Exit,
    /// Stop the whole machine. Never recovered.
    Halt(Fatal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    PageFaultInKernel,
    PageFaultUnresolved,
    UnexpectedKernelTrap,
}

impl fmt::Display for FatalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageFaultInKernel => write!(f, "page fault in kernel mode"),
            Self::PageFaultUnresolved => write!(f, "unresolvable user page fault"),
            Self::UnexpectedKernelTrap => write!(f, "unexpected trap in kernel mode"),
        }
    }
}

/// Diagnostics carried by a fatal halt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fatal {
    pub kind: FatalKind,
    pub trap_no: u64,
    pub rip: VirtAddr,
    pub rsp: VirtAddr,
    pub fault_address: Option<VirtAddr>,
    pub core: usize,
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on core {}: trap {} rip={:#x} rsp={:#x}",
            self.kind, self.core, self.trap_no, self.rip, self.rsp
        )?;
        if let Some(address) = self.fault_address {
            write!(f, " fault address={:#x}", address)?;
        }
        Ok(())
    }
}

/// A page fault the resolver cannot service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unresolved;

/// The kernel services the dispatcher drives. The real implementation
/// wires these to the interrupt controller, drivers, resolver and
/// scheduler; tests substitute a recording double.
pub trait Services {
    fn core_id(&self) -> usize;

    /// Contents of the faulting-address register.
    fn fault_address(&self) -> VirtAddr;

    /// End-of-interrupt toward the interrupt controller. Exactly once
    /// per serviced hardware interrupt.
    fn end_of_interrupt(&self, vector: u8);

    fn wake_all(&self, channel: WaitChannel);

    /// Run the system call named by the process's saved registers,
    /// writing the return value into its recorded trap frame.
    fn service_syscall(&self, process: &Process);

    fn resolve_page_fault(&self, address: VirtAddr) -> Result<(), Unresolved>;

    fn disk_interrupt(&self);

    fn keyboard_interrupt(&self);
}

pub struct Dispatcher<'a, S: Services> {
    services: &'a S,
    clock: &'a TickClock,
}

impl<'a, S: Services> Dispatcher<'a, S> {
    pub fn new(services: &'a S, clock: &'a TickClock) -> Self {
        Self { services, clock }
    }

    /// Classify and service one trap. Interrupts stay disabled on this
    /// core for the duration; nothing here blocks.
    pub fn dispatch(&self, frame: &mut TrapFrame, current: Option<&Process>) -> TrapOutcome {
        let kind = TrapKind::of(frame.trap_no);
        let from_user = frame.from_user_mode();

        match kind {
            TrapKind::Syscall => return self.syscall(frame, current),
            TrapKind::Timer => {
                if self.services.core_id() == TIMEKEEPER_CORE {
                    self.clock.tick(self.services);
                }
                self.services.end_of_interrupt(frame.trap_no as u8);
            }
            TrapKind::Disk => {
                self.services.disk_interrupt();
                self.services.end_of_interrupt(frame.trap_no as u8);
            }
            TrapKind::Keyboard => {
                self.services.keyboard_interrupt();
                self.services.end_of_interrupt(frame.trap_no as u8);
            }
            TrapKind::Spurious => {
                println!(
                    "core {}: spurious interrupt at {:#x}:{:#x}",
                    self.services.core_id(),
                    frame.cs,
                    frame.rip
                );
                self.services.end_of_interrupt(frame.trap_no as u8);
            }
            TrapKind::PageFault => {
                let address = self.services.fault_address();
                if current.is_none() || !from_user {
                    // A fault while the kernel itself was executing
                    // means a kernel invariant broke; continuing
                    // would risk silent corruption.
                    return TrapOutcome::Halt(self.fatal(
                        FatalKind::PageFaultInKernel,
                        frame,
                        Some(address),
                    ));
                }
                if self.services.resolve_page_fault(address).is_err() {
                    return TrapOutcome::Halt(self.fatal(
                        FatalKind::PageFaultUnresolved,
                        frame,
                        Some(address),
                    ));
                }
            }
            TrapKind::Other(vector) => match current {
                Some(process) if from_user => {
                    // User-space misbehavior: only the offender pays.
                    println!(
                        "pid {} ({}): trap {} err {} on core {} rip={:#x} fault address={:#x} -- killing process",
                        process.pid(),
                        process.name(),
                        vector,
                        frame.error_code,
                        self.services.core_id(),
                        frame.rip,
                        self.services.fault_address()
                    );
                    process.kill();
                }
                _ => {
                    return TrapOutcome::Halt(self.fatal(
                        FatalKind::UnexpectedKernelTrap,
                        frame,
                        Some(self.services.fault_address()),
                    ));
                }
            },
        }

        if let Some(process) = current {
            // Enact a pending kill only at the user-mode boundary; a
            // context still inside the kernel may hold locks or
            // half-updated state and runs to its own syscall return.
            if process.killed() && from_user {
                return TrapOutcome::Exit;
            }
            if process.state() == ProcState::Running && kind == TrapKind::Timer {
                return TrapOutcome::Yield;
            }
        }

        TrapOutcome::Resume
    }

    fn syscall(&self, frame: &mut TrapFrame, current: Option<&Process>) -> TrapOutcome {
        // The syscall gate is user-invocable, so a trap here without a
        // process context cannot be hardware's doing.
        let Some(process) = current else {
            return TrapOutcome::Halt(self.fatal(FatalKind::UnexpectedKernelTrap, frame, None));
        };

        if process.killed() {
            return TrapOutcome::Exit;
        }

        process.set_trap_frame(frame);
        self.services.service_syscall(process);
        process.clear_trap_frame();

        // The call may have asked for its own termination.
        if process.killed() {
            TrapOutcome::Exit
        } else {
            TrapOutcome::Resume
        }
    }

    fn fatal(&self, kind: FatalKind, frame: &TrapFrame, fault_address: Option<VirtAddr>) -> Fatal {
        Fatal {
            kind,
            trap_no: frame.trap_no,
            rip: frame.instruction_pointer(),
            rsp: frame.stack_pointer(),
            fault_address,
            core: self.services.core_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::vec::Vec;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Eoi(u8),
        Wake(WaitChannel),
        Syscall,
        Resolve(u64),
        Disk,
        Keyboard,
    }

    struct MockServices {
        core: usize,
        fault_address: u64,
        resolve: Cell<bool>,
        kill_on_syscall: Cell<bool>,
        frame_seen_by_syscall: Cell<bool>,
        events: RefCell<Vec<Event>>,
    }

    impl MockServices {
        fn new() -> Self {
            Self {
                core: TIMEKEEPER_CORE,
                fault_address: 0xdead_b000,
                resolve: Cell::new(true),
                kill_on_syscall: Cell::new(false),
                frame_seen_by_syscall: Cell::new(false),
                events: RefCell::new(Vec::new()),
            }
        }

        fn on_core(core: usize) -> Self {
            Self {
                core,
                ..Self::new()
            }
        }

        fn events(&self) -> Vec<Event> {
            self.events.borrow().clone()
        }

        fn count(&self, event: Event) -> usize {
            self.events.borrow().iter().filter(|&&e| e == event).count()
        }

        fn record(&self, event: Event) {
            self.events.borrow_mut().push(event);
        }
    }

    impl Services for MockServices {
        fn core_id(&self) -> usize {
            self.core
        }

        fn fault_address(&self) -> VirtAddr {
            VirtAddr::new(self.fault_address)
        }

        fn end_of_interrupt(&self, vector: u8) {
            self.record(Event::Eoi(vector));
        }

        fn wake_all(&self, channel: WaitChannel) {
            self.record(Event::Wake(channel));
        }

        fn service_syscall(&self, process: &Process) {
            self.frame_seen_by_syscall
                .set(process.trap_frame_ptr().is_some());
            if self.kill_on_syscall.get() {
                process.kill();
            }
            self.record(Event::Syscall);
        }

        fn resolve_page_fault(&self, address: VirtAddr) -> Result<(), Unresolved> {
            self.record(Event::Resolve(address.as_u64()));
            if self.resolve.get() {
                Ok(())
            } else {
                Err(Unresolved)
            }
        }

        fn disk_interrupt(&self) {
            self.record(Event::Disk);
        }

        fn keyboard_interrupt(&self) {
            self.record(Event::Keyboard);
        }
    }

    fn frame_for(vector: u64, from_user: bool) -> TrapFrame {
        let mut frame = TrapFrame::zeroed();
        frame.trap_no = vector;
        frame.cs = if from_user { 0x23 } else { 0x08 };
        frame.rip = 0x40_0000;
        frame.rsp = 0x7fff_f000;
        frame
    }

    fn running_process(pid: u32, name: &'static str) -> Process {
        let process = Process::new(pid, name);
        process.set_state(ProcState::Running);
        process
    }

    #[test]
    fn classifies_every_serviced_vector() {
        assert_eq!(TrapKind::of(0x80), TrapKind::Syscall);
        assert_eq!(TrapKind::of(32), TrapKind::Timer);
        assert_eq!(TrapKind::of(33), TrapKind::Keyboard);
        assert_eq!(TrapKind::of(39), TrapKind::Spurious);
        assert_eq!(TrapKind::of(46), TrapKind::Disk);
        assert_eq!(TrapKind::of(14), TrapKind::PageFault);
        assert_eq!(TrapKind::of(3), TrapKind::Other(3));
        assert_eq!(TrapKind::of(47), TrapKind::Other(47));
    }

    #[test]
    fn killed_process_never_reaches_the_syscall_service() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(3, "sh");
        process.kill();

        let mut frame = frame_for(SYSCALL, true);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        assert_eq!(outcome, TrapOutcome::Exit);
        assert_eq!(services.count(Event::Syscall), 0);
    }

    #[test]
    fn syscall_service_sees_the_recorded_frame() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(3, "sh");

        let mut frame = frame_for(SYSCALL, true);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        assert_eq!(outcome, TrapOutcome::Resume);
        assert_eq!(services.events(), vec![Event::Syscall]);
        assert!(services.frame_seen_by_syscall.get());
        // The frame is stack-transient; the slot must not outlive the
        // trap.
        assert!(process.trap_frame_ptr().is_none());
    }

    #[test]
    fn a_syscall_that_requests_exit_terminates_after_service() {
        let services = MockServices::new();
        services.kill_on_syscall.set(true);
        let clock = TickClock::new();
        let process = running_process(4, "init");

        let mut frame = frame_for(SYSCALL, true);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        assert_eq!(outcome, TrapOutcome::Exit);
        assert_eq!(services.count(Event::Syscall), 1);
    }

    #[test]
    fn syscall_without_a_process_halts() {
        let services = MockServices::new();
        let clock = TickClock::new();

        let mut frame = frame_for(SYSCALL, false);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, None);

        match outcome {
            TrapOutcome::Halt(fatal) => {
                assert_eq!(fatal.kind, FatalKind::UnexpectedKernelTrap);
                assert_eq!(fatal.trap_no, SYSCALL);
            }
            other => panic!("expected halt, got {other:?}"),
        }
    }

    #[test]
    fn timekeeping_core_ticks_and_wakes_exactly_once() {
        let services = MockServices::new();
        let clock = TickClock::new();

        let mut frame = frame_for(TIMER, false);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, None);

        assert_eq!(outcome, TrapOutcome::Resume);
        assert_eq!(clock.ticks(), 1);
        assert_eq!(
            services.events(),
            vec![Event::Wake(clock.channel()), Event::Eoi(TIMER as u8)]
        );
    }

    #[test]
    fn other_cores_acknowledge_the_timer_without_ticking() {
        let services = MockServices::on_core(1);
        let clock = TickClock::new();

        let mut frame = frame_for(TIMER, false);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, None);

        assert_eq!(outcome, TrapOutcome::Resume);
        assert_eq!(clock.ticks(), 0);
        assert_eq!(services.events(), vec![Event::Eoi(TIMER as u8)]);
    }

    #[test]
    fn timer_preempts_a_running_process_after_acknowledgment() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(5, "loop");

        let mut frame = frame_for(TIMER, true);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        assert_eq!(outcome, TrapOutcome::Yield);
        assert_eq!(services.count(Event::Eoi(TIMER as u8)), 1);
    }

    #[test]
    fn timer_does_not_preempt_a_sleeping_process() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(5, "loop");
        process.set_state(ProcState::Sleeping);

        let mut frame = frame_for(TIMER, false);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        assert_eq!(outcome, TrapOutcome::Resume);
    }

    #[test]
    fn device_interrupts_are_forwarded_then_acknowledged_once() {
        for (vector, service_event) in [(KEYBOARD, Event::Keyboard), (DISK, Event::Disk)] {
            let services = MockServices::new();
            let clock = TickClock::new();

            let mut frame = frame_for(vector, false);
            let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, None);

            assert_eq!(outcome, TrapOutcome::Resume);
            assert_eq!(
                services.events(),
                vec![service_event, Event::Eoi(vector as u8)]
            );
        }
    }

    #[test]
    fn spurious_interrupts_are_acknowledged_and_nothing_more() {
        let services = MockServices::new();
        let clock = TickClock::new();

        let mut frame = frame_for(SPURIOUS, false);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, None);

        assert_eq!(outcome, TrapOutcome::Resume);
        assert_eq!(services.events(), vec![Event::Eoi(SPURIOUS as u8)]);
    }

    #[test]
    fn page_fault_in_kernel_mode_is_fatal_without_touching_the_resolver() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(6, "sh");

        let mut frame = frame_for(PAGE_FAULT, false);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        match outcome {
            TrapOutcome::Halt(fatal) => {
                assert_eq!(fatal.kind, FatalKind::PageFaultInKernel);
                assert_eq!(fatal.fault_address, Some(VirtAddr::new(0xdead_b000)));
                assert_eq!(fatal.core, TIMEKEEPER_CORE);
            }
            other => panic!("expected halt, got {other:?}"),
        }
        assert_eq!(services.count(Event::Resolve(0xdead_b000)), 0);
        assert!(!process.killed());
    }

    #[test]
    fn page_fault_without_a_process_is_fatal() {
        let services = MockServices::new();
        let clock = TickClock::new();

        let mut frame = frame_for(PAGE_FAULT, false);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, None);

        assert!(matches!(
            outcome,
            TrapOutcome::Halt(Fatal {
                kind: FatalKind::PageFaultInKernel,
                ..
            })
        ));
    }

    #[test]
    fn resolved_user_page_fault_resumes() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(7, "cat");

        let mut frame = frame_for(PAGE_FAULT, true);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        assert_eq!(outcome, TrapOutcome::Resume);
        assert_eq!(services.events(), vec![Event::Resolve(0xdead_b000)]);
    }

    #[test]
    fn unresolved_user_page_fault_halts() {
        let services = MockServices::new();
        services.resolve.set(false);
        let clock = TickClock::new();
        let process = running_process(7, "cat");

        let mut frame = frame_for(PAGE_FAULT, true);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        assert!(matches!(
            outcome,
            TrapOutcome::Halt(Fatal {
                kind: FatalKind::PageFaultUnresolved,
                ..
            })
        ));
    }

    #[test]
    fn unknown_trap_from_user_mode_kills_only_the_offender() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(8, "bad");

        let mut frame = frame_for(6, true); // invalid opcode
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        // Killed in user mode, so termination happens on this trap.
        assert_eq!(outcome, TrapOutcome::Exit);
        assert!(process.killed());
    }

    #[test]
    fn unknown_trap_in_kernel_mode_halts_with_diagnostics() {
        let services = MockServices::on_core(2);
        let clock = TickClock::new();
        let process = running_process(8, "sh");

        let mut frame = frame_for(13, false); // general protection
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        match outcome {
            TrapOutcome::Halt(fatal) => {
                assert_eq!(fatal.kind, FatalKind::UnexpectedKernelTrap);
                assert_eq!(fatal.trap_no, 13);
                assert_eq!(fatal.core, 2);
                assert_eq!(fatal.rip, VirtAddr::new(0x40_0000));
                assert_eq!(fatal.rsp, VirtAddr::new(0x7fff_f000));
            }
            other => panic!("expected halt, got {other:?}"),
        }
        assert!(!process.killed());
    }

    #[test]
    fn kill_is_deferred_while_the_context_is_in_kernel_mode() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(9, "sh");
        process.kill();

        // Interrupt lands while the process executes kernel code: it
        // keeps running until it reaches its own user-mode boundary.
        let mut frame = frame_for(KEYBOARD, false);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));
        assert_ne!(outcome, TrapOutcome::Exit);

        // The next trap out of user mode enacts the kill.
        let mut frame = frame_for(KEYBOARD, true);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));
        assert_eq!(outcome, TrapOutcome::Exit);
    }

    #[test]
    fn a_pending_kill_beats_the_timer_yield() {
        let services = MockServices::new();
        let clock = TickClock::new();
        let process = running_process(10, "loop");
        process.kill();

        let mut frame = frame_for(TIMER, true);
        let outcome = Dispatcher::new(&services, &clock).dispatch(&mut frame, Some(&process));

        assert_eq!(outcome, TrapOutcome::Exit);
        // The interrupt itself was still serviced and acknowledged.
        assert_eq!(services.count(Event::Eoi(TIMER as u8)), 1);
    }
}
