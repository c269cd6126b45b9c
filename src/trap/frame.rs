//! The register snapshot captured at trap entry.

use x86_64::VirtAddr;

/// Saved state of the interrupted context.
///
/// Field order mirrors the stack image built by the entry stubs: the
/// general-purpose registers pushed by `alltraps` (last push at the
/// lowest address), the vector number and error code pushed by the
/// per-vector stub, then the hardware-pushed interrupt frame. The
/// frame lives on the trap stack and is only valid until the trap
/// returns.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,

    pub trap_no: u64,
    pub error_code: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

// alltraps pushes 15 registers on top of the 7 stub/hardware words.
const _: () = assert!(core::mem::size_of::<TrapFrame>() == 22 * 8);

impl TrapFrame {
    pub const fn zeroed() -> Self {
        Self {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            r11: 0,
            r10: 0,
            r9: 0,
            r8: 0,
            rbp: 0,
            rdi: 0,
            rsi: 0,
            rdx: 0,
            rcx: 0,
            rbx: 0,
            rax: 0,
            trap_no: 0,
            error_code: 0,
            rip: 0,
            cs: 0,
            rflags: 0,
            rsp: 0,
            ss: 0,
        }
    }

    /// Whether the interrupted context was executing in user mode,
    /// from the privilege bits of the saved code segment selector.
    pub fn from_user_mode(&self) -> bool {
        self.cs & 0b11 == 0b11
    }

    pub fn instruction_pointer(&self) -> VirtAddr {
        VirtAddr::new(self.rip)
    }

    pub fn stack_pointer(&self) -> VirtAddr {
        VirtAddr::new(self.rsp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_bits_of_the_saved_selector_decide_user_mode() {
        let mut frame = TrapFrame::zeroed();

        frame.cs = 0x08; // kernel code selector, RPL 0
        assert!(!frame.from_user_mode());

        frame.cs = 0x23; // user code selector, RPL 3
        assert!(frame.from_user_mode());
    }
}
