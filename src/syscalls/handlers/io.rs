//! # I/O System Call Handlers
//!
//! ## File Descriptors
//!
//! | FD | Stream | Implementation  |
//! |----|--------|-----------------|
//! | 0  | stdin  | Keyboard buffer |
//! | 1  | stdout | Serial port     |
//! | 2  | stderr | Serial port     |

use crate::devices::drivers::ps2_keyboard;
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

/// Read from file descriptor. Returns however many bytes are already
/// buffered, without blocking.
pub fn sys_read(fd: i32, buf: *mut u8, count: usize) -> SyscallResult {
    if buf.is_null() {
        return Err(SyscallError::InvalidArgument);
    }

    match fd {
        0 => {
            let mut read = 0;
            while read < count {
                let Some(scancode) = ps2_keyboard::dequeue_scancode() else {
                    break;
                };
                unsafe { buf.add(read).write(scancode) };
                read += 1;
            }
            Ok(read)
        }
        _ => Err(SyscallError::BadFileDescriptor),
    }
}

/// Write to file descriptor
pub fn sys_write(fd: i32, buf: *const u8, count: usize) -> SyscallResult {
    if buf.is_null() {
        return Err(SyscallError::InvalidArgument);
    }

    match fd {
        1 | 2 => {
            let slice = unsafe { core::slice::from_raw_parts(buf, count) };
            let Ok(text) = core::str::from_utf8(slice) else {
                return Err(SyscallError::InvalidArgument);
            };
            use core::fmt::Write;
            let _ = write!(crate::SERIAL.lock(), "{}", text);
            Ok(count)
        }
        _ => Err(SyscallError::BadFileDescriptor),
    }
}
