#![no_std]
#![no_main]

extern crate rlibc;

use bootloader_api::{entry_point, BootInfo};
use core::panic::PanicInfo;

use vexos::devices::drivers::ps2_keyboard;
use vexos::kernel::init_kernel;
use vexos::{memory, println, trap};

entry_point!(kernel_main);

pub fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    vexos::SERIAL.lock().init();
    memory::init(boot_info);

    if init_kernel().is_err() {
        println!("Kernel initialization failed!");
        halt_loop();
    }

    // No process context yet: every trap from here on is kernel-mode,
    // so the dispatcher services interrupts and treats faults as
    // fatal.
    let mut reported = 0;
    loop {
        while let Some(scancode) = ps2_keyboard::dequeue_scancode() {
            println!("keyboard: scancode {:#04x}", scancode);
        }

        let now = trap::TICKS.ticks();
        if now >= reported + 100 {
            println!("uptime: {} ticks", now);
            reported = now;
        }

        x86_64::instructions::hlt();
    }
}

fn halt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    let msg = info.message();
    let loc = info.location();
    println!("PANIC : {} | {:?}", msg, loc);

    halt_loop()
}
