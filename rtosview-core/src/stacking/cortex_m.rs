//! Cortex-M save areas.
//!
//! The save area starts with the saved stack pointer, followed by the
//! software-saved r4-r11, an optional block of s16-s31 when the FPU context
//! is active, and finally the hardware exception frame (r0-r3, r12, lr, pc,
//! xPSR).

use super::{StackedRegister as R, StackingDescriptor};
use crate::target::HaltedTarget;

/// Coprocessor Access Control Register.
pub const CPACR: u64 = 0xE000_ED88;

/// CP10/CP11 access bits; any of them set means the FPU is enabled.
const CPACR_CP10_CP11: u32 = 0x00F0_0000;

pub const XPSR: u32 = 16;

static REGISTERS: [R; 17] = [
    R::at(0, 0x28),
    R::at(1, 0x2c),
    R::at(2, 0x30),
    R::at(3, 0x34),
    R::at(4, 0x08),
    R::at(5, 0x0c),
    R::at(6, 0x10),
    R::at(7, 0x14),
    R::at(8, 0x18),
    R::at(9, 0x1c),
    R::at(10, 0x20),
    R::at(11, 0x24),
    R::at(12, 0x38),
    R::at(13, 0x00),
    R::at(14, 0x3c),
    R::at(15, 0x40),
    R::at(XPSR, 0x44),
];

pub static STACKING: StackingDescriptor =
    StackingDescriptor { name: "cortex-m", frame_size: 0x48, fpu: false, registers: &REGISTERS };

static REGISTERS_FPU: [R; 17] = [
    R::at(0, 0x6c),
    R::at(1, 0x70),
    R::at(2, 0x74),
    R::at(3, 0x78),
    R::at(4, 0x08),
    R::at(5, 0x0c),
    R::at(6, 0x10),
    R::at(7, 0x14),
    R::at(8, 0x18),
    R::at(9, 0x1c),
    R::at(10, 0x20),
    R::at(11, 0x24),
    R::at(12, 0x7c),
    R::at(13, 0x00),
    R::at(14, 0x80),
    R::at(15, 0x84),
    R::at(XPSR, 0x88),
];

pub static STACKING_FPU: StackingDescriptor = StackingDescriptor {
    name: "cortex-m-fpu",
    frame_size: 0x8c,
    fpu: true,
    registers: &REGISTERS_FPU,
};

/// Whether the FPU is both implemented and enabled in CPACR.
///
/// An unreadable CPACR counts as "no FPU": losing the float context beats
/// failing the whole register fetch.
pub fn fpu_enabled(target: &mut dyn HaltedTarget) -> bool {
    if !target.has_fpu() {
        return false;
    }

    match target.read_u32(CPACR) {
        Ok(cpacr) => cpacr & CPACR_CP10_CP11 != 0,
        Err(e) => {
            log::error!("Could not read CPACR to check FPU state: {e}");
            false
        }
    }
}

pub fn select(target: &mut dyn HaltedTarget) -> &'static StackingDescriptor {
    if fpu_enabled(target) {
        &STACKING_FPU
    } else {
        &STACKING
    }
}
