//! RV32 save area: `epc` in slot 0, then `x1`-`x31` in their natural slots.

use super::{StackedRegister as R, StackingDescriptor};

/// GDB number of the program counter.
pub const PC: u32 = 32;

static REGISTERS: [R; 33] = [
    R::zero(0),
    R::at(1, 0x04),
    R::at(2, 0x08),
    R::at(3, 0x0c),
    R::at(4, 0x10),
    R::at(5, 0x14),
    R::at(6, 0x18),
    R::at(7, 0x1c),
    R::at(8, 0x20),
    R::at(9, 0x24),
    R::at(10, 0x28),
    R::at(11, 0x2c),
    R::at(12, 0x30),
    R::at(13, 0x34),
    R::at(14, 0x38),
    R::at(15, 0x3c),
    R::at(16, 0x40),
    R::at(17, 0x44),
    R::at(18, 0x48),
    R::at(19, 0x4c),
    R::at(20, 0x50),
    R::at(21, 0x54),
    R::at(22, 0x58),
    R::at(23, 0x5c),
    R::at(24, 0x60),
    R::at(25, 0x64),
    R::at(26, 0x68),
    R::at(27, 0x6c),
    R::at(28, 0x70),
    R::at(29, 0x74),
    R::at(30, 0x78),
    R::at(31, 0x7c),
    R::at(PC, 0x00),
];

/// Integer context plus the saved interrupt-context word.
pub static STACKING: StackingDescriptor =
    StackingDescriptor { name: "riscv", frame_size: 33 * 4, fpu: false, registers: &REGISTERS };
