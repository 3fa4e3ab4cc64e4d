//! Saved-context layouts.
//!
//! A task that is not running keeps its registers in a save area pointed to
//! by its control block. A [`StackingDescriptor`] says where each register
//! sits inside that area for one architecture variant. The tables are pure
//! data; [`unstack`] is the only code that interprets them.

pub mod cortex_m;
pub mod riscv;

use crate::error::{RtosError, RtosResult};
use crate::target::{HaltedTarget, RegisterValue};

/// Where a register lives inside the save area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSlot {
    /// Byte offset from the start of the save area.
    Offset(u32),
    /// Not saved; the register is hard-wired to zero.
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackedRegister {
    /// GDB register number.
    pub number: u32,
    /// Width in bytes.
    pub size: u8,
    pub slot: StackSlot,
}

impl StackedRegister {
    pub(crate) const fn at(number: u32, offset: u32) -> Self {
        Self { number, size: 4, slot: StackSlot::Offset(offset) }
    }

    pub(crate) const fn zero(number: u32) -> Self {
        Self { number, size: 4, slot: StackSlot::Zero }
    }
}

/// Layout of one saved register context.
#[derive(Debug, PartialEq, Eq)]
pub struct StackingDescriptor {
    pub name: &'static str,
    /// Size of the whole save area in bytes.
    pub frame_size: u32,
    /// Whether the frame carries the extended floating-point context.
    pub fpu: bool,
    /// Output registers, in the order they are reported.
    pub registers: &'static [StackedRegister],
}

/// Architecture family a binding unstacks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchFamily {
    /// ARMv6-M/ARMv7-M/ARMv8-M, with or without FPv4-SP.
    CortexM,
    /// RV32 without floating point context.
    RiscV,
}

impl ArchFamily {
    /// Pick the descriptor matching the target's current configuration.
    ///
    /// Cortex-M queries the FPU live; RISC-V always uses one frame.
    pub fn select_stacking(self, target: &mut dyn HaltedTarget) -> &'static StackingDescriptor {
        match self {
            Self::CortexM => cortex_m::select(target),
            Self::RiscV => &riscv::STACKING,
        }
    }
}

/// Rebuild a register set from the save area at `frame_address`.
///
/// The whole frame is fetched with one read, then sliced in descriptor order.
pub fn unstack(
    target: &mut dyn HaltedTarget,
    stacking: &StackingDescriptor,
    frame_address: u32,
) -> RtosResult<Vec<RegisterValue>> {
    let base = u64::from(frame_address);
    if base + u64::from(stacking.frame_size) > u64::from(u32::MAX) + 1 {
        return Err(RtosError::malformed(
            "register save area",
            format!("{} byte frame at {frame_address:#010x} wraps the address space", stacking.frame_size),
        ));
    }

    let mut frame = vec![0u8; stacking.frame_size as usize];
    target.read_buffer(base, &mut frame)?;

    let registers = stacking
        .registers
        .iter()
        .map(|reg| {
            let size = usize::from(reg.size);
            let value = match reg.slot {
                StackSlot::Offset(offset) => {
                    let start = offset as usize;
                    frame[start..start + size].to_vec()
                }
                StackSlot::Zero => vec![0; size],
            };
            RegisterValue { number: reg.number, size, value }
        })
        .collect();

    Ok(registers)
}
