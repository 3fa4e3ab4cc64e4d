//! `g_tcbinfo` decoding.
//!
//! NuttX does not fix the layout of its TCB at build time of the debugger.
//! Instead the kernel exports `g_tcbinfo`, a packed table of little-endian
//! u16 offsets into the TCB. The table is untrusted target data, so it is
//! decoded field by field and sanity checked before any dependent read.

use crate::error::{RtosError, RtosResult};
use crate::target::TargetMemory;

/// Offsets past this point cannot belong to a real TCB.
pub const MAX_TCB_OFFSET: u16 = 0x1000;

/// Byte offset of `regs_off` inside the encoded table.
pub const REGS_OFF_POSITION: u64 = 8;

/// Control-block layout exported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcbInfo {
    pub pid_off: u16,
    pub state_off: u16,
    pub pri_off: u16,
    pub name_off: u16,
    pub regs_off: u16,
    pub basic_num: u16,
    pub total_num: u16,
}

impl TcbInfo {
    /// Encoded size of the table.
    pub const SIZE: usize = 14;

    /// Decode the wire form. Does not validate.
    pub fn decode(raw: &[u8; Self::SIZE]) -> Self {
        let field = |i: usize| u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]);
        Self {
            pid_off: field(0),
            state_off: field(1),
            pri_off: field(2),
            name_off: field(3),
            regs_off: field(4),
            basic_num: field(5),
            total_num: field(6),
        }
    }

    /// Fetch, decode and validate the table at `address`.
    pub fn read(target: &mut dyn TargetMemory, address: u64) -> RtosResult<Self> {
        let mut raw = [0u8; Self::SIZE];
        target.read_buffer(address, &mut raw)?;
        let info = Self::decode(&raw);
        info.validate()?;
        Ok(info)
    }

    /// Check the offsets that lead to a target read. `pri_off` and the
    /// register counts are never dereferenced and may hold anything.
    pub fn validate(&self) -> RtosResult<()> {
        let offsets = [
            ("pid_off", self.pid_off),
            ("state_off", self.state_off),
            ("name_off", self.name_off),
            ("regs_off", self.regs_off),
        ];

        for (field, offset) in offsets {
            if offset >= MAX_TCB_OFFSET {
                return Err(RtosError::malformed(
                    "g_tcbinfo",
                    format!("{field} = {offset:#x} is beyond any plausible TCB"),
                ));
            }
        }
        Ok(())
    }
}

/// Address of a TCB field, refusing to wrap the 32-bit address space.
pub fn field_address(tcb: u32, offset: u16) -> RtosResult<u64> {
    tcb.checked_add(u32::from(offset)).map(u64::from).ok_or_else(|| {
        RtosError::malformed("TCB address", format!("{tcb:#010x} + {offset:#x} overflows"))
    })
}
