//! Target access.
//!
//! The RTOS backends never talk to a probe directly. They read a halted
//! target through [`TargetMemory`] and, for the task that is currently
//! scheduled, ask [`HaltedTarget`] for the live register file.

pub mod image;

pub use image::MemoryImage;

use crate::error::RtosResult;
use serde::{Deserialize, Serialize};

/// Read-only access to the memory of a halted 32-bit target.
///
/// Multi-byte reads are little-endian on the wire and decoded to host order.
/// Failures are reported, never retried.
pub trait TargetMemory {
    fn read_u8(&mut self, address: u64) -> RtosResult<u8>;

    fn read_u16(&mut self, address: u64) -> RtosResult<u16>;

    fn read_u32(&mut self, address: u64) -> RtosResult<u32>;

    /// Fill `data` with the bytes starting at `address`.
    fn read_buffer(&mut self, address: u64, data: &mut [u8]) -> RtosResult<()>;
}

/// A halted core: its memory plus the register cache of the running context.
pub trait HaltedTarget: TargetMemory {
    /// General registers of the context the core is currently executing.
    fn live_registers(&mut self) -> RtosResult<Vec<RegisterValue>>;

    /// Whether the core architecturally implements a single-precision FPU.
    fn has_fpu(&mut self) -> bool;
}

/// One register of a reconstructed register set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValue {
    /// GDB register number.
    pub number: u32,
    /// Width in bytes.
    pub size: usize,
    /// Little-endian contents, `size` bytes long.
    pub value: Vec<u8>,
}

impl RegisterValue {
    /// The value as an integer, for registers up to 64 bits wide.
    pub fn as_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        let len = self.value.len().min(8);
        bytes[..len].copy_from_slice(&self.value[..len]);
        u64::from_le_bytes(bytes)
    }
}

#[cfg(feature = "hardware")]
mod probe_access {
    use super::TargetMemory;
    use crate::error::{RtosError, RtosResult};
    use probe_rs::MemoryInterface;

    impl<T: MemoryInterface> TargetMemory for T {
        fn read_u8(&mut self, address: u64) -> RtosResult<u8> {
            self.read_word_8(address).map_err(|e| RtosError::read(address, 1, e))
        }

        fn read_u16(&mut self, address: u64) -> RtosResult<u16> {
            self.read_word_16(address).map_err(|e| RtosError::read(address, 2, e))
        }

        fn read_u32(&mut self, address: u64) -> RtosResult<u32> {
            self.read_word_32(address).map_err(|e| RtosError::read(address, 4, e))
        }

        fn read_buffer(&mut self, address: u64, data: &mut [u8]) -> RtosResult<()> {
            let len = data.len();
            self.read_8(address, data).map_err(|e| RtosError::read(address, len, e))
        }
    }
}
