//! In-memory halted target.
//!
//! `MemoryImage` stands in for a probe when there is no hardware: tests,
//! benchmarks and the front end's mock mode build a synthetic RAM image with
//! it. Unwritten bytes read as zero. Address ranges can be marked faulty to
//! make reads fail, and every access is recorded so callers can assert which
//! reads a code path issued.

use super::{HaltedTarget, RegisterValue, TargetMemory};
use crate::error::{RtosError, RtosResult};
use std::collections::BTreeMap;
use std::ops::Range;

/// Which path of the target an access went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Memory read of `len` bytes at `address`.
    Memory { address: u64, len: usize },
    /// Live register cache query.
    LiveRegisters,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    bytes: BTreeMap<u64, u8>,
    faults: Vec<Range<u64>>,
    live: Vec<RegisterValue>,
    fpu: bool,
    log: Vec<Access>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_u8(&mut self, address: u64, value: u8) {
        self.bytes.insert(address, value);
    }

    pub fn set_u16(&mut self, address: u64, value: u16) {
        self.set_bytes(address, &value.to_le_bytes());
    }

    pub fn set_u32(&mut self, address: u64, value: u32) {
        self.set_bytes(address, &value.to_le_bytes());
    }

    pub fn set_bytes(&mut self, address: u64, data: &[u8]) {
        for (offset, &byte) in (0u64..).zip(data) {
            self.bytes.insert(address + offset, byte);
        }
    }

    /// Make every read touching `range` fail.
    pub fn fail_range(&mut self, range: Range<u64>) {
        self.faults.push(range);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Register values returned by [`HaltedTarget::live_registers`].
    pub fn set_live_registers(&mut self, registers: Vec<RegisterValue>) {
        self.live = registers;
    }

    pub fn set_fpu(&mut self, present: bool) {
        self.fpu = present;
    }

    /// Accesses issued since creation or the last [`MemoryImage::clear_log`].
    pub fn accesses(&self) -> &[Access] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Whether any memory read touched `range`.
    pub fn was_read(&self, range: Range<u64>) -> bool {
        self.log.iter().any(|access| match *access {
            Access::Memory { address, len } => overlaps(&range, address, len),
            Access::LiveRegisters => false,
        })
    }

    fn fetch(&mut self, address: u64, data: &mut [u8]) -> RtosResult<()> {
        let len = data.len();
        self.log.push(Access::Memory { address, len });

        if self.faults.iter().any(|fault| overlaps(fault, address, len)) {
            return Err(RtosError::read(address, len, "access fault"));
        }

        for (offset, byte) in (0u64..).zip(data.iter_mut()) {
            *byte = self.bytes.get(&(address + offset)).copied().unwrap_or(0);
        }
        Ok(())
    }
}

fn overlaps(range: &Range<u64>, address: u64, len: usize) -> bool {
    let end = address.saturating_add(len as u64);
    address < range.end && range.start < end
}

impl TargetMemory for MemoryImage {
    fn read_u8(&mut self, address: u64) -> RtosResult<u8> {
        let mut b = [0u8; 1];
        self.fetch(address, &mut b)?;
        Ok(b[0])
    }

    fn read_u16(&mut self, address: u64) -> RtosResult<u16> {
        let mut b = [0u8; 2];
        self.fetch(address, &mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn read_u32(&mut self, address: u64) -> RtosResult<u32> {
        let mut b = [0u8; 4];
        self.fetch(address, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn read_buffer(&mut self, address: u64, data: &mut [u8]) -> RtosResult<()> {
        self.fetch(address, data)
    }
}

impl HaltedTarget for MemoryImage {
    fn live_registers(&mut self) -> RtosResult<Vec<RegisterValue>> {
        self.log.push(Access::LiveRegisters);
        Ok(self.live.clone())
    }

    fn has_fpu(&mut self) -> bool {
        self.fpu
    }
}
