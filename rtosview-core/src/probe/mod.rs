//! Probe management module.
//!
//! Handles probe enumeration and attaching, and lets a probe-rs core serve as
//! the halted target of an RTOS session.

use crate::error::{RtosError, RtosResult};
use crate::target::{HaltedTarget, RegisterValue};
use anyhow::{Context, Result};
use probe_rs::probe::list::Lister;
use probe_rs::probe::{DebugProbeInfo, Probe};
use probe_rs::{Core, CoreType, Permissions, Session};
use serde::Serialize;
use std::fmt::Write;

/// Debug probe families told apart by USB vendor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeKind {
    StLink,
    JLink,
    CmsisDap,
    Other,
}

impl ProbeKind {
    fn from_vendor(vendor_id: u16) -> Self {
        match vendor_id {
            0x0483 => Self::StLink,
            0x1366 => Self::JLink,
            0x0D28 => Self::CmsisDap,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::StLink => "ST-Link",
            Self::JLink => "J-Link",
            Self::CmsisDap => "CMSIS-DAP",
            Self::Other => "Unknown",
        }
    }
}

/// A probe found on the host. `index` is what [`ProbeManager::open_probe`] takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeInfo {
    pub index: usize,
    pub identifier: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub kind: ProbeKind,
}

impl ProbeInfo {
    fn new(index: usize, info: &DebugProbeInfo) -> Self {
        Self {
            index,
            identifier: info.identifier.clone(),
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            serial_number: info.serial_number.clone(),
            kind: ProbeKind::from_vendor(info.vendor_id),
        }
    }

    /// One line for probe listings.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "[{}] {} {:04x}:{:04x} {}",
            self.index,
            self.kind.label(),
            self.vendor_id,
            self.product_id,
            self.identifier
        );
        if let Some(serial) = &self.serial_number {
            let _ = write!(line, " (serial {serial})");
        }
        line
    }
}

/// Probe manager for enumerating and connecting to debug probes.
pub struct ProbeManager {
    lister: Lister,
}

impl ProbeManager {
    pub fn new() -> Self {
        Self { lister: Lister::new() }
    }

    /// Probes currently attached to the host, in `open_probe` index order.
    pub fn list_probes(&self) -> Vec<ProbeInfo> {
        self.lister.list_all().iter().enumerate().map(|(index, info)| ProbeInfo::new(index, info)).collect()
    }

    /// Open a probe by index from the list.
    pub fn open_probe(&self, index: usize) -> Result<Probe> {
        let probes = self.lister.list_all();
        let probe_info = probes.get(index).context("Probe index out of range")?;

        probe_info.open().context("Failed to open probe")
    }

    /// Open the first available probe.
    pub fn open_first_probe(&self) -> Result<Probe> {
        let probes = self.lister.list_all();
        let probe_info = probes.into_iter().next().context("No debug probes found")?;

        probe_info.open().context("Failed to open probe")
    }

    /// Attach to `chip` (or "auto") through `probe`.
    pub fn attach(&self, probe: Probe, chip: &str) -> Result<Session> {
        probe
            .attach(chip, Permissions::default())
            .with_context(|| format!("Failed to attach to target ({chip})"))
    }
}

impl Default for ProbeManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Target-model identity used when binding an RTOS backend to a core.
pub fn target_model(core_type: CoreType) -> Option<&'static str> {
    match core_type {
        CoreType::Armv6m | CoreType::Armv7m | CoreType::Armv7em | CoreType::Armv8m => {
            Some("cortex_m")
        }
        CoreType::Riscv => Some("riscv"),
        _ => None,
    }
}

impl HaltedTarget for Core<'_> {
    fn live_registers(&mut self) -> RtosResult<Vec<RegisterValue>> {
        let registers = self.registers();
        let mut values = Vec::new();

        for (number, register) in (0u32..).zip(registers.core_registers()) {
            let raw: u64 = self
                .read_core_reg(register.id())
                .map_err(|e| RtosError::register(register.name(), e))?;
            let size = register.size_in_bytes();
            values.push(RegisterValue { number, size, value: raw.to_le_bytes()[..size.min(8)].to_vec() });
        }

        Ok(values)
    }

    fn has_fpu(&mut self) -> bool {
        self.fpu_support().unwrap_or_else(|e| {
            log::warn!("Could not query FPU support: {e}");
            false
        })
    }
}
