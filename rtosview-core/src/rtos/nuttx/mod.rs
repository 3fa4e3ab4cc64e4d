//! NuttX awareness.
//!
//! NuttX keeps every live TCB in a hash table indexed by PID (`g_pidhash`,
//! `g_npidhash` entries). The TCB layout itself is described at runtime by
//! `g_tcbinfo`, and the head of `g_readytorun` is the running task.

mod task_state;
pub mod tcbinfo;

pub use task_state::TaskState;
pub use tcbinfo::TcbInfo;

use super::{Binding, RtosBackend, TaskRecord, ThreadSnapshot};
use crate::error::{RtosError, RtosResult};
use crate::stacking::{self, ArchFamily};
use crate::symbols::{SymbolRequest, SymbolTable};
use crate::target::{HaltedTarget, RegisterValue, TargetMemory};
use tcbinfo::{field_address, MAX_TCB_OFFSET, REGS_OFF_POSITION};

pub const SYM_READYTORUN: &str = "g_readytorun";
pub const SYM_PIDHASH: &str = "g_pidhash";
pub const SYM_NPIDHASH: &str = "g_npidhash";
pub const SYM_TCBINFO: &str = "g_tcbinfo";

static SYMBOLS: [SymbolRequest; 4] = [
    SymbolRequest::required(SYM_READYTORUN),
    SymbolRequest::required(SYM_PIDHASH),
    SymbolRequest::required(SYM_NPIDHASH),
    SymbolRequest::required(SYM_TCBINFO),
];

/// Target models the saved-context layout is known for.
const TARGETS: [(&str, ArchFamily); 4] = [
    ("cortex_m", ArchFamily::CortexM),
    ("hla_target", ArchFamily::CortexM),
    ("esp32c3", ArchFamily::RiscV),
    ("riscv", ArchFamily::RiscV),
];

/// Size of the name field in the TCB, not necessarily NUL terminated.
const NAME_SIZE: usize = 32;

/// Only 32-bit targets are supported.
const PTR_WIDTH: usize = 4;

/// Upper bound on `g_npidhash` before it is treated as garbage.
pub const MAX_PIDHASH_ENTRIES: u32 = 1 << 16;

const RTOS_NAME: &str = "NuttX";

#[derive(Debug, Default, Clone, Copy)]
pub struct NuttX;

impl NuttX {
    pub fn new() -> Self {
        Self
    }

    fn symbol(symbols: &SymbolTable, name: &'static str) -> RtosResult<u64> {
        symbols.address(name).ok_or_else(|| {
            log::error!("No {name} symbol for NuttX");
            RtosError::MissingSymbol(name)
        })
    }

    /// Read the raw bucket array of the PID hash table.
    fn read_pidhash(
        target: &mut dyn TargetMemory,
        npidhash_addr: u64,
        pidhash_addr: u64,
    ) -> RtosResult<Vec<u8>> {
        let npidhash = target
            .read_u32(npidhash_addr)
            .inspect_err(|e| log::error!("Failed to read g_npidhash: {e}"))?;
        log::debug!("Hash table size (g_npidhash) = {npidhash}");

        if npidhash > MAX_PIDHASH_ENTRIES {
            return Err(RtosError::malformed(
                "g_npidhash",
                format!("{npidhash} entries exceeds the limit of {MAX_PIDHASH_ENTRIES}"),
            ));
        }

        let table = target
            .read_u32(pidhash_addr)
            .inspect_err(|e| log::error!("Failed to read g_pidhash address: {e}"))?;
        log::debug!("Hash table address (g_pidhash) = {table:#x}");

        let len = npidhash as usize * PTR_WIDTH;
        let mut raw = Vec::new();
        raw.try_reserve_exact(len)
            .map_err(|source| RtosError::Allocation { what: "pidhash bytes", count: len, source })?;
        raw.resize(len, 0);

        if len > 0 {
            target
                .read_buffer(u64::from(table), &mut raw)
                .inspect_err(|e| log::error!("Failed to read pidhash: {e}"))?;
        }
        Ok(raw)
    }

    fn read_task(
        target: &mut dyn TargetMemory,
        info: &TcbInfo,
        index: usize,
        tcb: u32,
    ) -> RtosResult<TaskRecord> {
        let pid = target.read_u16(field_address(tcb, info.pid_off)?).inspect_err(|e| {
            log::error!("Failed to read PID of TCB@{tcb:#x} from pidhash[{index}]: {e}");
        })?;

        let code = target.read_u8(field_address(tcb, info.state_off)?).inspect_err(|e| {
            log::error!("Failed to read state of TCB@{tcb:#x} from pidhash[{index}]: {e}");
        })?;

        let state = TaskState::from_code(code);
        let extra_info = state.map(|state| format!("pid:{pid}, {state}"));

        let name = if info.name_off == 0 {
            "None".to_string()
        } else {
            let mut raw = [0u8; NAME_SIZE];
            target
                .read_buffer(field_address(tcb, info.name_off)?, &mut raw)
                .inspect_err(|e| log::error!("Failed to read thread's name: {e}"))?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
            String::from_utf8_lossy(&raw[..end]).into_owned()
        };

        Ok(TaskRecord { thread_id: u64::from(tcb), exists: true, name, extra_info, pid, state })
    }

    /// Registers of a task that is not running, from its saved context.
    fn stacked_registers(
        binding: &Binding,
        target: &mut dyn HaltedTarget,
        symbols: &SymbolTable,
        thread_id: u64,
    ) -> RtosResult<Vec<RegisterValue>> {
        let tcbinfo = Self::symbol(symbols, SYM_TCBINFO)?;

        let regs_off = target
            .read_u16(tcbinfo + REGS_OFF_POSITION)
            .inspect_err(|e| log::error!("Failed to read registers' offset: {e}"))?;
        if regs_off >= MAX_TCB_OFFSET {
            return Err(RtosError::malformed("g_tcbinfo", format!("regs_off = {regs_off:#x}")));
        }

        let tcb = u32::try_from(thread_id).map_err(|_| {
            RtosError::malformed("thread id", format!("{thread_id:#x} is not a 32-bit address"))
        })?;
        let regs_addr = target
            .read_u32(field_address(tcb, regs_off)?)
            .inspect_err(|e| log::error!("Failed to read registers' address: {e}"))?;

        let stacking = binding.arch.select_stacking(target);
        log::debug!("Unstacking TCB@{tcb:#x} from {regs_addr:#x} using {}", stacking.name);
        stacking::unstack(target, stacking, regs_addr)
    }
}

impl RtosBackend for NuttX {
    fn name(&self) -> &'static str {
        RTOS_NAME
    }

    fn required_symbols(&self) -> &'static [SymbolRequest] {
        &SYMBOLS
    }

    fn detect(&self, symbols: &SymbolTable) -> bool {
        symbols.address(SYM_READYTORUN).is_some() && symbols.address(SYM_PIDHASH).is_some()
    }

    fn create_binding(&self, target_model: &str) -> RtosResult<Binding> {
        let Some(&(model, arch)) = TARGETS.iter().find(|(model, _)| *model == target_model) else {
            log::error!("Could not find \"{target_model}\" target in NuttX compatibility list");
            return Err(RtosError::UnsupportedTarget {
                model: target_model.to_string(),
                rtos: RTOS_NAME,
            });
        };

        log::info!("Detected target \"{model}\"");
        Ok(Binding { rtos: RTOS_NAME, target_model: model.to_string(), arch })
    }

    fn refresh_threads(
        &self,
        _binding: &Binding,
        target: &mut dyn TargetMemory,
        symbols: &SymbolTable,
        current_thread: &mut Option<u64>,
    ) -> RtosResult<ThreadSnapshot> {
        let readytorun = Self::symbol(symbols, SYM_READYTORUN)?;
        let pidhash = Self::symbol(symbols, SYM_PIDHASH)?;
        let npidhash = Self::symbol(symbols, SYM_NPIDHASH)?;
        let tcbinfo = Self::symbol(symbols, SYM_TCBINFO)?;

        let raw = Self::read_pidhash(target, npidhash, pidhash)?;

        let info = TcbInfo::read(target, tcbinfo)
            .inspect_err(|e| log::error!("Failed to read tcbinfo: {e}"))?;

        // The head of g_readytorun is the running task
        let running = target
            .read_u32(readytorun)
            .inspect_err(|e| log::error!("Failed to read g_readytorun: {e}"))?;
        *current_thread = Some(u64::from(running));

        let buckets = || {
            raw.chunks_exact(PTR_WIDTH)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .enumerate()
                .filter(|&(_, tcb)| tcb != 0)
        };

        let count = buckets().count();
        let mut threads = Vec::new();
        threads
            .try_reserve_exact(count)
            .map_err(|source| RtosError::Allocation { what: "threads", count, source })?;

        for (index, tcb) in buckets() {
            threads.push(Self::read_task(target, &info, index, tcb)?);
        }

        log::debug!("Found {} NuttX thread(s), current TCB@{running:#x}", threads.len());
        Ok(ThreadSnapshot { threads, current_thread: u64::from(running) })
    }

    fn thread_registers(
        &self,
        binding: &Binding,
        target: &mut dyn HaltedTarget,
        symbols: &SymbolTable,
        current_thread: Option<u64>,
        thread_id: u64,
    ) -> RtosResult<Vec<RegisterValue>> {
        if binding.rtos != RTOS_NAME {
            return Err(RtosError::UnsupportedTarget {
                model: binding.target_model.clone(),
                rtos: RTOS_NAME,
            });
        }

        if current_thread == Some(thread_id) {
            // The running task's registers live in the core, not on its stack
            return target
                .live_registers()
                .inspect_err(|e| log::error!("Failed to read live registers: {e}"));
        }

        Self::stacked_registers(binding, target, symbols, thread_id)
    }
}
