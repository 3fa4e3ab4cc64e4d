//! RTOS awareness.
//!
//! Each supported kernel is an [`RtosBackend`]. A backend declares the
//! symbols it needs, decides from their addresses whether it matches the
//! firmware, binds to a target model, and then lists threads and rebuilds
//! their registers on demand.

pub mod nuttx;

use crate::error::RtosResult;
use crate::stacking::ArchFamily;
use crate::symbols::{SymbolRequest, SymbolTable};
use crate::target::{HaltedTarget, RegisterValue, TargetMemory};
use serde::{Deserialize, Serialize};

pub use nuttx::{NuttX, TaskState};

/// One task of a thread snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Address of the task's control block.
    pub thread_id: u64,
    pub exists: bool,
    pub name: String,
    /// Human readable summary, absent when the state code is unknown.
    pub extra_info: Option<String>,
    pub pid: u16,
    pub state: Option<TaskState>,
}

/// All tasks found by one refresh, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub threads: Vec<TaskRecord>,
    /// Control block of the task the core is executing.
    pub current_thread: u64,
}

impl ThreadSnapshot {
    pub fn thread(&self, thread_id: u64) -> Option<&TaskRecord> {
        self.threads.iter().find(|t| t.thread_id == thread_id)
    }
}

/// A backend attached to one target model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub rtos: &'static str,
    pub target_model: String,
    pub arch: ArchFamily,
}

pub trait RtosBackend: Send {
    fn name(&self) -> &'static str;

    /// Symbols to resolve before calling [`RtosBackend::detect`].
    fn required_symbols(&self) -> &'static [SymbolRequest];

    /// Whether the resolved symbols identify this RTOS. Never touches the target.
    fn detect(&self, symbols: &SymbolTable) -> bool;

    fn create_binding(&self, target_model: &str) -> RtosResult<Binding>;

    /// Enumerate all tasks. Either the whole list is returned or an error.
    ///
    /// `current_thread` is updated as soon as the running task is known, so
    /// it survives a failure later in the walk.
    fn refresh_threads(
        &self,
        binding: &Binding,
        target: &mut dyn TargetMemory,
        symbols: &SymbolTable,
        current_thread: &mut Option<u64>,
    ) -> RtosResult<ThreadSnapshot>;

    /// Registers of `thread_id`. `current_thread` selects the live path.
    fn thread_registers(
        &self,
        binding: &Binding,
        target: &mut dyn HaltedTarget,
        symbols: &SymbolTable,
        current_thread: Option<u64>,
        thread_id: u64,
    ) -> RtosResult<Vec<RegisterValue>>;
}

/// All backends, in detection priority order.
pub fn registered_backends() -> Vec<Box<dyn RtosBackend>> {
    vec![Box::new(NuttX::new())]
}

/// Find the first backend whose symbols resolve through `lookup`.
pub fn detect_rtos(
    mut lookup: impl FnMut(&str) -> Option<u64>,
) -> Option<(Box<dyn RtosBackend>, SymbolTable)> {
    registered_backends().into_iter().find_map(|backend| {
        let symbols = SymbolTable::resolve(backend.required_symbols(), &mut lookup);
        if backend.detect(&symbols) {
            log::info!("Detected {} RTOS", backend.name());
            Some((backend, symbols))
        } else {
            None
        }
    })
}
