//! Session management module.
//!
//! An [`RtosSession`] is the per-target RTOS state of a debug session: the
//! detected backend, the symbols it resolved, its binding to the target
//! model, the running task and the most recent thread snapshot. All calls are synchronous and
//! expect the target to stay halted for their duration.

use crate::error::{RtosError, RtosResult};
use crate::rtos::{self, Binding, RtosBackend, TaskRecord, ThreadSnapshot};
use crate::symbols::SymbolTable;
use crate::target::{HaltedTarget, RegisterValue, TargetMemory};

pub struct RtosSession {
    backend: Box<dyn RtosBackend>,
    symbols: SymbolTable,
    binding: Option<Binding>,
    /// Kept apart from the snapshot: it is known before the task walk starts.
    current_thread: Option<u64>,
    snapshot: Option<ThreadSnapshot>,
}

impl RtosSession {
    /// Try every registered backend against the firmware's symbols.
    pub fn detect(lookup: impl FnMut(&str) -> Option<u64>) -> Option<Self> {
        let (backend, symbols) = rtos::detect_rtos(lookup)?;
        Some(Self::new(backend, symbols))
    }

    pub fn new(backend: Box<dyn RtosBackend>, symbols: SymbolTable) -> Self {
        Self { backend, symbols, binding: None, current_thread: None, snapshot: None }
    }

    pub fn rtos_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// Attach to `target_model`. A failed bind leaves the session unbound.
    pub fn bind(&mut self, target_model: &str) -> RtosResult<&Binding> {
        self.binding = None;
        let binding = self.backend.create_binding(target_model)?;
        Ok(self.binding.insert(binding))
    }

    /// Rebuild the thread list.
    ///
    /// The previous snapshot is dropped before any target access, so a failed
    /// refresh leaves no threads rather than stale ones. The running task is
    /// updated once it has been read, even if the walk fails afterwards.
    pub fn refresh(&mut self, target: &mut dyn TargetMemory) -> RtosResult<&ThreadSnapshot> {
        self.snapshot = None;
        let Some(binding) = self.binding.as_ref() else {
            return Err(self.unbound());
        };
        let snapshot = self.backend.refresh_threads(
            binding,
            target,
            &self.symbols,
            &mut self.current_thread,
        )?;
        Ok(self.snapshot.insert(snapshot))
    }

    pub fn snapshot(&self) -> Option<&ThreadSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn threads(&self) -> &[TaskRecord] {
        self.snapshot.as_ref().map_or(&[], |s| s.threads.as_slice())
    }

    /// Control block of the running task, as of the last refresh that got
    /// far enough to read it.
    pub fn current_thread(&self) -> Option<u64> {
        self.current_thread
    }

    pub fn thread(&self, thread_id: u64) -> Option<&TaskRecord> {
        self.snapshot.as_ref()?.thread(thread_id)
    }

    /// Register set of `thread_id`. Failures leave the snapshot untouched.
    pub fn thread_registers(
        &self,
        target: &mut dyn HaltedTarget,
        thread_id: u64,
    ) -> RtosResult<Vec<RegisterValue>> {
        let binding = self.binding.as_ref().ok_or_else(|| self.unbound())?;
        self.backend.thread_registers(binding, target, &self.symbols, self.current_thread, thread_id)
    }

    fn unbound(&self) -> RtosError {
        RtosError::UnsupportedTarget { model: "<unbound>".to_string(), rtos: self.backend.name() }
    }
}
