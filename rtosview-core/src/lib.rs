//! rtosview core - thread awareness for halted embedded targets.
//!
//! This crate detects a supported RTOS from the firmware's symbols, lists its
//! tasks by decoding kernel data structures in target memory, and rebuilds
//! each task's registers either from the live core or from its saved context.

pub mod error;
#[cfg(feature = "hardware")]
pub mod probe;
pub mod rtos;
pub mod session;
pub mod stacking;
pub mod symbols;
pub mod target;

// Re-export commonly used types
pub use error::{ErrorKind, RtosError, RtosResult};
#[cfg(feature = "hardware")]
pub use probe::{ProbeInfo, ProbeKind, ProbeManager};
pub use rtos::{detect_rtos, Binding, NuttX, RtosBackend, TaskRecord, TaskState, ThreadSnapshot};
pub use session::RtosSession;
pub use stacking::{ArchFamily, StackingDescriptor};
pub use symbols::{SymbolManager, SymbolRequest, SymbolTable};
pub use target::{HaltedTarget, MemoryImage, RegisterValue, TargetMemory};
