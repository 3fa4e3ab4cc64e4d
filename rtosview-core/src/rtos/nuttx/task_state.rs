use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling state of a NuttX task, as stored in `tcb->task_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Invalid,
    Pending,
    ReadyToRun,
    Running,
    Inactive,
    WaitSem,
    WaitSig,
    WaitMqNotEmpty,
    WaitMqNotFull,
    WaitPageFill,
    Stopped,
}

impl TaskState {
    /// Indexed by the raw state code.
    const TABLE: [(Self, &'static str); 11] = [
        (Self::Invalid, "INVALID"),
        (Self::Pending, "PENDING"),
        (Self::ReadyToRun, "READYTORUN"),
        (Self::Running, "RUNNING"),
        (Self::Inactive, "INACTIVE"),
        (Self::WaitSem, "WAIT_SEM"),
        (Self::WaitSig, "WAIT_SIG"),
        (Self::WaitMqNotEmpty, "WAIT_MQNOTEMPTY"),
        (Self::WaitMqNotFull, "WAIT_MQNOTFULL"),
        (Self::WaitPageFill, "WAIT_PAGEFILL"),
        (Self::Stopped, "STOPPED"),
    ];

    /// `None` for codes outside the table.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::TABLE.get(usize::from(code)).map(|&(state, _)| state)
    }

    pub fn label(self) -> &'static str {
        Self::TABLE[self as usize].1
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
