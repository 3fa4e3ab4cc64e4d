//! Synthetic NuttX target for `--mock`.
//!
//! Three tasks on a Cortex-M4 with the FPU disabled: the idle task (running),
//! the low-priority work queue and `nsh_main` blocked on a semaphore.

use rtosview_core::{MemoryImage, RegisterValue};

pub const TARGET_MODEL: &str = "cortex_m";

const READYTORUN: u64 = 0x2000_0040;
const PIDHASH: u64 = 0x2000_0044;
const NPIDHASH: u64 = 0x2000_0048;
const TCBINFO: u64 = 0x2000_0050;
const HASH_TABLE: u32 = 0x2000_0100;

const PID_OFF: u16 = 0x0c;
const STATE_OFF: u16 = 0x1e;
const PRI_OFF: u16 = 0x1c;
const NAME_OFF: u16 = 0x90;
const REGS_OFF: u16 = 0x48;

struct Task {
    tcb: u32,
    pid: u16,
    state: u8,
    name: &'static str,
    pc: u32,
    sp: u32,
}

const TASKS: [Task; 3] = [
    Task { tcb: 0x2000_1000, pid: 0, state: 3, name: "Idle Task", pc: 0x0800_0f3c, sp: 0x2000_3f80 },
    Task { tcb: 0x2000_1200, pid: 1, state: 5, name: "lpwork", pc: 0x0800_2a10, sp: 0x2000_4f40 },
    Task { tcb: 0x2000_1400, pid: 3, state: 5, name: "nsh_main", pc: 0x0800_5d22, sp: 0x2000_5e90 },
];

pub fn lookup(name: &str) -> Option<u64> {
    match name {
        "g_readytorun" => Some(READYTORUN),
        "g_pidhash" => Some(PIDHASH),
        "g_npidhash" => Some(NPIDHASH),
        "g_tcbinfo" => Some(TCBINFO),
        _ => None,
    }
}

pub fn image() -> MemoryImage {
    let mut image = MemoryImage::new();

    // 8 buckets, indexed by pid
    image.set_u32(NPIDHASH, 8);
    image.set_u32(PIDHASH, HASH_TABLE);
    let layout = [PID_OFF, STATE_OFF, PRI_OFF, NAME_OFF, REGS_OFF, 17, 17];
    for (field, value) in (0u64..).zip(layout) {
        image.set_u16(TCBINFO + field * 2, value);
    }

    for task in &TASKS {
        let tcb = u64::from(task.tcb);
        image.set_u32(u64::from(HASH_TABLE) + u64::from(task.pid) * 4, task.tcb);
        image.set_u16(tcb + u64::from(PID_OFF), task.pid);
        image.set_u8(tcb + u64::from(STATE_OFF), task.state);
        image.set_bytes(tcb + u64::from(NAME_OFF), task.name.as_bytes());

        // Saved context right below the task's stack pointer
        let frame = task.sp - 0x48;
        image.set_u32(tcb + u64::from(REGS_OFF), frame);
        image.set_u32(u64::from(frame), task.sp);
        image.set_u32(u64::from(frame) + 0x40, task.pc);
        image.set_u32(u64::from(frame) + 0x44, 0x0100_0000);
    }

    let running = &TASKS[0];
    image.set_u32(READYTORUN, running.tcb);
    image.set_live_registers(
        (0u32..17)
            .map(|number| {
                let value = match number {
                    13 => running.sp,
                    15 => running.pc,
                    16 => 0x6100_0000,
                    _ => 0,
                };
                RegisterValue { number, size: 4, value: value.to_le_bytes().to_vec() }
            })
            .collect(),
    );
    image
}
