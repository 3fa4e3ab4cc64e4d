//! End-to-end scenarios against synthetic NuttX memory images.

use rtosview_core::stacking::cortex_m::CPACR;
use rtosview_core::target::image::Access;
use rtosview_core::{
    ArchFamily, ErrorKind, MemoryImage, NuttX, RegisterValue, RtosBackend, RtosSession,
    SymbolTable,
};

const READYTORUN: u64 = 0x2000_0000;
const PIDHASH: u64 = 0x2000_0004;
const NPIDHASH: u64 = 0x2000_0008;
const TCBINFO: u64 = 0x2000_0010;
const TABLE: u64 = 0x2000_0100;

const PID_OFF: u64 = 0x10;
const STATE_OFF: u64 = 0x12;
const NAME_OFF: u64 = 0x20;
const REGS_OFF: u64 = 0x60;

fn lookup(name: &str) -> Option<u64> {
    match name {
        "g_readytorun" => Some(READYTORUN),
        "g_pidhash" => Some(PIDHASH),
        "g_npidhash" => Some(NPIDHASH),
        "g_tcbinfo" => Some(TCBINFO),
        _ => None,
    }
}

struct Task {
    tcb: u32,
    pid: u16,
    state: u8,
    name: &'static str,
}

fn nuttx_image(buckets: &[u32], tasks: &[Task], name_off: u16) -> MemoryImage {
    let mut image = MemoryImage::new();
    image.set_u32(NPIDHASH, buckets.len() as u32);
    image.set_u32(PIDHASH, TABLE as u32);
    for (i, &tcb) in buckets.iter().enumerate() {
        image.set_u32(TABLE + i as u64 * 4, tcb);
    }

    let layout = [PID_OFF as u16, STATE_OFF as u16, 0x14, name_off, REGS_OFF as u16, 17, 17];
    for (i, field) in layout.iter().enumerate() {
        image.set_u16(TCBINFO + i as u64 * 2, *field);
    }

    for task in tasks {
        let tcb = u64::from(task.tcb);
        image.set_u16(tcb + PID_OFF, task.pid);
        image.set_u8(tcb + STATE_OFF, task.state);
        image.set_bytes(tcb + NAME_OFF, task.name.as_bytes());
    }
    image
}

fn bound_session(model: &str) -> RtosSession {
    let mut session = RtosSession::detect(lookup).expect("NuttX not detected");
    session.bind(model).expect("bind failed");
    session
}

#[test]
fn detection_requires_both_anchor_symbols() {
    let nuttx = NuttX::new();
    let names = ["g_readytorun", "g_pidhash", "g_npidhash", "g_tcbinfo"];

    // Every symbol either absent, zero or resolved
    for combo in 0..3u32.pow(4) {
        let resolved: Vec<Option<u64>> = (0..4)
            .map(|i| match combo / 3u32.pow(i) % 3 {
                0 => None,
                1 => Some(0),
                _ => Some(0x2000_0000 + u64::from(i) * 4),
            })
            .collect();

        let table = SymbolTable::resolve(nuttx.required_symbols(), |name| {
            let index = names.iter().position(|n| *n == name)?;
            resolved[index]
        });

        let expected = matches!(resolved[0], Some(a) if a != 0) && matches!(resolved[1], Some(a) if a != 0);
        assert_eq!(nuttx.detect(&table), expected, "combination {resolved:?}");
        // Detection is repeatable
        assert_eq!(nuttx.detect(&table), expected);
    }
}

#[test]
fn empty_registry_still_reports_current_thread() {
    let mut image = nuttx_image(&[], &[], NAME_OFF as u16);
    image.set_u32(READYTORUN, 0x2000_0800);

    let mut session = bound_session("cortex_m");
    let snapshot = session.refresh(&mut image).unwrap();
    assert!(snapshot.threads.is_empty());
    assert_eq!(snapshot.current_thread, 0x2000_0800);
}

#[test]
fn buckets_decode_in_table_order() {
    let tasks = [
        Task { tcb: 0x2000, pid: 5, state: 3, name: "idle" },
        Task { tcb: 0x3000, pid: 1, state: 6, name: "hpwork" },
    ];
    let mut image = nuttx_image(&[0x2000, 0, 0x3000], &tasks, NAME_OFF as u16);
    image.set_u32(READYTORUN, 0x2000);

    let mut session = bound_session("cortex_m");
    let snapshot = session.refresh(&mut image).unwrap().clone();

    assert_eq!(snapshot.threads.len(), 2);
    let idle = &snapshot.threads[0];
    assert_eq!(idle.thread_id, 0x2000);
    assert!(idle.exists);
    assert_eq!(idle.name, "idle");
    assert_eq!(idle.extra_info.as_deref(), Some("pid:5, RUNNING"));

    let work = &snapshot.threads[1];
    assert_eq!(work.thread_id, 0x3000);
    assert_eq!(work.extra_info.as_deref(), Some("pid:1, WAIT_SIG"));

    assert_eq!(session.thread(0x3000).map(|t| t.name.as_str()), Some("hpwork"));
}

#[test]
fn duplicate_buckets_are_kept() {
    let tasks = [Task { tcb: 0x2000, pid: 2, state: 2, name: "dup" }];
    let mut image = nuttx_image(&[0x2000, 0x2000], &tasks, NAME_OFF as u16);

    let mut session = bound_session("cortex_m");
    assert_eq!(session.refresh(&mut image).unwrap().threads.len(), 2);
}

#[test]
fn one_bad_bucket_fails_the_whole_refresh() {
    let tasks: Vec<Task> = (0..5u16)
        .map(|i| Task { tcb: 0x2000 + u32::from(i) * 0x100, pid: i, state: 2, name: "t" })
        .collect();
    let buckets: Vec<u32> = tasks.iter().map(|t| t.tcb).collect();
    let mut image = nuttx_image(&buckets, &tasks, NAME_OFF as u16);

    let mut session = bound_session("cortex_m");
    assert_eq!(session.refresh(&mut image).unwrap().threads.len(), 5);

    // State byte of the third task becomes unreadable
    let bad_state = u64::from(tasks[2].tcb) + STATE_OFF;
    image.fail_range(bad_state..bad_state + 1);

    let err = session.refresh(&mut image).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetRead);
    assert!(session.threads().is_empty());
    assert!(session.snapshot().is_none());
    // Nothing after the failing task was touched
    assert!(!image.was_read(u64::from(tasks[3].tcb)..u64::from(tasks[4].tcb) + 0x100));
}

fn two_task_image() -> MemoryImage {
    let tasks = [
        Task { tcb: 0x2000, pid: 0, state: 3, name: "Idle Task" },
        Task { tcb: 0x3000, pid: 1, state: 5, name: "nsh_main" },
    ];
    let mut image = nuttx_image(&[0x2000, 0x3000], &tasks, NAME_OFF as u16);
    image.set_u32(READYTORUN, 0x2000);
    image
}

/// Refresh once cleanly, then make `faulty` unreadable and check the next
/// refresh fails as a whole.
fn assert_refresh_fails_on(faulty: std::ops::Range<u64>) -> RtosSession {
    let mut image = two_task_image();
    let mut session = bound_session("cortex_m");
    assert_eq!(session.refresh(&mut image).unwrap().threads.len(), 2);

    image.fail_range(faulty.clone());
    let err = session.refresh(&mut image).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetRead, "fault at {faulty:#x?}");
    assert!(session.snapshot().is_none());
    assert!(session.threads().is_empty());
    session
}

#[test]
fn unreadable_pidhash_address_fails_refresh() {
    assert_refresh_fails_on(PIDHASH..PIDHASH + 4);
}

#[test]
fn unreadable_tcbinfo_fails_refresh() {
    assert_refresh_fails_on(TCBINFO..TCBINFO + 14);
}

#[test]
fn unreadable_readytorun_fails_refresh() {
    assert_refresh_fails_on(READYTORUN..READYTORUN + 4);
}

#[test]
fn unreadable_pid_fails_refresh() {
    assert_refresh_fails_on(0x3000 + PID_OFF..0x3000 + PID_OFF + 2);
}

#[test]
fn unreadable_name_fails_refresh() {
    assert_refresh_fails_on(0x3000 + NAME_OFF + 8..0x3000 + NAME_OFF + 9);
}

#[test]
fn running_task_survives_failed_walk() {
    let mut image = two_task_image();
    image.set_live_registers(vec![RegisterValue { number: 15, size: 4, value: vec![0x3c, 0x0f, 0x00, 0x08] }]);
    // Stale saved context of the running task
    image.set_u32(0x2000 + REGS_OFF, 0x2000_4000);

    let state = 0x3000 + STATE_OFF;
    image.fail_range(state..state + 1);

    let mut session = bound_session("cortex_m");
    assert_eq!(session.refresh(&mut image).unwrap_err().kind(), ErrorKind::TargetRead);
    assert!(session.snapshot().is_none());
    assert_eq!(session.current_thread(), Some(0x2000));

    image.clear_log();
    let regs = session.thread_registers(&mut image, 0x2000).unwrap();
    assert_eq!(regs[0].as_u64(), 0x0800_0f3c);
    assert_eq!(image.accesses(), &[Access::LiveRegisters]);
}

#[test]
fn oversized_regs_off_rejected_at_register_fetch() {
    let mut image = two_task_image();
    image.set_u32(0x3000 + REGS_OFF, 0x2000_4000);

    let mut session = bound_session("cortex_m");
    session.refresh(&mut image).unwrap();

    // Layout table changes between refresh and register fetch
    image.set_u16(TCBINFO + 8, 0x1000);
    image.clear_log();
    let err = session.thread_registers(&mut image, 0x3000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetRead);
    assert!(!image.was_read(0x3000 + 0x1000..0x3000 + 0x1004));
    assert!(!image.was_read(0x2000_4000..0x2000_4048));
    assert_eq!(session.threads().len(), 2);
}

#[test]
fn unreadable_hash_table_fails_refresh() {
    let mut image = nuttx_image(&[0x2000], &[], NAME_OFF as u16);
    image.fail_range(TABLE..TABLE + 4);

    let mut session = bound_session("cortex_m");
    assert_eq!(session.refresh(&mut image).unwrap_err().kind(), ErrorKind::TargetRead);
    assert!(session.threads().is_empty());
}

#[test]
fn absent_name_field_reads_as_none() {
    let tasks = [
        Task { tcb: 0x2000, pid: 0, state: 3, name: "Idle Task" },
        Task { tcb: 0x3000, pid: 1, state: 1, name: "init" },
    ];
    let mut image = nuttx_image(&[0x2000, 0x3000], &tasks, 0);

    let mut session = bound_session("cortex_m");
    let snapshot = session.refresh(&mut image).unwrap();
    assert!(snapshot.threads.iter().all(|t| t.name == "None"));
    assert!(!image.was_read(0x2000 + NAME_OFF..0x2000 + NAME_OFF + 32));
}

#[test]
fn current_thread_uses_live_registers() {
    let tasks = [
        Task { tcb: 0x2000, pid: 0, state: 3, name: "running" },
        Task { tcb: 0x3000, pid: 1, state: 2, name: "ready" },
    ];
    let mut image = nuttx_image(&[0x2000, 0x3000], &tasks, NAME_OFF as u16);
    image.set_u32(READYTORUN, 0x2000);
    let live = vec![RegisterValue { number: 15, size: 4, value: vec![0x01, 0x02, 0x00, 0x08] }];
    image.set_live_registers(live.clone());
    // Saved context of the ready task
    image.set_u32(0x3000 + REGS_OFF, 0x2000_4000);
    image.set_u32(0x2000_4000 + 0x40, 0x0800_1234);

    let mut session = bound_session("cortex_m");
    session.refresh(&mut image).unwrap();

    image.clear_log();
    let regs = session.thread_registers(&mut image, 0x2000).unwrap();
    assert_eq!(regs, live);
    assert_eq!(image.accesses(), &[Access::LiveRegisters]);

    image.clear_log();
    let regs = session.thread_registers(&mut image, 0x3000).unwrap();
    assert_eq!(regs.len(), 17);
    assert_eq!(regs[15].as_u64(), 0x0800_1234);
    assert!(!image.accesses().contains(&Access::LiveRegisters));
    assert!(image.was_read(0x2000_4000..0x2000_4048));
}

#[test]
fn register_failure_keeps_snapshot() {
    let tasks = [Task { tcb: 0x3000, pid: 1, state: 2, name: "ready" }];
    let mut image = nuttx_image(&[0x3000], &tasks, NAME_OFF as u16);
    image.set_u32(0x3000 + REGS_OFF, 0x2000_4000);
    image.fail_range(0x2000_4000..0x2000_4004);

    let mut session = bound_session("cortex_m");
    session.refresh(&mut image).unwrap();

    let err = session.thread_registers(&mut image, 0x3000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetRead);
    assert_eq!(session.threads().len(), 1);
}

#[test]
fn fpu_frame_follows_cpacr() {
    let tasks = [Task { tcb: 0x3000, pid: 1, state: 2, name: "ready" }];
    let mut image = nuttx_image(&[0x3000], &tasks, NAME_OFF as u16);
    image.set_u32(0x3000 + REGS_OFF, 0x2000_4000);
    image.set_u32(0x2000_4000 + 0x84, 0x0800_2000); // pc in the FPU frame
    image.set_fpu(true);
    image.set_u32(CPACR, 0x00F0_0000);

    let mut session = bound_session("cortex_m");
    session.refresh(&mut image).unwrap();
    let regs = session.thread_registers(&mut image, 0x3000).unwrap();
    assert_eq!(regs[15].as_u64(), 0x0800_2000);
}

#[test]
fn stacking_selection_is_stable() {
    for (fpu, cpacr) in [(false, 0), (true, 0), (true, 0x00F0_0000), (true, 0x0010_0000)] {
        let mut image = MemoryImage::new();
        image.set_fpu(fpu);
        image.set_u32(CPACR, cpacr);

        let first = ArchFamily::CortexM.select_stacking(&mut image);
        for _ in 0..10 {
            let again = ArchFamily::CortexM.select_stacking(&mut image);
            assert!(std::ptr::eq(first, again));
            assert_eq!(first.registers, again.registers);
        }
    }

    let mut image = MemoryImage::new();
    let riscv = ArchFamily::RiscV.select_stacking(&mut image);
    assert!(std::ptr::eq(riscv, ArchFamily::RiscV.select_stacking(&mut image)));
    assert!(image.accesses().is_empty());
}

#[test]
fn unknown_target_model_is_rejected() {
    let err = NuttX::new().create_binding("msp430").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedTarget);

    let mut session = RtosSession::detect(lookup).unwrap();
    assert!(session.bind("msp430").is_err());
    assert!(session.binding().is_none());

    let mut image = MemoryImage::new();
    assert_eq!(session.refresh(&mut image).unwrap_err().kind(), ErrorKind::UnsupportedTarget);
}

#[test]
fn snapshot_serializes_for_front_ends() {
    let tasks = [Task { tcb: 0x2000, pid: 5, state: 3, name: "idle" }];
    let mut image = nuttx_image(&[0x2000], &tasks, NAME_OFF as u16);
    image.set_u32(READYTORUN, 0x2000);

    let mut session = bound_session("esp32c3");
    let snapshot = session.refresh(&mut image).unwrap();
    let json = serde_json::to_value(snapshot).unwrap();
    assert_eq!(json["current_thread"], 0x2000);
    assert_eq!(json["threads"][0]["extra_info"], "pid:5, RUNNING");
    assert_eq!(json["threads"][0]["state"], "Running");
}
