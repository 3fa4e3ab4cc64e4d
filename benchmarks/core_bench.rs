use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rtosview_core::{MemoryImage, RtosSession};

const READYTORUN: u64 = 0x2000_0000;
const PIDHASH: u64 = 0x2000_0004;
const NPIDHASH: u64 = 0x2000_0008;
const TCBINFO: u64 = 0x2000_0010;
const TABLE: u64 = 0x2000_0100;

/// A 64-bucket hash table with every other slot populated.
fn nuttx_image() -> MemoryImage {
    let mut image = MemoryImage::new();
    image.set_u32(NPIDHASH, 64);
    image.set_u32(PIDHASH, TABLE as u32);
    image.set_u32(READYTORUN, 0x2001_0000);
    for (i, field) in [0x10u16, 0x12, 0x14, 0x20, 0x60, 17, 17].iter().enumerate() {
        image.set_u16(TCBINFO + i as u64 * 2, *field);
    }

    for slot in (0..64u32).step_by(2) {
        let tcb = 0x2001_0000 + slot * 0x100;
        image.set_u32(TABLE + u64::from(slot) * 4, tcb);
        image.set_u16(u64::from(tcb) + 0x10, slot as u16);
        image.set_u8(u64::from(tcb) + 0x12, 2);
        image.set_bytes(u64::from(tcb) + 0x20, format!("task{slot}").as_bytes());
    }
    image
}

fn session() -> RtosSession {
    let mut session = RtosSession::detect(|name| match name {
        "g_readytorun" => Some(READYTORUN),
        "g_pidhash" => Some(PIDHASH),
        "g_npidhash" => Some(NPIDHASH),
        "g_tcbinfo" => Some(TCBINFO),
        _ => None,
    })
    .expect("NuttX not detected");
    session.bind("cortex_m").expect("bind failed");
    session
}

fn bench_refresh_threads(c: &mut Criterion) {
    let mut image = nuttx_image();
    let mut session = session();
    c.bench_function("nuttx_refresh_32_threads", |b| {
        b.iter(|| {
            let _ = black_box(session.refresh(&mut image).map(|s| s.threads.len()));
            image.clear_log();
        })
    });
}

fn bench_stacked_registers(c: &mut Criterion) {
    let mut image = nuttx_image();
    image.set_u32(0x2001_0200 + 0x60, 0x2002_0000);
    let mut session = session();
    let _ = session.refresh(&mut image);
    c.bench_function("nuttx_unstack_cortex_m", |b| {
        b.iter(|| {
            let _ = black_box(session.thread_registers(&mut image, 0x2001_0200));
            image.clear_log();
        })
    });
}

criterion_group!(benches, bench_refresh_threads, bench_stacked_registers);
criterion_main!(benches);
