use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rtosview_core::rtos::registered_backends;
use rtosview_core::{HaltedTarget, RegisterValue, RtosSession, SymbolTable};
use std::path::PathBuf;

mod demo;

#[derive(Parser)]
#[command(author, version, about = "RTOS thread awareness for halted targets", long_about = None)]
struct Cli {
    /// Target chip name, or "auto"
    #[arg(short, long, default_value = "auto")]
    chip: String,

    /// Probe index from the probe list
    #[arg(short, long)]
    probe_index: Option<usize>,

    /// Firmware ELF providing the kernel symbols
    #[arg(short, long)]
    elf: Option<PathBuf>,

    /// Override the target model used for binding (cortex_m, hla_target, esp32c3, riscv)
    #[arg(short, long)]
    target_model: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Use a built-in synthetic NuttX image instead of a probe
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached debug probes with the index --probe-index takes
    Probes,
    /// Show how each RTOS backend resolves its symbols
    Symbols,
    /// List the threads of the detected RTOS
    Threads,
    /// Dump the registers of one thread
    Regs {
        /// Thread id (control block address, hex) or "current"
        thread: String,
    },
}

#[derive(Clone, Copy)]
enum ThreadSelector {
    Current,
    Id(u64),
}

fn parse_thread(s: &str) -> Result<ThreadSelector> {
    if s.eq_ignore_ascii_case("current") {
        return Ok(ThreadSelector::Current);
    }
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    let id = u64::from_str_radix(digits, 16).with_context(|| format!("Invalid thread id: {s}"))?;
    Ok(ThreadSelector::Id(id))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Probes) {
        return list_probes(&cli);
    }

    if cli.mock {
        let mut image = demo::image();
        return run(&cli, &mut image, demo::lookup, Some(demo::TARGET_MODEL));
    }

    run_hardware(&cli)
}

#[cfg(feature = "hardware")]
fn run_hardware(cli: &Cli) -> Result<()> {
    use rtosview_core::probe::target_model;
    use rtosview_core::{ProbeManager, SymbolManager};
    use std::time::Duration;

    let elf = cli.elf.as_deref().context("--elf is required when attaching to hardware")?;
    let mut symbols = SymbolManager::new();
    symbols.load_elf(elf)?;
    if !symbols.has_symbols() {
        bail!("{} has no symbol table", elf.display());
    }

    let manager = ProbeManager::new();
    let probe = match cli.probe_index {
        Some(index) => manager.open_probe(index)?,
        None => manager.open_first_probe()?,
    };
    let mut session = manager.attach(probe, &cli.chip)?;
    let mut core = session.core(0).context("Failed to open core 0")?;
    core.halt(Duration::from_millis(100)).context("Failed to halt core")?;

    let detected = core.core_type();
    let model = target_model(detected);
    if model.is_none() {
        log::warn!("No target model known for core type {detected:?}");
    }

    run(cli, &mut core, |name| symbols.lookup_symbol(name), model)
}

#[cfg(not(feature = "hardware"))]
fn run_hardware(_cli: &Cli) -> Result<()> {
    bail!("built without the `hardware` feature; use --mock")
}

#[cfg(feature = "hardware")]
fn list_probes(cli: &Cli) -> Result<()> {
    let probes = rtosview_core::ProbeManager::new().list_probes();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&probes)?);
    } else if probes.is_empty() {
        println!("No debug probes found");
    } else {
        for probe in &probes {
            println!("{}", probe.summary());
        }
    }
    Ok(())
}

#[cfg(not(feature = "hardware"))]
fn list_probes(_cli: &Cli) -> Result<()> {
    bail!("built without the `hardware` feature; no probes to list")
}

fn run<T: HaltedTarget>(
    cli: &Cli,
    target: &mut T,
    lookup: impl Fn(&str) -> Option<u64>,
    detected_model: Option<&str>,
) -> Result<()> {
    if matches!(cli.command, Commands::Symbols) {
        print_symbols(cli, &lookup)?;
        return Ok(());
    }

    let mut session = RtosSession::detect(&lookup).context("No supported RTOS detected")?;
    log::info!("Detected {}", session.rtos_name());

    let model = cli
        .target_model
        .as_deref()
        .or(detected_model)
        .context("Unknown target model; pass --target-model")?;
    session.bind(model)?;

    session.refresh(target).context("Failed to read the thread list")?;

    match &cli.command {
        Commands::Probes | Commands::Symbols => {}
        Commands::Threads => print_threads(cli, &session)?,
        Commands::Regs { thread } => {
            let thread_id = match parse_thread(thread)? {
                ThreadSelector::Current => {
                    session.current_thread().context("No current thread")?
                }
                ThreadSelector::Id(id) => id,
            };
            let registers = session
                .thread_registers(target, thread_id)
                .with_context(|| format!("Failed to read registers of thread 0x{thread_id:08X}"))?;
            print_registers(cli, thread_id, &registers)?;
        }
    }

    Ok(())
}

fn print_symbols(cli: &Cli, lookup: &impl Fn(&str) -> Option<u64>) -> Result<()> {
    let mut report = Vec::new();
    for backend in registered_backends() {
        let table = SymbolTable::resolve(backend.required_symbols(), lookup);
        let detected = backend.detect(&table);
        if !cli.json {
            println!("{}: {}", backend.name(), if detected { "detected" } else { "not detected" });
            for (request, address) in table.iter() {
                let flag = if request.optional { " (optional)" } else { "" };
                if address == 0 {
                    println!("  {:<14} <unresolved>{flag}", request.name);
                } else {
                    println!("  {:<14} 0x{address:08X}{flag}", request.name);
                }
            }
        }
        let symbols: serde_json::Map<String, serde_json::Value> = table
            .iter()
            .map(|(request, address)| (request.name.to_string(), serde_json::json!(address)))
            .collect();
        report.push(serde_json::json!({
            "rtos": backend.name(),
            "detected": detected,
            "symbols": symbols,
        }));
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn print_threads(cli: &Cli, session: &RtosSession) -> Result<()> {
    let snapshot = session.snapshot().context("No thread snapshot")?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    println!("{}: {} threads", session.rtos_name(), snapshot.threads.len());
    for task in &snapshot.threads {
        let marker = if task.thread_id == snapshot.current_thread { '*' } else { ' ' };
        let info = task.extra_info.as_deref().unwrap_or("-");
        println!("{marker} 0x{:08X}  {:<32} {info}", task.thread_id, task.name);
    }
    Ok(())
}

fn print_registers(cli: &Cli, thread_id: u64, registers: &[RegisterValue]) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(registers)?);
        return Ok(());
    }

    println!("Thread 0x{thread_id:08X}");
    for register in registers {
        println!("  r{:<3} 0x{:0width$X}", register.number, register.as_u64(), width = register.size * 2);
    }
    Ok(())
}
