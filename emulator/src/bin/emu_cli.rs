
use emu_lib::{Emulator, LoadError};
use emu_lib::io::teletype::{console, StdIo};
use emu_lib::io::line_printer::LinePrinter;
use emu_lib::io::clock::Clock;
use emu_lib::io::watchdog::{Watchdog, WatchdogConfig};
use common::asm::{fmt_word, Ac};

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;


/// Nova Emulator
#[derive(Parser)]
struct Args {
    /// Image of little-endian words to execute
    bin: PathBuf,

    /// Address (octal) at which to load the image.
    #[arg(long, default_value = "0", value_parser = LoadError::parse_addr)]
    load: u16,

    /// Address (octal) at which to start executing. Defaults to the load address.
    #[arg(long, value_parser = LoadError::parse_addr)]
    start: Option<u16>,

    /// Stop after this many instructions.
    #[arg(long)]
    max_steps: Option<usize>,

    /// Print every executed instruction.
    #[arg(long)]
    trace: bool,

    /// Stop before executing the instruction at this address (octal). Repeatable.
    #[arg(long = "break", value_parser = LoadError::parse_addr)]
    breaks: Vec<u16>,

    /// File the line printer appends to.
    #[arg(long)]
    lpt: Option<PathBuf>,

    /// Let programs use the watchdog timer.
    #[arg(long)]
    watchdog: bool,
}


#[derive(Debug, PartialEq, Eq)]
enum Stop {
    Halted,
    MaxSteps,
    Breakpoint(u16),
}

// Breakpoints are checked before each instruction, so one on the start
// address stops before anything runs.
fn run(emu: &mut Emulator, max_steps: Option<usize>, breaks: &[u16], trace: bool) -> Stop {
    loop {
        if max_steps.is_some_and(|max| emu.num_ins() >= max) {
            return Stop::MaxSteps;
        }
        if breaks.contains(&emu.pc()) {
            return Stop::Breakpoint(emu.pc());
        }

        let step = emu.step();
        if trace {
            println!("{step}");
        }
        if step.halted {
            return Stop::Halted;
        }
    }
}


fn main() -> Result<(), LoadError> {
    env_logger::init();

    let args = Args::parse();

    let mut emu = Emulator::new();
    let (tti, tto) = console(Arc::new(StdIo::default()));
    emu.register_device(tti);
    emu.register_device(tto);
    emu.register_device(Clock::default());
    emu.register_device(match args.lpt {
        Some(path) => LinePrinter::to_file(path),
        None => LinePrinter::default(),
    });
    if args.watchdog {
        let config = WatchdogConfig { host_enabled: true, ..Default::default() };
        emu.register_device(Watchdog::with_config(emu.control_handle(), config));
    }

    let codes: Vec<String> = emu.bus().codes().iter().map(|c| format!("{c:02o}")).collect();
    info!("Devices: {}", codes.join(" "));

    let buf = std::fs::read(&args.bin)?;
    let len = emu.load_image(&buf, args.load)?;
    info!("Loaded {len} words at 0o{:o}", args.load);
    emu.set_pc(args.start.unwrap_or(args.load));

    match run(&mut emu, args.max_steps, &args.breaks, args.trace) {
        Stop::Halted => (),
        Stop::MaxSteps => println!("Stopped after {} instructions", emu.num_ins()),
        Stop::Breakpoint(addr) => println!("Breakpoint at {}", fmt_word(addr)),
    }

    println!();
    print!("PC {}", fmt_word(emu.pc()));
    for ac in Ac::ALL {
        print!("  {ac} {}", fmt_word(emu.ac_read(ac)));
    }
    println!("  C {}", emu.carry() as u8);
    match emu.halt_reason() {
        Some(reason) => println!("Halted: {reason}"),
        None if emu.is_halted() => println!("Halted"),
        None => println!("Running"),
    }
    println!("{} instructions executed", emu.num_ins());

    Ok(())
}
