
use disassembler::{Disassembled, disassemble, remove_long_zeros};
use common::constants::ADDR_MASK;
use common::mem::words_from_bytes;

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

/// Nova Disassembler
#[derive(Parser)]
struct Args {
    /// Image of little-endian words to disassemble
    bin: PathBuf,

    /// Address (octal) of the first word.
    #[arg(long, default_value = "0", value_parser = parse_octal)]
    origin: u16,
}

fn parse_octal(s: &str) -> Result<u16, std::num::ParseIntError> {
    u16::from_str_radix(s.strip_prefix("0o").unwrap_or(s), 8)
}


fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = Args::parse();
    let bin = std::fs::read(&args.bin)?;
    let words = words_from_bytes(&bin)
        .ok_or_else(|| format!("{} has odd length {}", args.bin.display(), bin.len()))?;
    let mut disassembly = disassemble(&words, args.origin);

    remove_long_zeros(&mut disassembly);

    let mut prev: Option<Disassembled> = None;
    for dis in disassembly {
        if let Some(p) = &prev {
            if (p.addr + 1) & ADDR_MASK != dis.addr {
                println!("...");
            }
        }
        println!("{}", dis);
        prev = Some(dis);
    }

    Ok(())
}
