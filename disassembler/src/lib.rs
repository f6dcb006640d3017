
use common::asm::{fmt_word, Ins};
use common::constants::ADDR_MASK;
use common::decoder::decode;

use std::fmt;
use std::ops::Range;

pub struct Disassembled {
    pub addr: u16,
    pub word: u16,
    pub ins: Option<Ins>,
}

impl fmt::Display for Disassembled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", fmt_word(self.addr), fmt_word(self.word))?;
        match &self.ins {
            Some(ins) => write!(f, " {}", ins.display_with_pc(self.addr)),
            None => write!(f, " ???"),
        }
    }
}

// One entry per word. Addresses wrap at the top of memory.
pub fn disassemble(words: &[u16], origin: u16) -> Vec<Disassembled> {
    words.iter()
        .enumerate()
        .map(|(i, &word)| {
            let addr = origin.wrapping_add(i as u16) & ADDR_MASK;
            Disassembled { addr, word, ins: decode(word).ok() }
        })
        .collect()
}

pub fn remove_long_zeros(disassembly: &mut Vec<Disassembled>) {
    const THRESH: usize = 8;

    let mut ranges = vec![];
    let mut range_start = None;
    for (i, dis) in disassembly.iter().enumerate() {
        if dis.word == 0 {
            if range_start.is_none() {
                range_start = Some(i);
            }
        } else if let Some(start) = range_start {
            ranges.push(Range{start, end: i});
            range_start = None;
        }
    }
    if let Some(start) = range_start {
        ranges.push(Range{start, end: disassembly.len()});
    }

    for range in ranges.iter().rev() {
        if range.len() > THRESH {
            // Leave the first and last, an ellipses will be added between.
            disassembly.drain(range.start + 1..range.end - 1);
        }
    }
}
