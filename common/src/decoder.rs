
use std::fmt;

use super::asm::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMrfClass(pub u16);

impl fmt::Display for UnknownMrfClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Unknown MRF opcode class {}", self.0)
    }
}

impl std::error::Error for UnknownMrfClass {}

pub fn classify(word: u16) -> Format {
    Format::classify(word)
}

pub fn decode(word: u16) -> Result<Ins, UnknownMrfClass> {
    Ins::decode(word).ok_or(UnknownMrfClass(MrfIns::class_of(word)))
}
