
use common::constants::ADDR_MASK;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Image has odd length {0}, expected whole words")]
    OddLength(usize),

    #[error("Image of {len} words doesn't fit at 0o{start:o}")]
    TooLarge { len: usize, start: u16 },

    #[error("Bad address {0:?}, expected octal below 0o100000")]
    BadAddress(String),

    #[error("Couldn't read image: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    // Octal, with or without a leading 0o. Masked to the address space.
    pub fn parse_addr(s: &str) -> Result<u16, LoadError> {
        let digits = s.strip_prefix("0o").unwrap_or(s);
        u16::from_str_radix(digits, 8)
            .ok()
            .filter(|addr| *addr <= ADDR_MASK)
            .ok_or_else(|| LoadError::BadAddress(s.to_string()))
    }
}
