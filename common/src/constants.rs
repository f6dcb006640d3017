
use std::ops::RangeInclusive;

pub const WORD_BITS: u32 = 16;
pub const WORD_MASK: u16 = 0xffff;

pub const ADDR_BITS: u32 = 15;
pub const ADDR_MASK: u16 = (1u16 << ADDR_BITS) - 1;
pub const MEM_WORDS: usize = 1usize << ADDR_BITS; // 32K words

pub const NUM_ACS: usize = 4;

// Indirect pointers stored here are bumped before being followed.
pub const AUTO_INC: RangeInclusive<u16> = 0o20..=0o27;
pub const AUTO_DEC: RangeInclusive<u16> = 0o30..=0o37;

// Reads from this range stall the caller (see emu_lib::EmulatorState).
pub const SLOW_MEM: RangeInclusive<u16> = 0o40..=0o47;

pub const DEVICE_BITS: u32 = 6;
pub const DEVICE_MASK: u8 = (1u8 << DEVICE_BITS) - 1;
pub const NUM_DEVICES: usize = 1usize << DEVICE_BITS;

// Standard device codes
pub const DEV_TTI: u8 = 0o10;
pub const DEV_TTO: u8 = 0o11;
pub const DEV_LPT: u8 = 0o14;
pub const DEV_RTC: u8 = 0o21;
pub const DEV_WDT: u8 = 0o70;
pub const DEV_CPU: u8 = 0o77;
