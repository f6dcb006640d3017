use common::constants::DEV_RTC;
use crate::io::{Device, IoOp, IoOpKind, IoResult};

use std::time::{SystemTime, UNIX_EPOCH};

use log::error;

// Seconds since the Unix epoch, UTC.
pub trait TimeSource: Send {
    fn now(&self) -> u64;
}

#[derive(Default, Clone, Copy)]
pub struct SystemClock();

impl TimeSource for SystemClock {
    fn now(&self) -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs(),
            Err(e) => {
                error!("Clock: system time before 1970: {e}");
                0
            },
        }
    }
}

// Stands still until told otherwise.
#[derive(Default, Clone, Copy)]
pub struct FixedClock(pub u64);

impl TimeSource for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}


// Read-only wall clock. Always idle and done.
pub struct Clock {
    code: u8,
    source: Box<dyn TimeSource>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Box::new(SystemClock()))
    }
}

impl Clock {
    // 2000-01-01T00:00:00Z
    pub const EPOCH_2000: u64 = 946_684_800;
    const SECS_PER_DAY: u64 = 86_400;

    pub fn new(source: Box<dyn TimeSource>) -> Self {
        Self::with_code(source, DEV_RTC)
    }

    pub fn with_code(source: Box<dyn TimeSource>, code: u8) -> Self {
        Clock { code, source }
    }

    pub fn minutes_since_midnight(&self) -> u16 {
        ((self.source.now() % Self::SECS_PER_DAY) / 60) as u16
    }

    pub fn epoch_seconds(&self) -> u64 {
        self.source.now().saturating_sub(Self::EPOCH_2000)
    }
}

impl Device for Clock {
    fn device_code(&self) -> u8 {
        self.code
    }

    fn execute_io(&mut self, op: &IoOp, ac: &mut u16) -> IoResult {
        match op.kind {
            IoOpKind::Dia => *ac = self.minutes_since_midnight(),
            IoOpKind::Dib => *ac = self.epoch_seconds() as u16,
            IoOpKind::Dic => *ac = (self.epoch_seconds() >> 16) as u16,
            IoOpKind::Nio => (),
            _ => return IoResult::busy_done(op, false, true).unwrap_or(IoResult::UNHANDLED),
        }
        IoResult::HANDLED
    }
}
