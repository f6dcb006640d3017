pub mod clock;
pub mod line_printer;
pub mod teletype;
pub mod watchdog;

use common::asm::{Ac, IoFunc, IoIns, Signal, SkipTest};
use common::constants::DEVICE_MASK;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, trace};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoOpKind {
    Dia,
    Doa,
    Dib,
    Dob,
    Dic,
    Doc,
    Nio,
    Skpbn,
    Skpbz,
    Skpdn,
    Skpdz,
}

impl fmt::Display for IoOpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_uppercase())
    }
}

// One bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoOp {
    pub kind: IoOpKind,
    pub device: u8,
    pub ac: Ac,
    pub start: bool,
    pub clear: bool,
    pub pulse: bool,
}

impl IoOp {
    pub fn new(kind: IoOpKind, device: u8) -> Self {
        IoOp {
            kind,
            device: device & DEVICE_MASK,
            ac: Ac::Ac0,
            start: false,
            clear: false,
            pulse: false,
        }
    }

    pub fn with_ac(self, ac: Ac) -> Self {
        Self { ac, ..self }
    }

    pub fn with_signal(self, signal: Signal) -> Self {
        Self {
            start: signal == Signal::S,
            clear: signal == Signal::C,
            pulse: signal == Signal::P,
            ..self
        }
    }

    pub fn from_ins(ins: &IoIns) -> Self {
        use IoOpKind::*;
        let kind = match ins.func {
            IoFunc::Nio => Nio,
            IoFunc::Dia => Dia,
            IoFunc::Doa => Doa,
            IoFunc::Dib => Dib,
            IoFunc::Dob => Dob,
            IoFunc::Dic => Dic,
            IoFunc::Doc => Doc,
            IoFunc::Skp => match SkipTest::from_ac(ins.ac) {
                SkipTest::Bn => Skpbn,
                SkipTest::Bz => Skpbz,
                SkipTest::Dn => Skpdn,
                SkipTest::Dz => Skpdz,
            },
        };
        IoOp::new(kind, ins.device)
            .with_ac(ins.ac)
            .with_signal(ins.signal)
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, IoOpKind::Dia | IoOpKind::Dib | IoOpKind::Dic)
    }

    pub fn is_output(&self) -> bool {
        matches!(self.kind, IoOpKind::Doa | IoOpKind::Dob | IoOpKind::Doc)
    }

    pub fn is_transfer(&self) -> bool {
        self.is_input() || self.is_output()
    }
}


#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IoResult {
    pub handled: bool,
    pub skip: bool,
}

impl IoResult {
    pub const UNHANDLED: IoResult = IoResult { handled: false, skip: false };
    pub const HANDLED: IoResult = IoResult { handled: true, skip: false };

    pub fn skip_if(cond: bool) -> Self {
        IoResult { handled: true, skip: cond }
    }

    // Answers the four skip ops from a busy/done pair, None for anything else.
    pub fn busy_done(op: &IoOp, busy: bool, done: bool) -> Option<Self> {
        let skip = match op.kind {
            IoOpKind::Skpbn => busy,
            IoOpKind::Skpbz => !busy,
            IoOpKind::Skpdn => done,
            IoOpKind::Skpdz => !done,
            _ => return None,
        };
        Some(Self::skip_if(skip))
    }
}


// Every peripheral on the bus answers this. Kinds a device doesn't implement
// must come back unhandled.
pub trait Device: Send {
    fn device_code(&self) -> u8;

    fn execute_io(&mut self, op: &IoOp, ac: &mut u16) -> IoResult;
}


#[derive(Default)]
pub struct IoBus {
    devices: HashMap<u8, Arc<Mutex<dyn Device>>>,
}

impl IoBus {
    pub fn new() -> Self {
        Self::default()
    }

    // Last registration for a code wins. Returns the device it displaced.
    pub fn register(&mut self, device: Arc<Mutex<dyn Device>>) -> Option<Arc<Mutex<dyn Device>>> {
        let code = device.lock().unwrap_or_else(PoisonError::into_inner).device_code() & DEVICE_MASK;
        debug!("Bus: registering device 0o{code:o}");
        self.devices.insert(code, device)
    }

    pub fn unregister(&mut self, code: u8) -> Option<Arc<Mutex<dyn Device>>> {
        self.devices.remove(&(code & DEVICE_MASK))
    }

    pub fn is_assigned(&self, code: u8) -> bool {
        self.devices.contains_key(&(code & DEVICE_MASK))
    }

    pub fn codes(&self) -> Vec<u8> {
        let mut codes: Vec<u8> = self.devices.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    // Blocks for as long as the device's transaction does.
    pub fn execute(&self, op: &IoOp, ac: &mut u16) -> IoResult {
        let Some(device) = self.devices.get(&(op.device & DEVICE_MASK)) else {
            return IoResult::UNHANDLED;
        };
        let ret = device.lock().unwrap_or_else(PoisonError::into_inner).execute_io(op, ac);
        trace!("Bus: {} 0o{:o} -> {ret:?}", op.kind, op.device);
        ret
    }
}
