use common::asm::Ac;
use common::constants::{ADDR_MASK, MEM_WORDS, NUM_ACS, SLOW_MEM};

use std::thread;
use std::time::Duration;

use log::trace;


// Kept apart from the bus so devices and the engine can borrow independently.
pub struct EmulatorState {
    num_ins: usize,
    mem: Vec<u16>,
    acs: [u16; NUM_ACS],
    pc: u16,
    carry: bool,
    halted: bool,
    halt_reason: Option<String>,
    slow_read_delay: Duration,
}

impl EmulatorState {
    pub const SLOW_READ_DELAY: Duration = Duration::from_millis(1);

    pub fn new() -> Self {
        EmulatorState {
            num_ins: 0usize,
            mem: vec![0; MEM_WORDS],
            acs: [0; NUM_ACS],
            pc: 0,
            carry: false,
            halted: false,
            halt_reason: None,
            slow_read_delay: Self::SLOW_READ_DELAY,
        }
    }

    pub fn inc_ins(&mut self) {
        self.num_ins += 1;
    }

    pub fn num_ins(&self) -> usize {
        self.num_ins
    }

    // Blocks the calling thread when addr is in the slow range.
    pub fn mem_read(&self, addr: u16) -> u16 {
        let addr = addr & ADDR_MASK;
        if SLOW_MEM.contains(&addr) && !self.slow_read_delay.is_zero() {
            trace!("Mem: slow read of 0o{addr:o}, stalling {:?}", self.slow_read_delay);
            thread::sleep(self.slow_read_delay);
        }
        self.mem[addr as usize]
    }

    pub fn mem_write(&mut self, addr: u16, val: u16) {
        let addr = addr & ADDR_MASK;
        trace!("Mem: writing {val:#o} to 0o{addr:o}");
        self.mem[addr as usize] = val;
    }

    // Whole store, without the slow range stall. For dumps and listings.
    pub fn memory(&self) -> &[u16] {
        &self.mem
    }

    pub fn set_slow_read_delay(&mut self, delay: Duration) {
        self.slow_read_delay = delay;
    }

    pub fn ac_read(&self, ac: Ac) -> u16 {
        self.acs[ac.index()]
    }

    pub fn ac_write(&mut self, ac: Ac, val: u16) {
        trace!("Reg: writing {val:#o} to {ac}");
        self.acs[ac.index()] = val;
    }

    pub fn acs(&self) -> [u16; NUM_ACS] {
        self.acs
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc & ADDR_MASK;
    }

    pub fn advance_pc(&mut self, words: u16) {
        self.set_pc(self.pc.wrapping_add(words));
    }

    pub fn carry(&self) -> bool {
        self.carry
    }

    pub fn set_carry(&mut self, val: bool) {
        self.carry = val;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    // A second halt keeps the first reason.
    pub fn halt(&mut self, reason: impl Into<String>) {
        if self.halted {
            return;
        }
        self.halted = true;
        self.halt_reason = Some(reason.into());
    }

    pub fn resume(&mut self) {
        self.halted = false;
        self.halt_reason = None;
    }

    pub fn reset(&mut self, start: u16) {
        self.mem.fill(0);
        self.acs = [0; NUM_ACS];
        self.carry = false;
        self.resume();
        self.set_pc(start);
    }
}

impl Default for EmulatorState {
    fn default() -> Self {
        Self::new()
    }
}
