
use common::asm::*;
use common::constants::*;
use common::decoder::decode;
use common::mem::words_from_bytes;
use crate::control::{control_channel, ControlHandle, ControlRequest};
use crate::io::{Device, IoBus, IoOp};
use crate::EmulatorState;
use crate::LoadError;

use std::fmt;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use delegate::delegate;
use log::{debug, info, warn};


// What one call to step() did. Rendering it is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStep {
    pub addr: u16,
    pub ins: u16,
    pub desc: String,
    pub halted: bool,
    pub branch_taken: bool,
    pub ac: Option<Ac>,
    pub carry: bool,
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} {}", fmt_word(self.addr), fmt_word(self.ins), self.desc)?;
        if self.halted {
            write!(f, " [halted]")?;
        }
        Ok(())
    }
}

// Per-instruction results, before the common fields are filled in.
#[derive(Debug, Default)]
struct Outcome {
    desc: String,
    branch_taken: bool,
    ac: Option<Ac>,
}


pub struct Emulator {
    state: EmulatorState,
    bus: IoBus,
    control: ControlHandle,
    requests: Receiver<ControlRequest>,
}

impl Emulator {
    pub const HALT_REASON: &'static str = "HALT instruction";

    pub fn new() -> Emulator {
        let (control, requests) = control_channel();
        Emulator {
            state: EmulatorState::new(),
            bus: IoBus::new(),
            control,
            requests,
        }
    }

    delegate! {
        to self.state {
            pub fn pc(&self) -> u16;
            pub fn set_pc(&mut self, pc: u16);
            pub fn ac_read(&self, ac: Ac) -> u16;
            pub fn ac_write(&mut self, ac: Ac, val: u16);
            pub fn acs(&self) -> [u16; NUM_ACS];
            pub fn carry(&self) -> bool;
            pub fn set_carry(&mut self, val: bool);
            pub fn is_halted(&self) -> bool;
            pub fn halt_reason(&self) -> Option<&str>;
            pub fn halt(&mut self, reason: impl Into<String>);
            pub fn resume(&mut self);
            pub fn num_ins(&self) -> usize;
            pub fn mem_read(&self, addr: u16) -> u16;
            pub fn mem_write(&mut self, addr: u16, val: u16);
            pub fn set_slow_read_delay(&mut self, delay: Duration);
        }
    }

    pub fn get_state(&self) -> &EmulatorState {
        &self.state
    }

    pub fn bus(&self) -> &IoBus {
        &self.bus
    }

    pub fn reset(&mut self, start: u16) {
        info!("CPU: reset, PC 0o{start:o}");
        self.state.reset(start);
    }

    pub fn load_words(&mut self, words: &[u16], start: u16) -> Result<(), LoadError> {
        let start = start & ADDR_MASK;
        if start as usize + words.len() > MEM_WORDS {
            return Err(LoadError::TooLarge { len: words.len(), start });
        }
        for (word, addr) in words.iter().zip(start..) {
            self.state.mem_write(addr, *word);
        }
        Ok(())
    }

    // Little-endian words, as written by the tools in this workspace.
    pub fn load_image(&mut self, data: &[u8], start: u16) -> Result<usize, LoadError> {
        let words = words_from_bytes(data).ok_or(LoadError::OddLength(data.len()))?;
        self.load_words(&words, start)?;
        Ok(words.len())
    }

    pub fn register_device(&mut self, device: impl Device + 'static) {
        self.bus.register(Arc::new(Mutex::new(device)));
    }

    // For callers that want to keep talking to the device themselves.
    pub fn register_shared<D: Device + 'static>(&mut self, device: Arc<Mutex<D>>) {
        self.bus.register(device);
    }

    pub fn unregister_device(&mut self, code: u8) -> bool {
        self.bus.unregister(code).is_some()
    }

    pub fn control_handle(&self) -> ControlHandle {
        self.control.clone()
    }

    // Applies whatever other threads have asked for. Returns how many requests ran.
    pub fn apply_control_requests(&mut self) -> usize {
        let mut count = 0;
        while let Ok(req) = self.requests.try_recv() {
            info!("CPU: control request {req:?}");
            match req {
                ControlRequest::Halt(reason) => self.state.halt(reason),
                ControlRequest::Reset(start) => self.reset(start),
                ControlRequest::Resume => self.state.resume(),
            }
            count += 1;
        }
        count
    }

    // Runs exactly one instruction, unless halted.
    pub fn step(&mut self) -> ExecutionStep {
        self.apply_control_requests();

        if self.state.is_halted() {
            let desc = match self.state.halt_reason() {
                Some(reason) => format!("CPU halted ({reason})"),
                None => "CPU halted".to_string(),
            };
            return ExecutionStep {
                addr: self.state.pc(),
                ins: 0,
                desc,
                halted: true,
                branch_taken: false,
                ac: None,
                carry: self.state.carry(),
            };
        }

        let addr = self.state.pc();
        let word = self.state.mem_read(addr);
        self.state.advance_pc(1);
        self.state.inc_ins();

        let outcome = match decode(word) {
            Ok(ins) => {
                debug!("PC: 0o{addr:o}: {}", ins.display_with_pc(addr));
                self.exec(&ins, addr)
            },
            Err(err) => {
                warn!("CPU: {err} at 0o{addr:o}");
                self.state.halt(err.to_string());
                Outcome { desc: format!("{err} (halting)"), ..Default::default() }
            },
        };

        ExecutionStep {
            addr,
            ins: word,
            desc: outcome.desc,
            halted: self.state.is_halted(),
            branch_taken: outcome.branch_taken,
            ac: outcome.ac,
            carry: self.state.carry(),
        }
    }

    fn exec(&mut self, ins: &Ins, addr: u16) -> Outcome {
        match ins {
            Ins::Mrf(ins) => self.exec_mrf(ins, addr),
            Ins::Operate(ins) => self.exec_operate(ins),
            Ins::Io(ins) => self.exec_io(ins),
        }
    }

    fn skip(&mut self) {
        self.state.advance_pc(1);
    }


    ///////////////////////////////////////////////////////////////////////////
    // Memory reference
    ///////////////////////////////////////////////////////////////////////////

    // Returns the final 15 bit address. Following an auto-increment or
    // auto-decrement pointer writes the bumped pointer back first.
    pub fn resolve_operand(&mut self, operand: &Operand, addr: u16) -> u16 {
        let base = match operand.mode {
            AddrMode::Zero => 0,
            AddrMode::Rel => addr,
            AddrMode::Ac2 => self.state.ac_read(Ac::Ac2),
            AddrMode::Ac3 => self.state.ac_read(Ac::Ac3),
        };
        let ea = base.wrapping_add(operand.offset()) & ADDR_MASK;
        if !operand.indirect {
            return ea;
        }

        let mut ptr = self.state.mem_read(ea);
        if AUTO_INC.contains(&ea) {
            ptr = ptr.wrapping_add(1);
            self.state.mem_write(ea, ptr);
        } else if AUTO_DEC.contains(&ea) {
            ptr = ptr.wrapping_sub(1);
            self.state.mem_write(ea, ptr);
        }
        ptr & ADDR_MASK
    }

    fn exec_mrf(&mut self, ins: &MrfIns, addr: u16) -> Outcome {
        let ea = self.resolve_operand(&ins.operand, addr);
        let mut desc = Ins::Mrf(*ins).display_with_pc(addr).to_string();
        if ins.operand.indirect || ins.operand.mode.index_reg().is_some() {
            desc.push_str(&format!(" [{}]", fmt_word(ea)));
        }

        let mut out = Outcome::default();
        match ins.op {
            MrfOp::Jmp => {
                self.state.set_pc(ea);
                out.branch_taken = true;
            },
            MrfOp::Jsr => {
                // The return address goes in after the target is computed.
                let ret = self.state.pc();
                self.state.ac_write(Ac::Ac3, ret);
                self.state.set_pc(ea);
                out.branch_taken = true;
                out.ac = Some(Ac::Ac3);
            },
            MrfOp::Isz | MrfOp::Dsz => {
                let old = self.state.mem_read(ea);
                let val = if ins.op == MrfOp::Isz {
                    old.wrapping_add(1)
                } else {
                    old.wrapping_sub(1)
                };
                self.state.mem_write(ea, val);
                if val == 0 {
                    self.skip();
                    out.branch_taken = true;
                    desc.push_str(" (skip)");
                }
            },
            MrfOp::Lda(ac) => {
                let val = self.state.mem_read(ea);
                self.state.ac_write(ac, val);
                out.ac = Some(ac);
            },
            MrfOp::Sta(ac) => {
                self.state.mem_write(ea, self.state.ac_read(ac));
                out.ac = Some(ac);
            },
        }
        out.desc = desc;
        out
    }


    ///////////////////////////////////////////////////////////////////////////
    // Operate
    ///////////////////////////////////////////////////////////////////////////

    fn exec_operate(&mut self, ins: &OperateIns) -> Outcome {
        let src = self.state.ac_read(ins.src);
        let dst = self.state.ac_read(ins.dst);

        let carry_in = match ins.carry {
            CarryCtl::None => self.state.carry(),
            CarryCtl::Z => false,
            CarryCtl::O => true,
            CarryCtl::C => !self.state.carry(),
        };

        let (res, carry) = alu(ins.func, src, dst, carry_in);
        let (res, carry) = shift(ins.shift, res, carry);

        if !ins.no_load {
            self.state.ac_write(ins.dst, res);
        }
        self.state.set_carry(carry);

        let mut out = Outcome {
            desc: ins.to_string(),
            ac: (!ins.no_load).then_some(ins.dst),
            ..Default::default()
        };
        if skip_holds(ins.skip, carry, res) {
            self.skip();
            out.branch_taken = true;
            out.desc.push_str(" (skip)");
        }
        out
    }


    ///////////////////////////////////////////////////////////////////////////
    // I/O
    ///////////////////////////////////////////////////////////////////////////

    fn exec_io(&mut self, ins: &IoIns) -> Outcome {
        let mut out = Outcome {
            desc: ins.to_string(),
            ..Default::default()
        };

        if ins.is_halt() {
            info!("CPU: halt at 0o{:o}", self.state.pc().wrapping_sub(1) & ADDR_MASK);
            self.state.halt(Self::HALT_REASON);
            return out;
        }

        let op = IoOp::from_ins(ins);
        let mut val = if op.is_transfer() { self.state.ac_read(op.ac) } else { 0 };
        let ret = self.bus.execute(&op, &mut val);

        if op.is_transfer() {
            out.ac = Some(op.ac);
        }
        if ret.handled && op.is_input() {
            self.state.ac_write(op.ac, val);
        }
        if ret.skip {
            self.skip();
            out.branch_taken = true;
            out.desc.push_str(" (skip)");
        }
        if !ret.handled {
            warn!("Bus: {} to unassigned device 0o{:o}", op.kind, op.device);
            out.desc.push_str(" (unassigned)");
        }
        out
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}


// Carry out is set when the unbounded sum doesn't fit in a word.
pub fn add_with_carry(lhs: u16, rhs: u16, carry_in: bool) -> (u16, bool) {
    let total = lhs as u32 + rhs as u32 + carry_in as u32;
    (total as u16, total > WORD_MASK as u32)
}

// The carry bit doubles as borrow, in and out.
pub fn sub_with_borrow(lhs: u16, rhs: u16, borrow_in: bool) -> (u16, bool) {
    let total = lhs as i32 - rhs as i32 - borrow_in as i32;
    (total as u16, total < 0)
}

pub fn alu(func: AluFunc, src: u16, dst: u16, carry_in: bool) -> (u16, bool) {
    match func {
        AluFunc::Com => (!src, carry_in),
        AluFunc::Neg => add_with_carry(!src, 1, carry_in),
        AluFunc::Mov => (src, carry_in),
        AluFunc::Inc => add_with_carry(src, 1, false),
        AluFunc::Adc => add_with_carry(dst, src, carry_in),
        AluFunc::Sub => sub_with_borrow(dst, src, carry_in),
        AluFunc::Add => add_with_carry(dst, src, false),
        AluFunc::And => (dst & src, carry_in),
    }
}

pub fn shift(shift: Shift, val: u16, carry: bool) -> (u16, bool) {
    match shift {
        Shift::None => (val, carry),
        Shift::L => ((val << 1) | carry as u16, val & 0x8000 != 0),
        Shift::R => ((val >> 1) | ((carry as u16) << 15), val & 0x1 != 0),
        Shift::S => (val.swap_bytes(), carry),
    }
}

pub fn skip_holds(skip: SkipCond, carry: bool, res: u16) -> bool {
    match skip {
        SkipCond::Never => false,
        SkipCond::Skp => true,
        SkipCond::Szc => !carry,
        SkipCond::Snc => carry,
        SkipCond::Szr => res == 0,
        SkipCond::Snr => res != 0,
        SkipCond::Sez => !carry || res == 0,
        SkipCond::Sbn => carry && res != 0,
    }
}
