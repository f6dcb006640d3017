
use crate::constants::{ADDR_MASK, DEVICE_MASK, DEV_CPU};

use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use derive_more::{IsVariant, Unwrap};
use delegate::delegate;


#[inline]
pub fn field(word: u16, shift: u32, bits: u32) -> u16 {
    (word >> shift) & ((1u16 << bits) - 1)
}

pub fn sign_extend8(val: u8) -> u16 {
    val as i8 as i16 as u16
}

// Six digit octal, the way words are shown on the front panel.
pub fn fmt_word(val: u16) -> String {
    format!("{val:06o}")
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq, Hash)]
pub enum Ac {
    Ac0 = 0,
    Ac1,
    Ac2,
    Ac3,
}

impl Ac {
    pub const NUM_BITS: u32 = 2;
    pub const MASK: u16 = (1u16 << Self::NUM_BITS) - 1;
    pub const ALL: [Ac; 4] = [Ac::Ac0, Ac::Ac1, Ac::Ac2, Ac::Ac3];

    // Two bits always name an accumulator.
    pub fn from_bits(bits: u16) -> Ac {
        Self::ALL[(bits & Self::MASK) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn bits(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for Ac {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AC{}", self.index())
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum Format {
    Io,
    Operate,
    Mrf,
}

impl Format {
    const IO_SELECT_MASK: u16 = 0o160000;
    const IO_SELECT: u16 = 0o060000;
    const OPERATE_BIT: u16 = 0o100000;

    // Checked in priority order: I/O, then operate, then memory reference.
    pub fn classify(word: u16) -> Format {
        if word & Self::IO_SELECT_MASK == Self::IO_SELECT {
            Format::Io
        } else if word & Self::OPERATE_BIT != 0 {
            Format::Operate
        } else {
            Format::Mrf
        }
    }
}


////////////////////////////////////////////////////////////////////////////////
// Memory reference
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum AddrMode {
    Zero = 0, // Page zero
    Rel,      // Relative to the instruction
    Ac2,      // Indexed off AC2
    Ac3,      // Indexed off AC3
}

impl AddrMode {
    pub const NUM_BITS: u32 = 2;
    pub const SHIFT: u32 = 8;

    pub fn index_reg(self) -> Option<Ac> {
        match self {
            AddrMode::Ac2 => Some(Ac::Ac2),
            AddrMode::Ac3 => Some(Ac::Ac3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub indirect: bool,
    pub mode: AddrMode,
    pub disp: u8,
}

impl Operand {
    pub const NUM_BITS: u32 = 11;
    const INDIRECT_SHIFT: u32 = 10;
    const DISP_MASK: u16 = 0xff;

    pub fn zero(disp: u8) -> Operand {
        Operand{indirect: false, mode: AddrMode::Zero, disp}
    }

    pub fn rel(offset: i8) -> Operand {
        Operand{indirect: false, mode: AddrMode::Rel, disp: offset as u8}
    }

    pub fn indexed(ac: Ac, offset: i8) -> Operand {
        let mode = match ac {
            Ac::Ac2 => AddrMode::Ac2,
            Ac::Ac3 => AddrMode::Ac3,
            _ => panic!("Only AC2 and AC3 can index, not {ac}"),
        };
        Operand{indirect: false, mode, disp: offset as u8}
    }

    pub fn deferred(self) -> Operand {
        Operand{indirect: true, ..self}
    }

    // Page zero displacements are unsigned, the rest are signed.
    pub fn offset(&self) -> u16 {
        match self.mode {
            AddrMode::Zero => self.disp as u16,
            _ => sign_extend8(self.disp),
        }
    }

    pub fn encode(&self) -> u16 {
        ((self.indirect as u16) << Self::INDIRECT_SHIFT)
            | (self.mode.to_u16().unwrap() << AddrMode::SHIFT)
            | self.disp as u16
    }

    fn decode(word: u16) -> Operand {
        let indirect = field(word, Self::INDIRECT_SHIFT, 1) != 0;
        let mode = AddrMode::from_u16(field(word, AddrMode::SHIFT, AddrMode::NUM_BITS)).unwrap();
        let disp = (word & Self::DISP_MASK) as u8;
        Operand{indirect, mode, disp}
    }

    fn fmt_signed(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let val = self.disp as i8;
        match val.cmp(&0) {
            std::cmp::Ordering::Less => write!(f, "-{:o}", -(val as i16)),
            std::cmp::Ordering::Equal => write!(f, "0"),
            std::cmp::Ordering::Greater => write!(f, "{val:o}"),
        }
    }

    pub fn fmt_with_pc(&self, f: &mut fmt::Formatter, pc: u16) -> fmt::Result {
        if self.indirect {
            write!(f, "@")?;
        }
        match self.mode {
            AddrMode::Rel => {
                let ea = pc.wrapping_add(self.offset()) & ADDR_MASK;
                write!(f, "{}", fmt_word(ea))
            },
            _ => self.fmt_body(f),
        }
    }

    fn fmt_body(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.mode {
            AddrMode::Zero => write!(f, "{}", fmt_word(self.disp as u16)),
            AddrMode::Rel => {
                write!(f, ".")?;
                if (self.disp as i8) >= 0 {
                    write!(f, "+")?;
                }
                self.fmt_signed(f)
            },
            AddrMode::Ac2 | AddrMode::Ac3 => {
                self.fmt_signed(f)?;
                write!(f, ",{}", self.mode.index_reg().unwrap())
            },
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.indirect {
            write!(f, "@")?;
        }
        self.fmt_body(f)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum MrfOp {
    Jmp,
    Jsr,
    Isz,
    Dsz,
    Lda(Ac),
    Sta(Ac),
}

impl MrfOp {
    pub const NUM_BITS: u32 = 4;
    pub const SHIFT: u32 = 11;

    pub fn class(self) -> u16 {
        match self {
            MrfOp::Jmp => 0,
            MrfOp::Jsr => 1,
            MrfOp::Isz => 2,
            MrfOp::Dsz => 3,
            MrfOp::Lda(ac) => 4 + ac.bits(),
            MrfOp::Sta(ac) => 8 + ac.bits(),
        }
    }

    pub fn from_class(class: u16) -> Option<MrfOp> {
        let op = match class {
            0 => MrfOp::Jmp,
            1 => MrfOp::Jsr,
            2 => MrfOp::Isz,
            3 => MrfOp::Dsz,
            4..=7 => MrfOp::Lda(Ac::from_bits(class - 4)),
            8..=11 => MrfOp::Sta(Ac::from_bits(class - 8)),
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for MrfOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MrfOp::Jmp => write!(f, "JMP "),
            MrfOp::Jsr => write!(f, "JSR "),
            MrfOp::Isz => write!(f, "ISZ "),
            MrfOp::Dsz => write!(f, "DSZ "),
            MrfOp::Lda(ac) => write!(f, "LDA {ac}, "),
            MrfOp::Sta(ac) => write!(f, "STA {ac}, "),
        }
    }
}

#[macro_export]
macro_rules! mrf_ins {
    ($op:ident($ac:expr), $operand:expr) => { Ins::Mrf(MrfIns{op: MrfOp::$op($ac), operand: $operand}) };
    ($op:ident, $operand:expr) => { Ins::Mrf(MrfIns{op: MrfOp::$op, operand: $operand}) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MrfIns {
    pub op: MrfOp,
    pub operand: Operand,
}

impl MrfIns {
    pub fn class_of(word: u16) -> u16 {
        field(word, MrfOp::SHIFT, MrfOp::NUM_BITS)
    }

    pub fn encode(&self) -> u16 {
        (self.op.class() << MrfOp::SHIFT) | self.operand.encode()
    }

    pub fn fmt_with_pc(&self, f: &mut fmt::Formatter, pc: u16) -> fmt::Result {
        write!(f, "{}", self.op)?;
        self.operand.fmt_with_pc(f, pc)
    }

    fn decode(word: u16) -> Option<Ins> {
        let op = MrfOp::from_class(Self::class_of(word))?;
        Some(Ins::Mrf(Self{op, operand: Operand::decode(word)}))
    }
}

impl fmt::Display for MrfIns {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.op, self.operand)
    }
}


////////////////////////////////////////////////////////////////////////////////
// Operate (ALU)
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum AluFunc {
    Com = 0,
    Neg,
    Mov,
    Inc,
    Adc,
    Sub,
    Add,
    And,
}

impl AluFunc {
    pub const SHIFT: u32 = 8;
    pub const NUM_BITS: u32 = 3;
}

impl fmt::Display for AluFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum Shift {
    None = 0,
    L, // Rotate left through carry
    R, // Rotate right through carry
    S, // Swap bytes
}

impl Shift {
    pub const SHIFT: u32 = 6;
    pub const NUM_BITS: u32 = 2;
}

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum CarryCtl {
    None = 0,
    Z, // Zero
    O, // One
    C, // Complement
}

impl CarryCtl {
    pub const SHIFT: u32 = 4;
    pub const NUM_BITS: u32 = 2;
}

// Suffix letters, blank for the default.
macro_rules! suffix_display {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $ty::None => Ok(()),
                    other => write!(f, "{:?}", other),
                }
            }
        }
    };
}

suffix_display!(Shift);
suffix_display!(CarryCtl);

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum SkipCond {
    Never = 0,
    Skp,
    Szc,
    Snc,
    Szr,
    Snr,
    Sez,
    Sbn,
}

impl SkipCond {
    pub const NUM_BITS: u32 = 3;
}

impl fmt::Display for SkipCond {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipCond::Never => Ok(()),
            other => write!(f, "{}", format!("{:?}", other).to_uppercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperateIns {
    pub func: AluFunc,
    pub src: Ac,
    pub dst: Ac,
    pub shift: Shift,
    pub carry: CarryCtl,
    pub no_load: bool,
    pub skip: SkipCond,
}

#[macro_export]
macro_rules! op_ins {
    ($func:ident, $src:expr, $dst:expr) => { Ins::Operate(OperateIns::new(AluFunc::$func, $src, $dst)) };
}

impl OperateIns {
    const MARKER: u16 = 0o100000;
    const SRC_SHIFT: u32 = 13;
    const DST_SHIFT: u32 = 11;
    const NO_LOAD_SHIFT: u32 = 3;

    pub fn new(func: AluFunc, src: Ac, dst: Ac) -> OperateIns {
        OperateIns{
            func,
            src,
            dst,
            shift: Shift::None,
            carry: CarryCtl::None,
            no_load: false,
            skip: SkipCond::Never,
        }
    }

    pub fn with_shift(self, shift: Shift) -> Self {
        Self{shift, ..self}
    }

    pub fn with_carry(self, carry: CarryCtl) -> Self {
        Self{carry, ..self}
    }

    pub fn with_skip(self, skip: SkipCond) -> Self {
        Self{skip, ..self}
    }

    pub fn no_load(self) -> Self {
        Self{no_load: true, ..self}
    }

    pub fn encode(&self) -> u16 {
        Self::MARKER
            | (self.src.bits() << Self::SRC_SHIFT)
            | (self.dst.bits() << Self::DST_SHIFT)
            | (self.func.to_u16().unwrap() << AluFunc::SHIFT)
            | (self.shift.to_u16().unwrap() << Shift::SHIFT)
            | (self.carry.to_u16().unwrap() << CarryCtl::SHIFT)
            | ((self.no_load as u16) << Self::NO_LOAD_SHIFT)
            | self.skip.to_u16().unwrap()
    }

    pub fn fmt_with_pc(&self, f: &mut fmt::Formatter, _pc: u16) -> fmt::Result {
        write!(f, "{}", self)
    }

    fn decode(word: u16) -> Option<Ins> {
        if word & Self::MARKER == 0 {
            return None;
        }
        Some(Ins::Operate(Self{
            func: AluFunc::from_u16(field(word, AluFunc::SHIFT, AluFunc::NUM_BITS))?,
            src: Ac::from_bits(field(word, Self::SRC_SHIFT, Ac::NUM_BITS)),
            dst: Ac::from_bits(field(word, Self::DST_SHIFT, Ac::NUM_BITS)),
            shift: Shift::from_u16(field(word, Shift::SHIFT, Shift::NUM_BITS))?,
            carry: CarryCtl::from_u16(field(word, CarryCtl::SHIFT, CarryCtl::NUM_BITS))?,
            no_load: field(word, Self::NO_LOAD_SHIFT, 1) != 0,
            skip: SkipCond::from_u16(field(word, 0, SkipCond::NUM_BITS))?,
        }))
    }
}

impl fmt::Display for OperateIns {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.func, self.carry, self.shift)?;
        if self.no_load {
            write!(f, "#")?;
        }
        write!(f, " {}, {}", self.src, self.dst)?;
        if self.skip != SkipCond::Never {
            write!(f, " {}", self.skip)?;
        }
        Ok(())
    }
}


////////////////////////////////////////////////////////////////////////////////
// I/O
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum IoFunc {
    Nio = 0,
    Dia,
    Doa,
    Dib,
    Dob,
    Dic,
    Doc,
    Skp,
}

impl IoFunc {
    pub const SHIFT: u32 = 8;
    pub const NUM_BITS: u32 = 3;

    pub fn is_input(self) -> bool {
        matches!(self, IoFunc::Dia | IoFunc::Dib | IoFunc::Dic)
    }

    pub fn is_output(self) -> bool {
        matches!(self, IoFunc::Doa | IoFunc::Dob | IoFunc::Doc)
    }
}

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum Signal {
    None = 0,
    S, // Start
    C, // Clear
    P, // Pulse
}

impl Signal {
    pub const SHIFT: u32 = 6;
    pub const NUM_BITS: u32 = 2;
}

suffix_display!(Signal);

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum SkipTest {
    Bn = 0, // Busy nonzero
    Bz,     // Busy zero
    Dn,     // Done nonzero
    Dz,     // Done zero
}

impl SkipTest {
    pub const ALL: [SkipTest; 4] = [SkipTest::Bn, SkipTest::Bz, SkipTest::Dn, SkipTest::Dz];

    // The skip group reuses the accumulator field.
    pub fn from_ac(ac: Ac) -> SkipTest {
        Self::ALL[ac.index()]
    }
}

#[macro_export]
macro_rules! io_ins {
    ($func:ident, $ac:expr, $device:expr) => {
        Ins::Io(IoIns{func: IoFunc::$func, ac: $ac, signal: Signal::None, device: $device})
    };
    ($func:ident, $ac:expr, $signal:ident, $device:expr) => {
        Ins::Io(IoIns{func: IoFunc::$func, ac: $ac, signal: Signal::$signal, device: $device})
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Unwrap)]
pub enum IoSelect {
    Ac(Ac),
    Test(SkipTest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoIns {
    pub func: IoFunc,
    // For the skip group these two bits pick the test instead.
    pub ac: Ac,
    pub signal: Signal,
    pub device: u8,
}

impl IoIns {
    const MARKER: u16 = 0o060000;
    const AC_SHIFT: u32 = 11;

    pub fn skip(test: SkipTest, device: u8) -> IoIns {
        IoIns{
            func: IoFunc::Skp,
            ac: Ac::from_bits(test as u16),
            signal: Signal::None,
            device,
        }
    }

    pub fn halt() -> IoIns {
        IoIns{func: IoFunc::Doc, ac: Ac::Ac0, signal: Signal::None, device: DEV_CPU}
    }

    pub fn is_halt(&self) -> bool {
        self.func == IoFunc::Doc && self.signal == Signal::None && self.device == DEV_CPU
    }

    pub fn select(&self) -> IoSelect {
        match self.func {
            IoFunc::Skp => IoSelect::Test(SkipTest::from_ac(self.ac)),
            _ => IoSelect::Ac(self.ac),
        }
    }

    pub fn encode(&self) -> u16 {
        Self::MARKER
            | (self.ac.bits() << Self::AC_SHIFT)
            | (self.func.to_u16().unwrap() << IoFunc::SHIFT)
            | (self.signal.to_u16().unwrap() << Signal::SHIFT)
            | (self.device & DEVICE_MASK) as u16
    }

    pub fn fmt_with_pc(&self, f: &mut fmt::Formatter, _pc: u16) -> fmt::Result {
        write!(f, "{}", self)
    }

    fn decode(word: u16) -> Option<Ins> {
        if Format::classify(word) != Format::Io {
            return None;
        }
        Some(Ins::Io(Self{
            func: IoFunc::from_u16(field(word, IoFunc::SHIFT, IoFunc::NUM_BITS))?,
            ac: Ac::from_bits(field(word, Self::AC_SHIFT, Ac::NUM_BITS)),
            signal: Signal::from_u16(field(word, Signal::SHIFT, Signal::NUM_BITS))?,
            device: (word as u8) & DEVICE_MASK,
        }))
    }
}

impl fmt::Display for IoIns {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.select() {
            IoSelect::Test(test) => {
                write!(f, "SKP{}{} {:02o}", format!("{test:?}").to_uppercase(), self.signal, self.device)
            },
            IoSelect::Ac(_) if self.is_halt() => write!(f, "HALT"),
            IoSelect::Ac(ac) => {
                let name = format!("{:?}", self.func).to_uppercase();
                if self.func == IoFunc::Nio {
                    write!(f, "{name}{} {:02o}", self.signal, self.device)
                } else {
                    write!(f, "{name}{} {ac}, {:02o}", self.signal, self.device)
                }
            },
        }
    }
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant, Unwrap)]
pub enum Ins {
    Io(IoIns),
    Operate(OperateIns),
    Mrf(MrfIns),
}

impl Ins {
    delegate! {
        to match self {
            Ins::Io(x) => x,
            Ins::Operate(x) => x,
            Ins::Mrf(x) => x,
        } {
            pub fn encode(&self) -> u16;
            pub fn fmt_with_pc(&self, f: &mut fmt::Formatter, pc: u16) -> fmt::Result;
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Ins::Io(_) => Format::Io,
            Ins::Operate(_) => Format::Operate,
            Ins::Mrf(_) => Format::Mrf,
        }
    }

    pub fn display_with_pc(&self, pc: u16) -> InsWithPc<'_> {
        InsWithPc(self, pc)
    }

    // None only for a memory reference word whose opcode class is unassigned.
    pub fn decode(word: u16) -> Option<Ins> {
        match Format::classify(word) {
            Format::Io => IoIns::decode(word),
            Format::Operate => OperateIns::decode(word),
            Format::Mrf => MrfIns::decode(word),
        }
    }
}

impl fmt::Display for Ins {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ins::Io(ins) => write!(f, "{ins}"),
            Ins::Operate(ins) => write!(f, "{ins}"),
            Ins::Mrf(ins) => write!(f, "{ins}"),
        }
    }
}

// Just for formatting, like Path::Display()
pub struct InsWithPc<'a>(&'a Ins, u16);

impl fmt::Display for InsWithPc<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt_with_pc(f, self.1)
    }
}
