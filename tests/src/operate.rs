use common::asm::*;
use emu_lib::{Emulator, ExecutionStep};

use crate::{load, ORIGIN};

// Runs one operate instruction from the given accumulators and carry.
fn exec(ins: OperateIns, acs: [u16; 4], carry: bool) -> (Emulator, ExecutionStep) {
    let mut emu = load(&[Ins::Operate(ins)], ORIGIN);
    for (ac, val) in Ac::ALL.into_iter().zip(acs) {
        emu.ac_write(ac, val);
    }
    emu.set_carry(carry);
    let step = emu.step();
    (emu, step)
}

fn op(func: AluFunc, src: Ac, dst: Ac) -> OperateIns {
    OperateIns::new(func, src, dst)
}

#[test]
fn com() {
    let (emu, step) = exec(op(AluFunc::Com, Ac::Ac0, Ac::Ac1), [0o17, 0, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac1), 0o177760);
    assert_eq!(emu.ac_read(Ac::Ac0), 0o17);
    assert!(emu.carry());
    assert_eq!(step.desc, "COM AC0, AC1");
    assert_eq!(step.ac, Some(Ac::Ac1));
}

#[test]
fn neg() {
    let (emu, _) = exec(op(AluFunc::Neg, Ac::Ac0, Ac::Ac1), [5, 0, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac1), 0o177773);
    assert!(!emu.carry());

    let (emu, _) = exec(op(AluFunc::Neg, Ac::Ac0, Ac::Ac0), [0, 0, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac0), 0);
    assert!(emu.carry());
}

#[test]
fn neg_adds_carry_in() {
    let (emu, _) = exec(op(AluFunc::Neg, Ac::Ac0, Ac::Ac1), [5, 0, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac1), 0o177774);
    assert!(!emu.carry());

    // -1 plus a forced carry wraps to zero.
    let ins = op(AluFunc::Neg, Ac::Ac0, Ac::Ac1).with_carry(CarryCtl::O);
    let (emu, step) = exec(ins, [1, 0, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac1), 0);
    assert!(emu.carry());
    assert_eq!(step.desc, "NEGO AC0, AC1");

    let ins = op(AluFunc::Neg, Ac::Ac0, Ac::Ac1).with_carry(CarryCtl::Z);
    let (emu, _) = exec(ins, [5, 0, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac1), 0o177773);
}

#[test]
fn mov_takes_carry_control() {
    let ins = op(AluFunc::Mov, Ac::Ac2, Ac::Ac3).with_carry(CarryCtl::O);
    let (emu, step) = exec(ins, [0, 0, 0o1234, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac3), 0o1234);
    assert!(emu.carry());
    assert!(step.carry);
    assert_eq!(step.desc, "MOVO AC2, AC3");

    let ins = op(AluFunc::Mov, Ac::Ac2, Ac::Ac2).with_carry(CarryCtl::C);
    let (emu, _) = exec(ins, [0; 4], true);
    assert!(!emu.carry());

    let ins = op(AluFunc::Mov, Ac::Ac2, Ac::Ac2).with_carry(CarryCtl::Z);
    let (emu, _) = exec(ins, [0; 4], true);
    assert!(!emu.carry());
}

#[test]
fn inc_overflows() {
    let (emu, _) = exec(op(AluFunc::Inc, Ac::Ac1, Ac::Ac1), [0, 0o177777, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac1), 0);
    assert!(emu.carry());
}

#[test]
fn adc_uses_carry_in() {
    let ins = op(AluFunc::Adc, Ac::Ac0, Ac::Ac1).with_carry(CarryCtl::O);
    let (emu, _) = exec(ins, [0, 0o177777, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac1), 0);
    assert!(emu.carry());

    let (emu, _) = exec(op(AluFunc::Adc, Ac::Ac0, Ac::Ac1), [2, 3, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac1), 6);
    assert!(!emu.carry());
}

#[test]
fn add_ignores_carry_in() {
    let (emu, _) = exec(op(AluFunc::Add, Ac::Ac0, Ac::Ac1), [2, 3, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac1), 5);
    assert!(!emu.carry());

    let (emu, _) = exec(op(AluFunc::Add, Ac::Ac0, Ac::Ac1), [0o100000, 0o100001, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac1), 1);
    assert!(emu.carry());
}

#[test]
fn sub_borrows_through_carry() {
    let ins = op(AluFunc::Sub, Ac::Ac1, Ac::Ac0).with_carry(CarryCtl::Z);
    let (emu, _) = exec(ins, [5, 3, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac0), 2);
    assert!(!emu.carry());

    let (emu, _) = exec(op(AluFunc::Sub, Ac::Ac1, Ac::Ac0), [5, 5, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac0), 0o177777);
    assert!(emu.carry());
}

#[test]
fn and_keeps_carry() {
    let (emu, _) = exec(op(AluFunc::And, Ac::Ac0, Ac::Ac1), [0o1414, 0o1700, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac1), 0o1400);
    assert!(emu.carry());
}

#[test]
fn rotate_left_through_carry() {
    let ins = op(AluFunc::Mov, Ac::Ac0, Ac::Ac0).with_shift(Shift::L);
    let (emu, _) = exec(ins, [0o100001, 0, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac0), 0o000003);
    assert!(emu.carry());
}

#[test]
fn rotate_right_through_carry() {
    let ins = op(AluFunc::Mov, Ac::Ac0, Ac::Ac0).with_shift(Shift::R).with_carry(CarryCtl::O);
    let (emu, step) = exec(ins, [0o2, 0, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac0), 0o100001);
    assert!(!emu.carry());
    assert_eq!(step.desc, "MOVOR AC0, AC0");
}

#[test]
fn swap_bytes() {
    let ins = op(AluFunc::Mov, Ac::Ac0, Ac::Ac1).with_shift(Shift::S);
    let (emu, _) = exec(ins, [0x12ab, 0, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac1), 0xab12);
    assert!(emu.carry());
}

#[test]
fn shift_sees_alu_carry() {
    // INC overflows into carry, then the rotate pulls it into bit 0.
    let ins = op(AluFunc::Inc, Ac::Ac0, Ac::Ac0).with_shift(Shift::L);
    let (emu, _) = exec(ins, [0o177777, 0, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac0), 1);
    assert!(!emu.carry());
}

#[test]
fn skip_conditions() {
    let cases = [
        (SkipCond::Never, 0, false, false),
        (SkipCond::Skp, 1, false, true),
        (SkipCond::Szc, 1, false, true),
        (SkipCond::Szc, 1, true, false),
        (SkipCond::Snc, 1, true, true),
        (SkipCond::Szr, 0, true, true),
        (SkipCond::Szr, 1, false, false),
        (SkipCond::Snr, 1, true, true),
        (SkipCond::Sez, 1, false, true),
        (SkipCond::Sez, 0, true, true),
        (SkipCond::Sez, 1, true, false),
        (SkipCond::Sbn, 1, true, true),
        (SkipCond::Sbn, 0, true, false),
    ];
    for (skip, val, carry, taken) in cases {
        let ins = op(AluFunc::Mov, Ac::Ac0, Ac::Ac1).with_skip(skip);
        let (emu, step) = exec(ins, [val, 0, 0, 0], carry);
        assert_eq!(step.branch_taken, taken, "{skip:?} {val} {carry}");
        let pc = if taken { ORIGIN + 2 } else { ORIGIN + 1 };
        assert_eq!(emu.pc(), pc, "{skip:?}");
    }
}

#[test]
fn no_load_still_skips_and_sets_carry() {
    let ins = op(AluFunc::Sub, Ac::Ac1, Ac::Ac0)
        .with_carry(CarryCtl::Z)
        .no_load()
        .with_skip(SkipCond::Szr);
    let (emu, step) = exec(ins, [0o7, 0o7, 0, 0], true);
    assert_eq!(emu.ac_read(Ac::Ac0), 0o7);
    assert!(!emu.carry());
    assert!(step.branch_taken);
    assert_eq!(step.desc, "SUBZ# AC1, AC0 SZR (skip)");
    assert_eq!(step.ac, None);

    let ins = op(AluFunc::Add, Ac::Ac1, Ac::Ac0).no_load().with_skip(SkipCond::Snc);
    let (emu, step) = exec(ins, [0o100000, 0o100000, 0, 0], false);
    assert_eq!(emu.ac_read(Ac::Ac0), 0o100000);
    assert!(emu.carry());
    assert!(step.branch_taken);
}
