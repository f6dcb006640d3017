use common::asm::*;
use common::constants::{ADDR_MASK, AUTO_DEC, AUTO_INC};
use emu_lib::emulator::{add_with_carry, sub_with_borrow};
use emu_lib::Emulator;

use std::time::Duration;

use proptest::prelude::*;

use crate::{load, ORIGIN};

fn any_ac() -> impl Strategy<Value = Ac> {
    (0u16..4).prop_map(Ac::from_bits)
}

fn any_mode() -> impl Strategy<Value = AddrMode> {
    prop_oneof![
        Just(AddrMode::Zero),
        Just(AddrMode::Rel),
        Just(AddrMode::Ac2),
        Just(AddrMode::Ac3),
    ]
}

fn step_operate(ins: OperateIns, src: u16, dst: u16, carry: bool) -> Emulator {
    let mut emu = load(&[Ins::Operate(ins)], ORIGIN);
    emu.ac_write(ins.src, src);
    emu.ac_write(ins.dst, dst);
    emu.set_carry(carry);
    emu.step();
    emu
}

proptest! {
    #[test]
    fn adc_matches_wide_sum(dst: u16, src: u16, cin: bool) {
        let emu = step_operate(OperateIns::new(AluFunc::Adc, Ac::Ac1, Ac::Ac0), src, dst, cin);
        let sum = dst as u32 + src as u32 + cin as u32;
        prop_assert_eq!(emu.ac_read(Ac::Ac0), (sum % 0x10000) as u16);
        prop_assert_eq!(emu.carry(), sum >= 0x10000);
        prop_assert_eq!(add_with_carry(dst, src, cin), ((sum % 0x10000) as u16, sum >= 0x10000));
    }

    #[test]
    fn sub_matches_wide_difference(dst: u16, src: u16, bin: bool) {
        let emu = step_operate(OperateIns::new(AluFunc::Sub, Ac::Ac2, Ac::Ac3), src, dst, bin);
        let diff = dst as i32 - src as i32 - bin as i32;
        prop_assert_eq!(emu.ac_read(Ac::Ac3), diff.rem_euclid(0x10000) as u16);
        prop_assert_eq!(emu.carry(), diff < 0);
        prop_assert_eq!(sub_with_borrow(dst, src, bin).1, diff < 0);
    }

    #[test]
    fn szr_sees_result_despite_no_load(
        func in 0u16..8, src: u16, dst: u16, carry: bool, no_load: bool,
        src_ac in any_ac(), dst_ac in any_ac(),
    ) {
        let func = match func {
            0 => AluFunc::Com, 1 => AluFunc::Neg, 2 => AluFunc::Mov, 3 => AluFunc::Inc,
            4 => AluFunc::Adc, 5 => AluFunc::Sub, 6 => AluFunc::Add, _ => AluFunc::And,
        };
        let base = OperateIns::new(func, src_ac, dst_ac).with_skip(SkipCond::Szr);
        let loaded = step_operate(base, src, dst, carry);
        let result = loaded.ac_read(dst_ac);

        let ins = if no_load { base.no_load() } else { base };
        let emu = step_operate(ins, src, dst, carry);
        let skipped = emu.pc() == ORIGIN + 2;
        prop_assert_eq!(skipped, result == 0);
        prop_assert_eq!(emu.carry(), loaded.carry());
        if no_load {
            prop_assert_eq!(emu.ac_read(dst_ac), dst);
        }
    }

    #[test]
    fn effective_address_in_range(
        mode in any_mode(), disp: u8, indirect: bool,
        ac2: u16, ac3: u16, pc in 0u16..0o100000, ptr: u16,
    ) {
        let mut emu = Emulator::new();
        emu.set_slow_read_delay(Duration::ZERO);
        emu.ac_write(Ac::Ac2, ac2);
        emu.ac_write(Ac::Ac3, ac3);
        // Every pointer word indirection could land on.
        for addr in 0..=ADDR_MASK {
            emu.mem_write(addr, ptr);
        }

        let operand = Operand { indirect, mode, disp };
        let ea = emu.resolve_operand(&operand, pc);
        prop_assert!(ea < 0o100000);
    }

    #[test]
    fn auto_index_bumps_by_one(slot in 0u16..16, ptr: u16) {
        let addr = 0o20 + slot;
        let mut emu = Emulator::new();
        emu.mem_write(addr, ptr);
        let ea = emu.resolve_operand(&Operand::zero(addr as u8).deferred(), 0);

        let bumped = if AUTO_INC.contains(&addr) {
            ptr.wrapping_add(1)
        } else {
            prop_assert!(AUTO_DEC.contains(&addr));
            ptr.wrapping_sub(1)
        };
        prop_assert_eq!(emu.mem_read(addr), bumped);
        prop_assert_eq!(ea, bumped & ADDR_MASK);
    }

    #[test]
    fn every_word_steps(word: u16) {
        // Anything at all executes without panicking, and the PC stays in range.
        let mut emu = Emulator::new();
        emu.set_slow_read_delay(Duration::ZERO);
        emu.mem_write(ORIGIN, word);
        emu.set_pc(ORIGIN);
        let step = emu.step();
        prop_assert_eq!(step.ins, word);
        prop_assert_eq!(step.addr, ORIGIN);
        prop_assert!(emu.pc() < 0o100000);
    }
}
