use common::asm::*;
use common::constants::DEV_WDT;
use common::{io_ins, mrf_ins};
use emu_lib::io::watchdog::{Watchdog, WatchdogAction, WatchdogConfig};
use emu_lib::Emulator;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::{halt, load, ORIGIN};

const ENABLE: u16 = 0x1;
const PET: u16 = 0x10;

fn action_bits(action: WatchdogAction) -> u16 {
    (action as u16) << 2
}

// Steps until halted, giving up after a while of wall time.
fn run_for(emu: &mut Emulator, limit: Duration) {
    let start = Instant::now();
    while !emu.is_halted() {
        assert!(start.elapsed() < limit, "still running at {:06o}", emu.pc());
        emu.step();
    }
}

fn host_enabled(emu: &Emulator) -> Arc<Mutex<Watchdog>> {
    let config = WatchdogConfig { host_enabled: true, ..Default::default() };
    Arc::new(Mutex::new(Watchdog::with_config(emu.control_handle(), config)))
}

#[test]
fn stuck_program_is_halted() {
    let prog = [
        io_ins!(Doa, Ac::Ac0, DEV_WDT),
        io_ins!(Dob, Ac::Ac1, DEV_WDT),
        // Spin on slow memory so the loop takes real time.
        mrf_ins!(Lda(Ac::Ac2), Operand::zero(0o40)),
        mrf_ins!(Jmp, Operand::rel(-1)),
    ];
    let mut emu = load(&prog, ORIGIN);
    let wdt = host_enabled(&emu);
    emu.register_shared(wdt.clone());
    emu.ac_write(Ac::Ac0, 20);
    emu.ac_write(Ac::Ac1, ENABLE | PET | action_bits(WatchdogAction::Halt));

    run_for(&mut emu, Duration::from_secs(10));
    assert_eq!(emu.halt_reason(), Some("Watchdog"));
    assert!((ORIGIN + 2..=ORIGIN + 3).contains(&emu.pc()));

    let status = wdt.lock().unwrap().status();
    assert!(status.fired);
    assert!(!status.active);
    assert_eq!(status.timeout_ms, 20);
}

#[test]
fn status_reads_back() {
    let prog = [
        io_ins!(Dob, Ac::Ac1, DEV_WDT),
        io_ins!(Dic, Ac::Ac2, DEV_WDT),
        Ins::Io(IoIns::skip(SkipTest::Bz, DEV_WDT)),
        halt(),
        halt(),
    ];
    let mut emu = load(&prog, ORIGIN);
    let wdt = host_enabled(&emu);
    emu.register_shared(wdt);
    // Enabled, action reset, not armed.
    emu.ac_write(Ac::Ac1, ENABLE | action_bits(WatchdogAction::Reset));
    run_for(&mut emu, Duration::from_secs(5));

    assert_eq!(emu.ac_read(Ac::Ac2), 3 << 3);
    assert_eq!(emu.pc(), ORIGIN + 5);
}

#[test]
fn ignored_until_host_enables() {
    let mut emu = load(&[io_ins!(Dia, Ac::Ac0, DEV_WDT), halt()], ORIGIN);
    emu.register_device(Watchdog::new(emu.control_handle()));
    emu.ac_write(Ac::Ac0, 0o7);
    let step = emu.step();
    assert!(step.desc.ends_with("(unassigned)"), "{}", step.desc);
    assert_eq!(emu.ac_read(Ac::Ac0), 0o7);
}

#[test]
fn host_disable_at_runtime() {
    let prog = [io_ins!(Dia, Ac::Ac0, DEV_WDT), io_ins!(Dia, Ac::Ac1, DEV_WDT), halt()];
    let mut emu = load(&prog, ORIGIN);
    let wdt = host_enabled(&emu);
    emu.register_shared(wdt.clone());
    emu.ac_write(Ac::Ac1, 0o7);

    let step = emu.step();
    assert_eq!(step.desc, "DIA AC0, 70");
    assert_eq!(emu.ac_read(Ac::Ac0), 5000);

    wdt.lock().unwrap().set_host_enabled(false);
    let step = emu.step();
    assert_eq!(step.desc, "DIA AC1, 70 (unassigned)");
    assert_eq!(emu.ac_read(Ac::Ac1), 0o7);
    assert!(!wdt.lock().unwrap().status().host_enabled);
}

#[test]
fn control_handle_from_another_thread() {
    let mut emu = load(&[mrf_ins!(Jmp, Operand::rel(0))], ORIGIN);
    let handle = emu.control_handle();
    thread::spawn(move || handle.halt("operator")).join().unwrap();

    let step = emu.step();
    assert!(step.halted);
    assert_eq!(step.desc, "CPU halted (operator)");
    assert_eq!(emu.pc(), ORIGIN);

    emu.control_handle().resume();
    assert_eq!(emu.apply_control_requests(), 1);
    assert!(!emu.is_halted());

    emu.control_handle().reset(0o1000);
    emu.control_handle().halt("after reset");
    emu.step();
    assert_eq!(emu.pc(), 0o1000);
    assert_eq!(emu.halt_reason(), Some("after reset"));
    assert_eq!(emu.mem_read(ORIGIN), 0);
}
