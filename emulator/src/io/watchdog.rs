use common::constants::DEV_WDT;
use crate::control::ControlHandle;
use crate::io::{Device, IoOp, IoOpKind, IoResult};

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use log::{debug, error, info};


#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum WatchdogAction {
    None = 0,
    Interrupt,
    Halt,
    Reset,
}

impl WatchdogAction {
    fn from_bits(bits: u16) -> Self {
        Self::from_u16(bits & 0x3).unwrap_or(WatchdogAction::None)
    }

    fn bits(self) -> u16 {
        self.to_u16().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogStatus {
    pub host_enabled: bool,
    pub enabled: bool,
    pub active: bool,
    pub fired: bool,
    pub repeat: bool,
    pub action: WatchdogAction,
    pub timeout_ms: u16,
    pub device_code: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    pub code: u8,
    pub timeout_ms: u32,
    pub repeat: bool,
    pub action: WatchdogAction,
    pub host_enabled: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfig {
            code: DEV_WDT,
            timeout_ms: 5000,
            repeat: false,
            action: WatchdogAction::Interrupt,
            host_enabled: false,
        }
    }
}

fn clamp_timeout(ms: u32) -> u16 {
    ms.min(u16::MAX as u32) as u16
}


enum TimerCmd {
    Arm(Duration),
    Cancel,
    Stop,
}

// Everything behind the lock. The timer thread and the bus both go through it.
struct WatchdogState {
    defaults: WatchdogConfig,
    timer: Sender<TimerCmd>,

    host_enabled: bool,
    enabled: bool,
    repeat: bool,
    action: WatchdogAction,
    active: bool,
    fired: bool,
    timeout_ms: u16,
}

impl WatchdogState {
    // Control word
    const CTL_ENABLE: u16 = 0x1;
    const CTL_REPEAT: u16 = 0x2;
    const CTL_ACTION_SHIFT: u16 = 2;
    const CTL_PET: u16 = 0x10;
    const CTL_CLEAR_FIRED: u16 = 0x20;

    // Status word
    const STS_FIRED: u16 = 0x1;
    const STS_ACTIVE: u16 = 0x2;
    const STS_REPEAT: u16 = 0x4;
    const STS_ACTION_SHIFT: u16 = 3;

    fn new(defaults: WatchdogConfig, timer: Sender<TimerCmd>) -> Self {
        WatchdogState {
            defaults,
            timer,
            host_enabled: defaults.host_enabled,
            enabled: false,
            repeat: defaults.repeat,
            action: defaults.action,
            active: false,
            fired: false,
            timeout_ms: clamp_timeout(defaults.timeout_ms),
        }
    }

    fn send(&self, cmd: TimerCmd) {
        if self.timer.send(cmd).is_err() {
            error!("Watchdog: timer thread is gone");
        }
    }

    fn schedule(&self) {
        self.send(TimerCmd::Arm(Duration::from_millis(self.timeout_ms as u64)));
    }

    fn cancel(&self) {
        self.send(TimerCmd::Cancel);
    }

    fn arm(&mut self) {
        if !self.host_enabled || !self.enabled || self.timeout_ms == 0 {
            return;
        }
        self.active = true;
        self.schedule();
    }

    fn clear(&mut self) {
        self.active = false;
        self.fired = false;
        self.cancel();
    }

    fn disable(&mut self) {
        self.active = false;
        self.cancel();
    }

    fn set_timeout(&mut self, ms: u32) {
        self.timeout_ms = clamp_timeout(ms);
        if self.active && self.enabled {
            self.schedule();
        }
    }

    // Marks the fire and rearms when repeating. Returns what to do about it.
    fn fire(&mut self) -> WatchdogAction {
        self.fired = true;
        self.active = false;
        if self.repeat && self.enabled && self.timeout_ms > 0 && self.host_enabled {
            self.active = true;
            self.schedule();
        } else {
            self.cancel();
        }
        self.action
    }

    // Timer expiry. Stale expiries, after a clear or disable, do nothing.
    fn expire(&mut self) -> Option<WatchdogAction> {
        if !self.active || !self.host_enabled || !self.enabled {
            return None;
        }
        Some(self.fire())
    }

    fn apply_control(&mut self, val: u16) {
        let enable = val & Self::CTL_ENABLE != 0;
        self.repeat = val & Self::CTL_REPEAT != 0;
        self.action = WatchdogAction::from_bits(val >> Self::CTL_ACTION_SHIFT);
        self.enabled = enable;

        if !enable {
            self.disable();
        }
        if val & Self::CTL_CLEAR_FIRED != 0 {
            self.fired = false;
        }
        if val & Self::CTL_PET != 0 && enable {
            self.arm();
        }
    }

    fn control_word(&self) -> u16 {
        (self.enabled as u16 * Self::CTL_ENABLE)
            | (self.repeat as u16 * Self::CTL_REPEAT)
            | (self.action.bits() << Self::CTL_ACTION_SHIFT)
    }

    fn status_word(&self) -> u16 {
        (self.fired as u16 * Self::STS_FIRED)
            | (self.active as u16 * Self::STS_ACTIVE)
            | (self.repeat as u16 * Self::STS_REPEAT)
            | (self.action.bits() << Self::STS_ACTION_SHIFT)
    }

    fn restore_defaults(&mut self) {
        self.enabled = false;
        self.active = false;
        self.fired = false;
        self.repeat = self.defaults.repeat;
        self.action = self.defaults.action;
        self.timeout_ms = clamp_timeout(self.defaults.timeout_ms);
        self.cancel();
    }
}


fn lock(state: &Mutex<WatchdogState>) -> MutexGuard<'_, WatchdogState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn perform(control: &ControlHandle, action: WatchdogAction) {
    info!("Watchdog: fired, {action:?}");
    match action {
        WatchdogAction::None => (),
        // No interrupt system to deliver to.
        WatchdogAction::Interrupt => debug!("Watchdog: interrupt dropped"),
        WatchdogAction::Halt => control.halt("Watchdog"),
        WatchdogAction::Reset => control.reset(0),
    }
}

fn run_timer(rx: Receiver<TimerCmd>, state: Arc<Mutex<WatchdogState>>, control: ControlHandle) {
    let mut deadline: Option<Instant> = None;
    loop {
        let cmd = match deadline {
            Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                Ok(cmd) => cmd,
                Err(RecvTimeoutError::Timeout) => {
                    deadline = None;
                    let action = lock(&state).expire();
                    if let Some(action) = action {
                        perform(&control, action);
                    }
                    continue;
                },
                Err(RecvTimeoutError::Disconnected) => return,
            },
            None => match rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => return,
            },
        };
        match cmd {
            TimerCmd::Arm(after) => deadline = Some(Instant::now() + after),
            TimerCmd::Cancel => deadline = None,
            TimerCmd::Stop => return,
        }
    }
}


// One-shot or repeating timer that halts or resets the CPU when the program
// stops petting it. Ignores the bus entirely until the host enables it.
pub struct Watchdog {
    code: u8,
    state: Arc<Mutex<WatchdogState>>,
    control: ControlHandle,
    timer: Sender<TimerCmd>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn new(control: ControlHandle) -> Self {
        Self::with_config(control, WatchdogConfig::default())
    }

    pub fn with_config(control: ControlHandle, config: WatchdogConfig) -> Self {
        let (tx, rx) = channel();
        let state = Arc::new(Mutex::new(WatchdogState::new(config, tx.clone())));
        let thread = {
            let state = state.clone();
            let control = control.clone();
            thread::spawn(move || run_timer(rx, state, control))
        };
        Watchdog {
            code: config.code,
            state,
            control,
            timer: tx,
            thread: Some(thread),
        }
    }

    pub fn status(&self) -> WatchdogStatus {
        let state = lock(&self.state);
        WatchdogStatus {
            host_enabled: state.host_enabled,
            enabled: state.enabled,
            active: state.active,
            fired: state.fired,
            repeat: state.repeat,
            action: state.action,
            timeout_ms: state.timeout_ms,
            device_code: self.code,
        }
    }

    pub fn set_host_enabled(&self, enabled: bool) {
        let mut state = lock(&self.state);
        state.host_enabled = enabled;
        if !enabled {
            state.disable();
        }
    }

    pub fn set_timeout_ms(&self, ms: u32) {
        lock(&self.state).set_timeout(ms);
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = lock(&self.state);
        state.enabled = enabled;
        if !enabled {
            state.disable();
        }
    }

    pub fn set_repeat(&self, repeat: bool) {
        lock(&self.state).repeat = repeat;
    }

    pub fn set_action(&self, action: WatchdogAction) {
        lock(&self.state).action = action;
    }

    pub fn arm(&self) {
        lock(&self.state).arm();
    }

    // Restarts the countdown, if there is one to restart.
    pub fn pet(&self) {
        let mut state = lock(&self.state);
        if state.enabled && state.host_enabled {
            state.arm();
        }
    }

    pub fn clear_fired(&self) {
        lock(&self.state).fired = false;
    }

    pub fn clear(&self) {
        lock(&self.state).clear();
    }

    pub fn force_fire(&self) {
        let action = lock(&self.state).fire();
        perform(&self.control, action);
    }

    pub fn reset_device_state(&self) {
        lock(&self.state).restore_defaults();
    }
}

impl Device for Watchdog {
    fn device_code(&self) -> u8 {
        self.code
    }

    fn execute_io(&mut self, op: &IoOp, ac: &mut u16) -> IoResult {
        let mut fired = None;
        {
            let mut state = lock(&self.state);
            if !state.host_enabled {
                return IoResult::UNHANDLED;
            }

            match op.kind {
                IoOpKind::Dia => *ac = state.timeout_ms,
                IoOpKind::Doa => state.set_timeout(*ac as u32),
                IoOpKind::Dib => *ac = state.control_word(),
                IoOpKind::Dob => state.apply_control(*ac),
                IoOpKind::Dic => *ac = state.status_word(),
                IoOpKind::Doc => (),
                IoOpKind::Nio => {
                    if op.clear {
                        state.clear();
                    }
                    if op.pulse {
                        fired = Some(state.fire());
                    }
                    if op.start {
                        state.arm();
                    }
                },
                _ => {
                    let (active, done) = (state.active, state.fired);
                    return IoResult::busy_done(op, active, done).unwrap_or(IoResult::UNHANDLED);
                },
            }
        }

        if let Some(action) = fired {
            perform(&self.control, action);
        }
        IoResult::HANDLED
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        let _ = self.timer.send(TimerCmd::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Watchdog: timer thread panicked");
            }
        }
    }
}
