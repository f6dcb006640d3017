
use common::constants::{DEV_TTI, DEV_TTO};
use crate::io::{Device, IoOp, IoOpKind, IoResult};

use std::io::{stdout, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::collections::VecDeque;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::error;

pub trait Tty: Send + Sync {
    fn handle_output(&self, val: u8);

    fn input_available(&self) -> bool;
    fn poll_input(&self) -> Option<u8>;
    fn clear_input(&self);
}

////////////////////////////////////////////////////////////////////////////////

// Console. Keys are read through crossterm, so input is only seen once the
// terminal delivers it.
#[derive(Default)]
pub struct StdIo {
    pending: Mutex<VecDeque<u8>>,
}

impl StdIo {
    fn pending(&self) -> std::sync::MutexGuard<'_, VecDeque<u8>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fill(&self) {
        while matches!(event::poll(Duration::ZERO), Ok(true)) {
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let byte = match key.code {
                KeyCode::Char(c) if c.is_ascii() => c as u8,
                KeyCode::Enter => b'\r',
                KeyCode::Backspace => 0o177,
                KeyCode::Tab => b'\t',
                KeyCode::Esc => 0o33,
                _ => continue,
            };
            self.pending().push_back(byte);
        }
    }
}

impl Tty for StdIo {
    fn handle_output(&self, val: u8) {
        let mut out = stdout().lock();
        if let Err(e) = out.write_all(&[val]).and_then(|_| out.flush()) {
            error!("Teletype: couldn't write to stdout: {e}");
        }
    }

    fn input_available(&self) -> bool {
        self.fill();
        !self.pending().is_empty()
    }

    fn poll_input(&self) -> Option<u8> {
        self.fill();
        self.pending().pop_front()
    }

    fn clear_input(&self) {
        self.fill();
        self.pending().clear();
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Default)]
pub struct PipeTty {
    out_buf: Mutex<VecDeque<u8>>,
    in_buf: Mutex<VecDeque<u8>>,
}

impl PipeTty {
    fn out_buf(&self) -> std::sync::MutexGuard<'_, VecDeque<u8>> {
        self.out_buf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_buf(&self) -> std::sync::MutexGuard<'_, VecDeque<u8>> {
        self.in_buf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn take_output(&self) -> VecDeque<u8> {
        std::mem::take(&mut self.out_buf())
    }

    pub fn is_out_empty(&self) -> bool {
        self.out_buf().is_empty()
    }

    pub fn pop_output(&self) -> Option<u8> {
        self.out_buf().pop_front()
    }

    pub fn push_input(&self, val: u8) {
        self.in_buf().push_back(val);
    }

    pub fn write_input(&self, vals: &[u8]) {
        self.in_buf().extend(vals.iter().copied());
    }

    pub fn pending_input(&self) -> usize {
        self.in_buf().len()
    }
}

impl Tty for PipeTty {
    fn handle_output(&self, val: u8) {
        self.out_buf().push_back(val);
    }

    fn input_available(&self) -> bool {
        !self.in_buf().is_empty()
    }

    fn poll_input(&self) -> Option<u8> {
        self.in_buf().pop_front()
    }

    fn clear_input(&self) {
        self.in_buf().clear();
    }
}


////////////////////////////////////////////////////////////////////////////////

// Keyboard side of the console. Never busy; done while input is queued.
pub struct TeletypeIn {
    code: u8,
    device: Arc<dyn Tty>,
}

impl TeletypeIn {
    pub fn new(device: Arc<dyn Tty>) -> Self {
        Self::with_code(device, DEV_TTI)
    }

    pub fn with_code(device: Arc<dyn Tty>, code: u8) -> Self {
        TeletypeIn { code, device }
    }
}

impl Device for TeletypeIn {
    fn device_code(&self) -> u8 {
        self.code
    }

    fn execute_io(&mut self, op: &IoOp, ac: &mut u16) -> IoResult {
        match op.kind {
            IoOpKind::Dia | IoOpKind::Dib | IoOpKind::Dic => {
                *ac = self.device.poll_input().unwrap_or(0) as u16;
                IoResult::HANDLED
            },
            IoOpKind::Nio => {
                if op.clear {
                    self.device.clear_input();
                }
                IoResult::HANDLED
            },
            _ => IoResult::busy_done(op, false, self.device.input_available())
                .unwrap_or(IoResult::UNHANDLED),
        }
    }
}


// Printer side. Output completes inside the transaction, so outside of it the
// device reads idle and done.
pub struct TeletypeOut {
    code: u8,
    device: Arc<dyn Tty>,
    busy: bool,
    done: bool,
}

impl TeletypeOut {
    pub fn new(device: Arc<dyn Tty>) -> Self {
        Self::with_code(device, DEV_TTO)
    }

    pub fn with_code(device: Arc<dyn Tty>, code: u8) -> Self {
        TeletypeOut { code, device, busy: false, done: true }
    }

    fn write(&mut self, val: u8) {
        self.busy = true;
        self.done = false;
        self.device.handle_output(val);
        self.busy = false;
        self.done = true;
    }
}

impl Device for TeletypeOut {
    fn device_code(&self) -> u8 {
        self.code
    }

    fn execute_io(&mut self, op: &IoOp, ac: &mut u16) -> IoResult {
        match op.kind {
            IoOpKind::Doa | IoOpKind::Dob | IoOpKind::Doc => {
                self.write(*ac as u8);
                IoResult::HANDLED
            },
            IoOpKind::Nio => {
                if op.clear {
                    self.busy = false;
                    self.done = true;
                }
                IoResult::HANDLED
            },
            _ => IoResult::busy_done(op, self.busy, self.done).unwrap_or(IoResult::UNHANDLED),
        }
    }
}

// Both halves of one console, sharing a Tty.
pub fn console(device: Arc<dyn Tty>) -> (TeletypeIn, TeletypeOut) {
    (TeletypeIn::new(device.clone()), TeletypeOut::new(device))
}
