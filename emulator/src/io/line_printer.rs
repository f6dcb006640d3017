
use common::constants::DEV_LPT;
use crate::io::{Device, IoOp, IoOpKind, IoResult};

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::collections::VecDeque;
use std::sync::Arc;

use log::{error, trace};

pub trait Printer: Send + Sync {
    fn write(&self, val: u8);
}

// Appends every byte to a file, creating it and its directory as needed.
pub struct FilePrinter {
    path: PathBuf,
}

impl FilePrinter {
    pub const DEFAULT_PATH: &'static str = "./media/print.out";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePrinter { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, val: u8) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&[val])
    }
}

impl Default for FilePrinter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

impl Printer for FilePrinter {
    fn write(&self, val: u8) {
        if let Err(e) = self.append(val) {
            error!("LinePrinter: couldn't append to {}: {e}", self.path.display());
        }
    }
}


#[derive(Default)]
pub struct PipePrinter {
    buf: Mutex<VecDeque<u8>>,
}

impl Printer for PipePrinter {
    fn write(&self, val: u8) {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).push_back(val);
    }
}

impl PipePrinter {
    pub fn take(&self) -> VecDeque<u8> {
        std::mem::take(&mut self.buf.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

////////////////////////////////////////////////////////////////////////////////

pub struct LinePrinter {
    code: u8,
    device: Arc<dyn Printer>,
    busy: bool,
    done: bool,
}

impl Default for LinePrinter {
    fn default() -> Self {
        LinePrinter::new(Arc::new(FilePrinter::default()))
    }
}

impl LinePrinter {
    pub fn new(printer: Arc<dyn Printer>) -> Self {
        Self::with_code(printer, DEV_LPT)
    }

    pub fn with_code(printer: Arc<dyn Printer>, code: u8) -> Self {
        LinePrinter {
            code,
            device: printer,
            busy: false,
            done: true,
        }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FilePrinter::new(path)))
    }

    fn print(&mut self, val: u8) {
        trace!("LinePrinter: {val:#o}");
        self.busy = true;
        self.done = false;
        self.device.write(val);
        self.busy = false;
        self.done = true;
    }
}

impl Device for LinePrinter {
    fn device_code(&self) -> u8 {
        self.code
    }

    fn execute_io(&mut self, op: &IoOp, ac: &mut u16) -> IoResult {
        match op.kind {
            IoOpKind::Doa | IoOpKind::Dob | IoOpKind::Doc => {
                self.print(*ac as u8);
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
