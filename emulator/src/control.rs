use std::sync::mpsc::{channel, Receiver, Sender};

use log::debug;


// State changes requested from outside the stepping thread. They're applied by
// the emulator before its next fetch, never concurrently with a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Halt(String),
    Reset(u16),
    Resume,
}

#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<ControlRequest>,
}

impl ControlHandle {
    pub fn halt(&self, reason: impl Into<String>) {
        self.send(ControlRequest::Halt(reason.into()));
    }

    pub fn reset(&self, start: u16) {
        self.send(ControlRequest::Reset(start));
    }

    pub fn resume(&self) {
        self.send(ControlRequest::Resume);
    }

    pub fn send(&self, req: ControlRequest) {
        // Nobody left to halt once the emulator is gone.
        if self.tx.send(req).is_err() {
            debug!("Control: emulator dropped, request ignored");
        }
    }
}

pub(crate) fn control_channel() -> (ControlHandle, Receiver<ControlRequest>) {
    let (tx, rx) = channel();
    (ControlHandle { tx }, rx)
}
