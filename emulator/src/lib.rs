pub mod control;
pub mod emulator;
pub mod emulator_state;
pub mod error;
pub mod io;

pub use control::{ControlHandle, ControlRequest};
pub use emulator::{Emulator, ExecutionStep};
pub use emulator_state::EmulatorState;
pub use error::LoadError;
pub use io::{Device, IoBus, IoOp, IoOpKind, IoResult};
