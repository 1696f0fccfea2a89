pub mod frame;
pub mod types;

pub use frame::{DONE_MARKER, FrameError, StreamFrame};
pub use types::*;
