pub mod capture;
pub mod input;
pub mod packet;

pub use capture::{FrameReceiver, LiveCapture};
pub use input::{CaptureInput, LinkType, StaticInput};
pub use packet::Packet;
