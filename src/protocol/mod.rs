pub mod framing;

pub use framing::{LineAccumulator, LineEvent};
