// Sentinel framing and payload sinks for the data connection
pub mod frame;
pub mod receive;
pub mod sink;

pub use receive::{receive_framed, ReceiveOutcome};
pub use sink::{ConsoleSink, FileSink, TransferSink};
