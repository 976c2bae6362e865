// Commands the client can send over the control connection
pub mod command;
pub mod error;

pub use command::ClientCommand;
pub use error::CommandError;
