pub mod bootstrap;
pub mod control;
pub mod data;
pub mod resolve;

pub use bootstrap::establish_control_connection;
pub use control::ControlChannel;
pub use data::{bind_data_listener, DataWorker};
