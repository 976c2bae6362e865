// Error types shared by the control and data sides of the client

pub mod error;

pub use error::ClientError;
