use crate::core_command::CommandError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to connect to server {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Server closed the connection")]
    PeerDisconnect,

    #[error("Server failed to locate file {0}")]
    BadFilename(String),

    #[error("Client error, duplicate filename {0}")]
    DuplicateFilename(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Data connection idle for more than {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Only a failed bootstrap or a vanished server ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Connect { .. } | ClientError::PeerDisconnect
        )
    }

    /// Message shown on the operator console for absorbed errors.
    pub fn to_operator_message(&self) -> String {
        match self {
            ClientError::DuplicateFilename(name) => format!(
                "Client error, duplicate filename {}. (Discarding data received, please wait)",
                name
            ),
            ClientError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                "Data connection closed before the transfer completed".to_string()
            }
            other => other.to_string(),
        }
    }
}
