use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0} is not a valid command")]
    Invalid(String),

    #[error("A transfer is already in progress, wait for it to complete")]
    TransferInProgress,
}
