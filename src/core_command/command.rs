use crate::constants::{GET_COMMAND, LIST_COMMAND};
use crate::core_command::error::CommandError;
use crate::helpers::sanitize_input;
use crate::session::TransferKind;

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ClientCommand {
    List,
    Get(String),
}

impl ClientCommand {
    /// Parses an operator line such as `-l` or `-g notes.txt`.
    pub fn parse(line: &str) -> Result<ClientCommand, CommandError> {
        let trimmed = line.trim();
        let parts: Vec<&str> = trimmed.split_whitespace().collect();

        match parts.as_slice() {
            [verb] if *verb == LIST_COMMAND => Ok(ClientCommand::List),
            [verb, filename] if *verb == GET_COMMAND && sanitize_input(filename).is_some() => {
                Ok(ClientCommand::Get(filename.to_string()))
            }
            _ => Err(CommandError::Invalid(trimmed.to_string())),
        }
    }

    /// Literal text transmitted on the control connection.
    pub fn wire_text(&self) -> String {
        match self {
            ClientCommand::List => LIST_COMMAND.to_string(),
            ClientCommand::Get(filename) => format!("{} {}", GET_COMMAND, filename),
        }
    }

    pub fn transfer_kind(&self) -> TransferKind {
        match self {
            ClientCommand::List => TransferKind::List,
            ClientCommand::Get(filename) => TransferKind::Get(filename.clone()),
        }
    }
}
