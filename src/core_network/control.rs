use crate::constants::{
    ERROR_BAD_FILENAME, ERROR_INVALID_COMMAND, IN_BUFFER_SIZE, SERVER_KILL_MESSAGE, SHELL_PROMPT,
};
use crate::core_command::ClientCommand;
use crate::core_error::ClientError;
use crate::core_transfer::frame::find_subsequence;
use crate::helpers::{report_error, report_warning, send_response};
use crate::session::SessionState;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A status message the server sent over the control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Kill,
    BadFilename,
    InvalidCommand,
    Other(String),
}

const STATUS_TOKENS: [&str; 3] = [ERROR_BAD_FILENAME, ERROR_INVALID_COMMAND, SERVER_KILL_MESSAGE];

/// Splits the control byte stream into status messages.
///
/// A read can end in the middle of a sentinel, so a chunk tail that could
/// still grow into one is held back and joined with the next read. An empty
/// chunk or one made only of NUL bytes means the server went away.
#[derive(Debug, Default)]
pub struct StatusScanner {
    carry: Vec<u8>,
}

impl StatusScanner {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StatusMessage> {
        if chunk.iter().all(|b| *b == 0) {
            self.carry.clear();
            return vec![StatusMessage::Kill];
        }

        let mut buffer = std::mem::take(&mut self.carry);
        buffer.extend_from_slice(chunk);

        // Servers may write several sentinels back to back.
        let mut messages = Vec::new();
        let mut other = Vec::new();
        let mut rest = buffer.as_slice();
        while let Some((pos, token)) = next_token(rest) {
            other.extend_from_slice(&rest[..pos]);
            messages.push(token_message(token));
            rest = &rest[pos + token.len()..];
        }

        let keep = partial_token_len(rest);
        let split = rest.len() - keep;
        other.extend_from_slice(&rest[..split]);
        self.carry = rest[split..].to_vec();

        let text = String::from_utf8_lossy(&other);
        let text = text.trim_matches('\0');
        if !text.is_empty() {
            messages.push(StatusMessage::Other(text.to_string()));
        }
        messages
    }
}

fn token_message(token: &str) -> StatusMessage {
    match token {
        ERROR_BAD_FILENAME => StatusMessage::BadFilename,
        ERROR_INVALID_COMMAND => StatusMessage::InvalidCommand,
        _ => StatusMessage::Kill,
    }
}

/// Earliest sentinel in `text`, with its offset.
fn next_token(text: &[u8]) -> Option<(usize, &'static str)> {
    STATUS_TOKENS
        .iter()
        .filter_map(|token| find_subsequence(text, token.as_bytes()).map(|pos| (pos, *token)))
        .min_by_key(|(pos, _)| *pos)
}

/// Length of the longest suffix of `text` that starts some sentinel.
fn partial_token_len(text: &[u8]) -> usize {
    let longest = STATUS_TOKENS.iter().map(|token| token.len()).max().unwrap_or(0);
    let max = longest.saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&n| {
            let tail = &text[text.len() - n..];
            STATUS_TOKENS.iter().any(|token| token.as_bytes().starts_with(tail))
        })
        .unwrap_or(0)
}

/// Owns the control connection for the whole session.
pub struct ControlChannel {
    stream: TcpStream,
    state: Arc<SessionState>,
    status: StatusScanner,
}

impl ControlChannel {
    pub fn new(stream: TcpStream, state: Arc<SessionState>) -> Self {
        Self {
            stream,
            state,
            status: StatusScanner::default(),
        }
    }

    /// Marks the transfer as pending, then sends the command text.
    pub async fn dispatch(&mut self, command: &ClientCommand) -> Result<(), ClientError> {
        self.state.begin_transfer(command.transfer_kind())?;
        let text = command.wire_text();
        info!("Sending command: {}", text);
        send_response(&mut self.stream, text.as_bytes()).await?;
        Ok(())
    }

    /// Applies one chunk read from the control connection to the session state.
    pub fn apply_status(&mut self, chunk: &[u8]) {
        for message in self.status.push(chunk) {
            match message {
                StatusMessage::Kill => {
                    println!("Kill message received from server");
                    self.state.shutdown.set_server_disconnect();
                }
                StatusMessage::BadFilename => {
                    println!("Server failed to locate file");
                    if let Some(removed) = self.state.mark_bad_filename() {
                        debug!("Dropped empty download {}", removed.display());
                    }
                }
                StatusMessage::InvalidCommand => {
                    report_warning("Server rejected the command as invalid");
                }
                StatusMessage::Other(text) => {
                    debug!("Ignoring status message from server: {}", text);
                }
            }
        }
    }

    fn on_readable(&mut self, read: std::io::Result<usize>, buffer: &[u8]) {
        match read {
            Ok(n) => self.apply_status(&buffer[..n]),
            Err(e) => {
                warn!("Control connection read failed: {}", e);
                self.state.shutdown.set_server_disconnect();
            }
        }
    }

    /// Interactive loop: reads operator commands from `input` and status
    /// messages from the server until the session shuts down.
    pub async fn run_shell<R>(&mut self, input: R) -> Result<(), ClientError>
    where
        R: AsyncBufRead + Unpin,
    {
        let state = Arc::clone(&self.state);
        let mut lines = input.lines();
        let mut buffer = vec![0; IN_BUFFER_SIZE];
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        println!("{}", SHELL_PROMPT);
        while !state.shutdown.is_shutdown() {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        self.handle_operator_line(&line).await?;
                        println!("{}", SHELL_PROMPT);
                    }
                    None => {
                        debug!("Operator input closed");
                        state.shutdown.set_kill_received();
                    }
                },
                read = self.stream.read(&mut buffer) => self.on_readable(read, &buffer),
                _ = &mut ctrl_c => {
                    info!("Interrupt received, shutting down");
                    state.shutdown.set_kill_received();
                }
                _ = state.shutdown.wait() => {}
            }
        }
        Ok(())
    }

    async fn handle_operator_line(&mut self, line: &str) -> Result<(), ClientError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let command = match ClientCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                report_error(&ClientError::from(e).to_operator_message());
                return Ok(());
            }
        };
        match self.dispatch(&command).await {
            Err(ClientError::Command(e)) => {
                report_error(&ClientError::from(e).to_operator_message());
                Ok(())
            }
            other => other,
        }
    }

    /// Single-shot mode: sends `command` and waits for its transfer to finish.
    ///
    /// Once the transfer completes, the control connection gets one more
    /// short read (`settle`) so a trailing status message still applies.
    pub async fn run_single(
        &mut self,
        command: ClientCommand,
        settle: Duration,
    ) -> Result<(), ClientError> {
        let state = Arc::clone(&self.state);
        let mut buffer = vec![0; IN_BUFFER_SIZE];
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        self.dispatch(&command).await?;

        while !state.shutdown.is_shutdown() && state.is_pending() {
            tokio::select! {
                read = self.stream.read(&mut buffer) => self.on_readable(read, &buffer),
                _ = state.transfer_done() => {}
                _ = &mut ctrl_c => {
                    info!("Interrupt received, shutting down");
                    state.shutdown.set_kill_received();
                }
                _ = state.shutdown.wait() => {}
            }
        }

        if !state.shutdown.server_disconnect() {
            if let Ok(read) = tokio::time::timeout(settle, self.stream.read(&mut buffer)).await {
                match read {
                    // The server closing after the transfer is the normal end here.
                    Ok(0) => debug!("Server closed the control connection"),
                    other => self.on_readable(other, &buffer),
                }
            }
        }
        Ok(())
    }

    /// Closes the control connection.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Control connection shutdown: {}", e);
        }
    }
}
