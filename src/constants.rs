// src/constants.rs

use std::time::Duration;

// Status sentinels sent by the server over the control connection.
pub const SERVER_KILL_MESSAGE: &str = "@@SERVER_KILL";
pub const ERROR_BAD_FILENAME: &str = "@@ERROR_BAD_FILENAME";
pub const ERROR_INVALID_COMMAND: &str = "@@ERROR_INVALID_COMMAND";

// End-of-payload marker on the data connection, echoed back as the ACK.
pub const END_DATA_MESSAGE: &[u8] = b"@@END_DATA";

// Sent on every freshly accepted data connection.
pub const DATA_GREETING: &[u8] = b"Data connection established!";

pub const LIST_COMMAND: &str = "-l";
pub const GET_COMMAND: &str = "-g";

pub const IN_BUFFER_SIZE: usize = 4096;
pub const ACK_READ_SIZE: usize = 10;

pub const DATA_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const TEARDOWN_GRACE: Duration = Duration::from_millis(1000);
// Pause after a failed accept on the data listener (e.g. out of descriptors).
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);
// Last control read after a single-shot transfer, for a trailing status.
pub const STATUS_SETTLE: Duration = Duration::from_millis(10);

pub const SHELL_PROMPT: &str = "Please enter a command ($ -l or $ -g FILENAME)";

pub const USAGE_LINES: [&str; 3] = [
    "Usage: $ rouilledl {SERVER_HOSTNAME} {SERVER_COMMAND_PORT} {CLIENT_DATA_PORT} -l              # for LIST command",
    "   or  $ rouilledl {SERVER_HOSTNAME} {SERVER_COMMAND_PORT} {CLIENT_DATA_PORT} -g {FILE_NAME}  # for GET command",
    "   or  $ rouilledl {SERVER_HOSTNAME} {SERVER_COMMAND_PORT} {CLIENT_DATA_PORT}                 # for shell mode",
];
