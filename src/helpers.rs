use colored::Colorize;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Reduces a requested filename to its last path component so the download
/// lands directly inside the download directory.
///
/// Returns `None` when no plain file name is left, as for `..` or `/`.
pub fn sanitize_input(input: &str) -> Option<String> {
    let normalized = input.replace('\\', "/");
    let name = Path::new(&normalized).file_name()?;
    name.to_str().map(str::to_string)
}

/// Writes a full message to the peer.
pub async fn send_response<W>(writer: &mut W, message: &[u8]) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

pub fn report_error(message: &str) {
    eprintln!("{}", message.red());
}

pub fn report_warning(message: &str) {
    eprintln!("{}", message.yellow());
}
