use crate::constants::END_DATA_MESSAGE;
use crate::core_error::ClientError;
use crate::core_transfer::frame::{Frame, SentinelScanner};
use crate::core_transfer::sink::TransferSink;
use crate::helpers::send_response;
use crate::session::ShutdownFlags;
use log::{debug, trace};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Marker seen and echoed back. Carries the payload length.
    Completed(u64),
    /// The session shut down before the marker arrived.
    Cancelled,
}

/// Reads one sentinel-framed payload from `stream` into `sink`, then echoes
/// the end-of-data marker back to the peer.
///
/// Every read is bounded by `idle_timeout`. A peer closing the connection
/// before the marker is an `UnexpectedEof` I/O error.
pub async fn receive_framed<S, T>(
    stream: &mut S,
    sink: &mut T,
    shutdown: &ShutdownFlags,
    buffer_size: usize,
    idle_timeout: Duration,
) -> Result<ReceiveOutcome, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: TransferSink,
{
    let mut scanner = SentinelScanner::new(END_DATA_MESSAGE);
    let mut buffer = vec![0; buffer_size];

    loop {
        let n = tokio::select! {
            read = tokio::time::timeout(idle_timeout, stream.read(&mut buffer)) => match read {
                Ok(result) => result?,
                Err(_) => return Err(ClientError::Timeout(idle_timeout)),
            },
            _ = shutdown.wait() => {
                debug!("Transfer cancelled by shutdown");
                return Ok(ReceiveOutcome::Cancelled);
            }
        };

        if n == 0 {
            return Err(ClientError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "data connection closed before end of data",
            )));
        }
        trace!("Received {} bytes on data connection", n);

        match scanner.push(&buffer[..n]) {
            Frame::Partial(bytes) => {
                if !bytes.is_empty() {
                    sink.write_payload(&bytes).await?;
                }
            }
            Frame::Complete(bytes) => {
                if !bytes.is_empty() {
                    sink.write_payload(&bytes).await?;
                }
                sink.finish().await?;
                send_response(stream, END_DATA_MESSAGE).await?;
                debug!("End of data acknowledged after {} bytes", scanner.payload_len());
                return Ok(ReceiveOutcome::Completed(scanner.payload_len()));
            }
        }
    }
}
