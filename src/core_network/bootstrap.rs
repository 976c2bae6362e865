use crate::core_error::ClientError;
use crate::helpers::send_response;
use log::{debug, info};
use std::net::{IpAddr, SocketAddr};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Opens the control connection and announces where the server should
/// connect back for data.
///
/// The data address and the data port are each sent as text and each
/// followed by a bounded read of the server's acknowledgment, whose content
/// is not checked. A failed connect is a `ClientError::Connect`; nothing is
/// retried.
pub async fn establish_control_connection(
    server: SocketAddr,
    data_address: IpAddr,
    data_port: u16,
    ack_read_size: usize,
) -> Result<TcpStream, ClientError> {
    let mut stream = TcpStream::connect(server)
        .await
        .map_err(|source| ClientError::Connect {
            addr: server,
            source,
        })?;
    info!("Control connection established with {}", server);

    let addr_ack = announce(&mut stream, &data_address.to_string(), ack_read_size).await?;
    debug!("Data address acknowledged: {}", addr_ack);

    let port_ack = announce(&mut stream, &data_port.to_string(), ack_read_size).await?;
    debug!("Data port acknowledged: {}", port_ack);

    Ok(stream)
}

async fn announce(
    stream: &mut TcpStream,
    value: &str,
    ack_read_size: usize,
) -> Result<String, ClientError> {
    send_response(stream, value.as_bytes()).await?;

    let mut ack = vec![0; ack_read_size];
    let n = stream.read(&mut ack).await?;
    if n == 0 {
        return Err(ClientError::PeerDisconnect);
    }
    Ok(String::from_utf8_lossy(&ack[..n]).into_owned())
}
