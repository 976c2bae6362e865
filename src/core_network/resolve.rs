use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tokio::net::lookup_host;

/// Resolves the server hostname, preferring an IPv4 address.
pub async fn resolve_server(hostname: &str, port: u16) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = lookup_host((hostname, port))
        .await
        .with_context(|| format!("Failed to resolve server hostname: {}", hostname))?
        .collect();

    let addr = addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| anyhow!("No address found for server hostname: {}", hostname))?;
    debug!("Resolved {} to {}", hostname, addr);
    Ok(addr)
}

/// Finds the address other hosts can reach this machine on.
///
/// Connecting a UDP socket sends nothing but makes the OS pick the outbound
/// interface. Falls back to loopback when no route exists.
pub fn detect_data_address() -> IpAddr {
    match outbound_address() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Couldn't resolve localhost's external IP address: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

fn outbound_address() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("10.255.255.255:1")?;
    Ok(socket.local_addr()?.ip())
}
