//! Module `data_channel`
//!
//! Passive-mode data channel: PASV opens a one-shot ephemeral listener,
//! and the next LIST or STOR consumes it by accepting exactly one data
//! connection. The listener is closed as soon as it is consumed.

use log::{debug, info, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

use crate::error::TransferError;
use crate::protocol::responses::{self, Reply};

/// Pending PASV listener owned by a session.
#[derive(Debug)]
pub struct PassiveListener {
    listener: TcpListener,
    addr: SocketAddrV4,
}

impl PassiveListener {
    /// Binds an ephemeral port on `ip`, the local address of the control
    /// connection.
    pub async fn open(ip: Ipv4Addr) -> Result<Self, TransferError> {
        let listener = TcpListener::bind((ip, 0))
            .await
            .map_err(TransferError::ListenerSetup)?;
        let port = listener
            .local_addr()
            .map_err(TransferError::ListenerSetup)?
            .port();

        debug!("PASV listener bound on {ip}:{port}");
        Ok(Self {
            listener,
            addr: SocketAddrV4::new(ip, port),
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
    pub fn reply(&self) -> Reply {
        let [h1, h2, h3, h4] = self.addr.ip().octets();
        let (p1, p2) = (self.addr.port() / 256, self.addr.port() % 256);
        Reply::new(
            responses::PASSIVE_MODE,
            format!("Entering Passive Mode ({h1},{h2},{h3},{h4},{p1},{p2})"),
        )
    }

    /// Waits up to `timeout` for one data connection. Consumes the listener,
    /// so it is closed whether or not a client shows up.
    pub async fn accept(self, timeout: Duration) -> Result<TcpStream, TransferError> {
        match tokio::time::timeout(timeout, self.listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("Data connection accepted from {peer} on port {}", self.addr.port());
                Ok(stream)
            }
            Ok(Err(e)) => Err(TransferError::Accept(e)),
            Err(_) => {
                warn!(
                    "No data connection on port {} within {:?}",
                    self.addr.port(), timeout
                );
                Err(TransferError::AcceptTimeout)
            }
        }
    }
}

/// IPv4 address to advertise in a PASV reply, taken from the control
/// connection's local address. IPv4-mapped IPv6 addresses are unwrapped.
pub fn passive_ip(local: SocketAddr) -> Result<Ipv4Addr, TransferError> {
    match local.ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(ip) => ip.to_ipv4_mapped().ok_or(TransferError::NoIpv4Address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reply_encodes_bound_port() {
        let passive = PassiveListener::open(Ipv4Addr::LOCALHOST).await.unwrap();
        let port = passive.port();

        let text = passive.reply().to_string();
        let inner = text
            .trim_end()
            .strip_prefix("227 Entering Passive Mode (")
            .and_then(|s| s.strip_suffix(')'))
            .unwrap();
        let numbers: Vec<u16> = inner.split(',').map(|n| n.parse().unwrap()).collect();

        assert_eq!(&numbers[..4], &[127, 0, 0, 1]);
        assert_eq!(numbers[4] * 256 + numbers[5], port);
    }

    #[tokio::test]
    async fn accept_consumes_one_connection_and_closes() {
        let passive = PassiveListener::open(Ipv4Addr::LOCALHOST).await.unwrap();
        let port = passive.port();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.unwrap();
            let _ = stream.write_all(b"x").await;
        });

        passive.accept(Duration::from_secs(5)).await.unwrap();
        client.await.unwrap();

        assert!(TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.is_err());
    }

    #[tokio::test]
    async fn accept_times_out_without_client() {
        let passive = PassiveListener::open(Ipv4Addr::LOCALHOST).await.unwrap();
        let result = passive.accept(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(TransferError::AcceptTimeout)));
    }

    #[test]
    fn passive_ip_prefers_ipv4() {
        let v4: SocketAddr = "10.0.0.5:21".parse().unwrap();
        assert_eq!(passive_ip(v4).unwrap(), Ipv4Addr::new(10, 0, 0, 5));

        let mapped = SocketAddr::new(
            IpAddr::V6(Ipv4Addr::new(192, 168, 1, 2).to_ipv6_mapped()),
            21,
        );
        assert_eq!(passive_ip(mapped).unwrap(), Ipv4Addr::new(192, 168, 1, 2));

        let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 21);
        assert!(matches!(passive_ip(v6), Err(TransferError::NoIpv4Address)));
    }
}
