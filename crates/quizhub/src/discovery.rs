//! UDP discovery responder.
//!
//! Clients on the local network broadcast `QUIZ_DISCOVERY_REQUEST` and
//! get back `QUIZ_DISCOVERY_RESPONSE|<ip>|<tcp-port>`, naming the address
//! the TCP server is reachable on from their side.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::QuizError;

pub const DISCOVERY_REQUEST: &str = "QUIZ_DISCOVERY_REQUEST";
pub const DISCOVERY_RESPONSE_PREFIX: &str = "QUIZ_DISCOVERY_RESPONSE";

/// Largest datagram we bother reading.
const MAX_DATAGRAM: usize = 512;

/// Answers discovery requests on a UDP port.
pub struct DiscoveryResponder {
    socket: UdpSocket,
    tcp_port: u16,
}

impl DiscoveryResponder {
    /// Binds `0.0.0.0:port` with broadcast enabled.
    pub async fn bind(port: u16, tcp_port: u16) -> Result<Self, QuizError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        socket.set_broadcast(true)?;
        tracing::info!(port, tcp_port, "UDP discovery listening");
        Ok(Self { socket, tcp_port })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Answers requests until `signal` resolves.
    ///
    /// Receive and send failures are logged and the loop carries on.
    pub async fn run_until<F>(self, signal: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(signal);
        let mut buf = [0u8; MAX_DATAGRAM];

        loop {
            let (len, remote) = tokio::select! {
                _ = &mut signal => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::warn!(error = %e, "discovery receive failed");
                        continue;
                    }
                },
            };

            if !is_discovery_request(&buf[..len]) {
                continue;
            }

            let response = discovery_response(local_ip_for(remote).await, self.tcp_port);
            match self.socket.send_to(response.as_bytes(), remote).await {
                Ok(_) => tracing::debug!(%remote, %response, "discovery answered"),
                Err(e) => tracing::warn!(%remote, error = %e, "discovery reply failed"),
            }
        }
        tracing::info!("UDP discovery stopped");
    }
}

fn is_discovery_request(datagram: &[u8]) -> bool {
    std::str::from_utf8(datagram)
        .map(|s| s.trim().eq_ignore_ascii_case(DISCOVERY_REQUEST))
        .unwrap_or(false)
}

fn discovery_response(ip: IpAddr, tcp_port: u16) -> String {
    format!("{DISCOVERY_RESPONSE_PREFIX}|{ip}|{tcp_port}")
}

/// The local address the OS would route to `remote` from.
///
/// Connecting a UDP socket sends nothing; it only picks a route.
async fn local_ip_for(remote: SocketAddr) -> IpAddr {
    let bind: SocketAddr = match remote {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let routed = async {
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(remote).await?;
        socket.local_addr()
    };
    match routed.await {
        Ok(addr) => addr.ip(),
        Err(e) => {
            tracing::debug!(%remote, error = %e, "no route to discovery client, answering with loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
