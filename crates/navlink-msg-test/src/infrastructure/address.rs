//! Connection strings for endpoint sessions.
//!
//! - `udpin:<host>:<port>` binds `<host>:<port>` and replies to whoever sent
//!   the most recent datagram.
//! - `udpout:<host>:<port>` binds an ephemeral local port and always sends to
//!   `<host>:<port>`.
//!
//! `<host>` may be a name such as `localhost`; it is resolved once, when the
//! string is parsed.

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::str::FromStr;

use thiserror::Error;

/// Why a connection string was rejected.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("unsupported connection string {0:?}; expected udpin:<host>:<port> or udpout:<host>:<port>")]
    UnknownScheme(String),

    #[error("cannot resolve {address:?}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("{0:?} resolved to no addresses")]
    NoAddress(String),
}

/// A parsed connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAddress {
    UdpIn(SocketAddr),
    UdpOut(SocketAddr),
}

impl LinkAddress {
    /// Binds the local socket.  Returns the fixed peer for `udpout`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the bind fails (port in use, privileged port).
    pub fn bind(&self) -> io::Result<(UdpSocket, Option<SocketAddr>)> {
        match *self {
            LinkAddress::UdpIn(local) => Ok((UdpSocket::bind(local)?, None)),
            LinkAddress::UdpOut(peer) => {
                let any: SocketAddr = if peer.is_ipv4() {
                    (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
                };
                Ok((UdpSocket::bind(any)?, Some(peer)))
            }
        }
    }

    /// `true` when the peer is learnt from incoming traffic.
    pub fn learns_peer(&self) -> bool {
        matches!(self, LinkAddress::UdpIn(_))
    }
}

impl FromStr for LinkAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| AddressError::UnknownScheme(s.to_string()))?;
        let addr = resolve(rest)?;
        match scheme {
            "udpin" => Ok(LinkAddress::UdpIn(addr)),
            "udpout" => Ok(LinkAddress::UdpOut(addr)),
            _ => Err(AddressError::UnknownScheme(s.to_string())),
        }
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddress::UdpIn(addr) => write!(f, "udpin:{addr}"),
            LinkAddress::UdpOut(addr) => write!(f, "udpout:{addr}"),
        }
    }
}

fn resolve(host_port: &str) -> Result<SocketAddr, AddressError> {
    if let Ok(addr) = host_port.parse::<SocketAddr>() {
        return Ok(addr);
    }
    host_port
        .to_socket_addrs()
        .map_err(|source| AddressError::Resolve {
            address: host_port.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| AddressError::NoAddress(host_port.to_string()))
}
