use std::fmt::{self, Debug};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

/// Identifies a live, in-memory connection. Never persisted — sessions are
/// ephemeral per the data model.
pub type SessionId = Uuid;

/// `user_id`, `channel_id`, `message_id`, `key_id` are monotonic surrogate keys
/// assigned by the storage engine.
pub type UserId = i64;
pub type ChannelId = i64;
pub type MessageId = i64;
pub type SshKeyId = i64;

/// Short, stable name of a transport, used for session bookkeeping and logging
/// (e.g. `"tcp"`, `"ssh"`, `"ws"`).
pub type ProtocolName = &'static str;

/// Wraps a value that must never be printed or serialized in logs — only its
/// presence, never its content, is observable through `Debug`.
#[derive(PartialEq, Eq, Clone)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub const fn new(v: T) -> Self {
        Self(v)
    }

    pub fn expose_secret(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    pub fn random_hex(bytes: usize) -> Self {
        let mut buf = vec![0u8; bytes];
        rand::Rng::fill(&mut rand::thread_rng(), &mut buf[..]);
        Secret::new(HEXLOWER.encode(&buf))
    }
}

impl<T> From<T> for Secret<T> {
    fn from(v: T) -> Self {
        Self::new(v)
    }
}

impl<'de, T> Deserialize<'de> for Secret<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = Deserialize::deserialize::<D>(deserializer)?;
        Ok(Self::new(v))
    }
}

impl<T> Serialize for Secret<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<secret>")
    }
}

/// A config-file address that may resolve to more than one socket (e.g.
/// `[::]:6465` listens on both the IPv4 and IPv6 wildcard).
#[derive(Clone)]
pub struct ListenEndpoint(pub SocketAddr);

impl ListenEndpoint {
    pub fn addresses_to_listen_on(&self) -> Vec<SocketAddr> {
        if self.0.ip() == Ipv6Addr::UNSPECIFIED {
            vec![
                SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), self.0.port()),
                SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), self.0.port()),
            ]
        } else {
            vec![self.0]
        }
    }

    pub async fn tcp_listeners(&self) -> std::io::Result<Vec<TcpListener>> {
        let mut out = Vec::new();
        for addr in self.addresses_to_listen_on() {
            out.push(TcpListener::bind(addr).await?);
        }
        Ok(out)
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

/// Accepts connections from every bound listener as a single merged stream,
/// so a transport only has to write one accept loop regardless of how many
/// physical sockets `listen` resolved to.
pub async fn accept_any(listeners: &[TcpListener]) -> std::io::Result<(TcpStream, SocketAddr)> {
    use futures::future::select_all;
    let futs: Vec<_> = listeners.iter().map(|l| Box::pin(l.accept())).collect();
    let (result, _idx, _rest) = select_all(futs).await;
    result
}

impl From<SocketAddr> for ListenEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl<'de> Deserialize<'de> for ListenEndpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v: String = Deserialize::deserialize::<D>(deserializer)?;
        let addr = v
            .to_socket_addrs()
            .map_err(|e| {
                serde::de::Error::custom(format!(
                    "failed to resolve {v} into a TCP endpoint: {e:?}"
                ))
            })?
            .next()
            .ok_or_else(|| {
                serde::de::Error::custom(format!("failed to resolve {v} into a TCP endpoint"))
            })?;
        Ok(Self(addr))
    }
}

impl Serialize for ListenEndpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.to_string().serialize(serializer)
    }
}

impl Debug for ListenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
