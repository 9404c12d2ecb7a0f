//! Volume and port specification strings.
//!
//! Volumes are written `source:target[:ro]` and ports `host:container[/proto]`.
//! Both are parsed up front so a malformed definition fails before any
//! service is launched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{KumiageError, Result};

/// A parsed volume mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Source key. Each distinct source is backed by one engine volume.
    pub source: String,
    /// Mount point inside the container.
    pub target: String,
    /// Whether the mount is read-only.
    pub read_only: bool,
}

impl FromStr for VolumeSpec {
    type Err = KumiageError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(KumiageError::config(format!("Invalid volume spec: {}", s)));
        }
        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(KumiageError::config(format!(
                "Invalid volume spec: {} (empty source or target)",
                s
            )));
        }

        let read_only = match parts.get(2) {
            None => false,
            Some(&"ro") => true,
            Some(&"rw") => false,
            Some(mode) => {
                return Err(KumiageError::config(format!(
                    "Invalid volume mode '{}' in {}, expected ro or rw",
                    mode, s
                )))
            }
        };

        Ok(Self {
            source: parts[0].to_string(),
            target: parts[1].to_string(),
            read_only,
        })
    }
}

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Sctp => write!(f, "sctp"),
        }
    }
}

/// A parsed port binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Port on the host, bound on all interfaces.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
    /// Protocol, `tcp` when the binding has no suffix.
    pub protocol: Protocol,
}

impl PortBinding {
    /// Returns the container side in `port/proto` form, e.g. `5432/tcp`.
    pub fn container_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

impl FromStr for PortBinding {
    type Err = KumiageError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, container) = match s.split(':').collect::<Vec<_>>()[..] {
            [host, container] => (host, container),
            _ => {
                return Err(KumiageError::config(format!(
                    "Could not parse port spec as port binding: {}",
                    s
                )))
            }
        };

        let (container, protocol) = match container.split_once('/') {
            Some((port, "tcp")) => (port, Protocol::Tcp),
            Some((port, "udp")) => (port, Protocol::Udp),
            Some((port, "sctp")) => (port, Protocol::Sctp),
            Some((_, proto)) => {
                return Err(KumiageError::config(format!(
                    "Unsupported protocol '{}' in port spec {}",
                    proto, s
                )))
            }
            None => (container, Protocol::Tcp),
        };

        Ok(Self {
            host_port: parse_port(host, s)?,
            container_port: parse_port(container, s)?,
            protocol,
        })
    }
}

fn parse_port(value: &str, spec: &str) -> Result<u16> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(KumiageError::config(format!(
            "Invalid port '{}' in port spec {}",
            value, spec
        ))),
        Ok(port) => Ok(port),
    }
}
