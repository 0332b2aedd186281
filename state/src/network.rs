//! Network bindings and opened ports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::relation::DEFAULT_ADDRESS;

/// One address on an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// The address.
    pub value: String,
    /// Its CIDR.
    pub cidr: String,
}

/// An interface a binding resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindAddress {
    /// Interface name.
    #[serde(default = "default_interface")]
    pub interface_name: String,
    /// MAC address.
    #[serde(default)]
    pub mac_address: Option<String>,
    /// Addresses on the interface.
    pub addresses: Vec<Address>,
}

fn default_interface() -> String {
    "eth0".to_string()
}

/// What `network-get` returns for one binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Endpoint or extra-binding name.
    pub binding_name: String,
    /// Bound interfaces.
    pub bind_addresses: Vec<BindAddress>,
    /// Ingress addresses.
    pub ingress_addresses: Vec<String>,
    /// Egress subnets.
    pub egress_subnets: Vec<String>,
}

impl Network {
    /// The network Juju reports for `binding` when the test does not say otherwise.
    pub fn default_for(binding: impl Into<String>) -> Self {
        Self {
            binding_name: binding.into(),
            bind_addresses: vec![BindAddress {
                interface_name: default_interface(),
                mac_address: None,
                addresses: vec![Address {
                    value: DEFAULT_ADDRESS.to_string(),
                    cidr: format!("{DEFAULT_ADDRESS}/24"),
                }],
            }],
            ingress_addresses: vec![DEFAULT_ADDRESS.to_string()],
            egress_subnets: vec![format!("{DEFAULT_ADDRESS}/24")],
        }
    }
}

/// Transport protocol of an opened port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
    /// ICMP; carries no port number.
    Icmp,
}

impl Protocol {
    /// Juju's spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }
}

/// An opened port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Port {
    /// Protocol.
    pub protocol: Protocol,
    /// Port number; `None` for ICMP.
    #[serde(default)]
    pub port: Option<u16>,
}

impl Port {
    /// A TCP port.
    #[must_use]
    pub fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            port: Some(port),
        }
    }

    /// A UDP port.
    #[must_use]
    pub fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            port: Some(port),
        }
    }

    /// ICMP.
    #[must_use]
    pub fn icmp() -> Self {
        Self {
            protocol: Protocol::Icmp,
            port: None,
        }
    }

    /// Checks Juju's rules: TCP/UDP need a port in 1..=65535, ICMP has none.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated rule.
    pub fn validate(&self) -> Result<(), String> {
        match (self.protocol, self.port) {
            (Protocol::Icmp, None) => Ok(()),
            (Protocol::Icmp, Some(p)) => Err(format!("icmp ports cannot carry a port number ({p})")),
            (proto, None) => Err(format!("{} ports need a port number", proto.as_str())),
            (proto, Some(0)) => Err(format!("{} port must be in 1..=65535, got 0", proto.as_str())),
            (_, Some(_)) => Ok(()),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(p) => write!(f, "{}/{}", p, self.protocol.as_str()),
            None => write!(f, "{}", self.protocol.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_rules() {
        assert!(Port::tcp(8080).validate().is_ok());
        assert!(Port::icmp().validate().is_ok());
        assert!(Port::tcp(0).validate().is_err());
        let bad = Port {
            protocol: Protocol::Icmp,
            port: Some(1),
        };
        assert!(bad.validate().is_err());
        let missing = Port {
            protocol: Protocol::Udp,
            port: None,
        };
        assert!(missing.validate().is_err());
    }

    #[test]
    fn default_network_uses_test_net() {
        let n = Network::default_for("db");
        assert_eq!(n.ingress_addresses, vec![DEFAULT_ADDRESS.to_string()]);
        assert_eq!(n.bind_addresses[0].addresses[0].value, DEFAULT_ADDRESS);
    }
}
