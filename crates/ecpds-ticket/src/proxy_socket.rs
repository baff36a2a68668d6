// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The capability handed back to clients.

use serde::{Deserialize, Serialize};

use ecpds_core::{MoverEndpoint, TicketId};

/// Routing and authorization for one byte transfer; never carries payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySocket {
    pub ticket: TicketId,
    pub host: String,
    pub port: u16,
    /// The client opens the connection (true) or accepts it (false).
    pub initiates_connection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes_per_sec: Option<u64>,
    /// Tag of the browsing domain that issued the ticket.
    #[serde(default)]
    pub domain: String,
}

impl ProxySocket {
    /// A socket to the master's own data port; the client connects.
    pub fn direct(ticket: TicketId, host: impl Into<String>, port: u16) -> Self {
        Self {
            ticket,
            host: host.into(),
            port,
            initiates_connection: true,
            max_bytes_per_sec: None,
            domain: String::new(),
        }
    }

    /// A socket to the endpoint a mover prepared for the ticket.
    pub fn via_mover(ticket: TicketId, endpoint: MoverEndpoint) -> Self {
        Self {
            ticket,
            host: endpoint.host,
            port: endpoint.port,
            initiates_connection: endpoint.client_initiates,
            max_bytes_per_sec: None,
            domain: String::new(),
        }
    }

    pub fn in_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_max_bytes_per_sec(mut self, limit: Option<u64>) -> Self {
        self.max_bytes_per_sec = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mover_socket_follows_endpoint() {
        let socket = ProxySocket::via_mover(
            TicketId(9),
            MoverEndpoint {
                host: "mover-2".into(),
                port: 9140,
                client_initiates: false,
            },
        )
        .in_domain("destinations")
        .with_max_bytes_per_sec(Some(1_000));
        assert!(!socket.initiates_connection);
        assert_eq!(socket.host, "mover-2");
        assert_eq!(socket.domain, "destinations");
        assert_eq!(socket.max_bytes_per_sec, Some(1_000));
    }

    #[test]
    fn unlimited_socket_omits_rate_when_serialized() {
        let socket = ProxySocket::direct(TicketId(1), "master", 4640).in_domain("data");
        let json = serde_json::to_value(&socket).unwrap();
        assert!(json.get("max_bytes_per_sec").is_none());
        assert_eq!(json["initiates_connection"], true);
        let back: ProxySocket = serde_json::from_value(json).unwrap();
        assert_eq!(back, socket);
    }
}
