//! Directory of remote nodes learned from ArtPollReply traffic.
//!
//! The DMX send path consults it when a unicast fan-out limit is set:
//! few enough known receivers for a universe means unicast, anything
//! else falls back to broadcast.

use std::net::Ipv4Addr;

use tracing::debug;

use artnode_protocol::packets::{unpack_name, ArtPollReply};
use artnode_protocol::MAX_PORTS;

/// What we remember about a peer.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    pub ip: Ipv4Addr,
    /// The universes the peer outputs, as advertised in its reply
    pub sw_out: [u8; MAX_PORTS],
    pub short_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct NodeDirectory {
    entries: Vec<RemoteNode>,
}

impl NodeDirectory {
    /// Record or refresh a peer from its reply. Keyed on the address
    /// the peer advertises, so multi-homed senders stay distinct.
    pub fn update(&mut self, reply: &ArtPollReply) {
        let ip = Ipv4Addr::from(reply.ip);
        let short_name = unpack_name(&reply.short_name);
        match self.entries.iter_mut().find(|e| e.ip == ip) {
            Some(entry) => {
                entry.sw_out = reply.sw_out;
                entry.short_name = short_name;
            }
            None => {
                debug!(%ip, name = %short_name, "new peer discovered");
                self.entries.push(RemoteNode {
                    ip,
                    sw_out: reply.sw_out,
                    short_name,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RemoteNode] {
        &self.entries
    }

    /// Addresses of every peer outputting `universe`. None when there
    /// are more than `limit` of them, which callers treat as "just
    /// broadcast".
    pub fn nodes_for_universe(&self, universe: u8, limit: usize) -> Option<Vec<Ipv4Addr>> {
        let ips: Vec<Ipv4Addr> = self
            .entries
            .iter()
            .filter(|e| e.sw_out.contains(&universe))
            .map(|e| e.ip)
            .collect();
        if ips.len() > limit {
            None
        } else {
            Some(ips)
        }
    }
}
