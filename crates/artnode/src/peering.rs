//! Co-located node instances sharing inbound traffic.
//!
//! Several nodes bound to different local addresses can sit on one
//! physical broadcast domain; grouping them makes every member observe
//! each inbound datagram. The group owns its members: membership is a
//! coordinator operation, and a grouped node cannot be torn down
//! behind the group's back.

use std::time::{Duration, Instant};

use tracing::info;

use artnode_protocol::opcode::classify;
use artnode_protocol::packets::ArtPacket;
use artnode_protocol::MIN_PACKET_SIZE;

use crate::error::{Error, Result};
use crate::node::{Mode, Node};

#[derive(Default)]
pub struct PeerGroup {
    members: Vec<Node>,
}

impl PeerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a standby node to the group. The first member is the
    /// designated master; joining re-establishes exactly one master.
    pub fn join(&mut self, node: Node) -> Result<()> {
        if node.mode() == Mode::On || self.members.iter().any(|m| m.mode() == Mode::On) {
            return Err(Error::State("join requires standby nodes".into()));
        }
        info!(ip = %node.ip(), members = self.members.len() + 1, "node joined peer group");
        self.members.push(node);
        for (i, member) in self.members.iter_mut().enumerate() {
            member.master = i == 0;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Node] {
        &self.members
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.members.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.members.get_mut(index)
    }

    pub fn master(&self) -> Option<&Node> {
        self.members.first()
    }

    /// Start every member, master first.
    pub fn start_all(&mut self) -> Result<()> {
        for member in &mut self.members {
            member.start()?;
        }
        Ok(())
    }

    /// Stop every member.
    pub fn stop_all(&mut self) -> Result<()> {
        for member in &mut self.members {
            member.stop()?;
        }
        Ok(())
    }

    /// Drain the master's transport and dispatch every datagram to
    /// every member in group order. One datagram is processed fully,
    /// across all members, before the next receive.
    pub fn read(&mut self, timeout: Duration) -> Result<()> {
        let Some(master) = self.members.first() else {
            return Err(Error::Action("peer group has no members".into()));
        };
        if master.mode() != Mode::On {
            return Err(Error::Action("peer group is not running".into()));
        }
        let own_ip = master.ip();

        let mut buf = [0u8; 1024];
        loop {
            let received = self.members[0].transport_mut().recv_from(&mut buf, timeout)?;
            let Some((len, from)) = received else {
                break;
            };
            if len == 0 || from == own_ip {
                continue;
            }
            let data = &buf[..len];
            if len > MIN_PACKET_SIZE && classify(data).is_some() {
                match ArtPacket::decode(data) {
                    Some(packet) => {
                        let now = Instant::now();
                        for member in &mut self.members {
                            member.handle(&packet, from, now)?;
                        }
                    }
                    None => {
                        for member in &mut self.members {
                            member.note_parse_failure();
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
