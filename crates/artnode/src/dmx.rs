//! ArtDmx handling: the two-source merge engine.
//!
//! Each output port tracks at most two concurrent sources by IP. The
//! arriving source is classified against the two slots; there are nine
//! cases, and exactly one fires:
//!
//! ```text
//! \   A      #          #            #            #
//!  ------    #  empty   #   sender   #  ! sender  #
//!    B   \   #          #            #            #
//! ####################################################
//!   empty    # first    # continued  # start      #
//!            #  packet  #  from A    #  merge     #
//! ####################################################
//!   sender   # cont.    # invalid    # continue   #
//!            #  from B  #            #  merge     #
//! ####################################################
//!  ! sender  # start    # continue   # discard    #
//!            #  merge   #  merge     #  (3rd src) #
//! ####################################################
//! ```
//!
//! A merge ends when one source stays silent past the timeout, or when
//! an ArtAddress cancel command arrives.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use artnode_protocol::packets::{ArtDmx, ArtPacket};
use artnode_protocol::{MERGE_TIMEOUT_SECONDS, PORT_STATUS_ACT_MASK};

use crate::hooks::Event;
use crate::node::Node;
use crate::ports::{MergeMode, OutputPort};

pub(crate) const MERGE_TIMEOUT: Duration = Duration::from_secs(MERGE_TIMEOUT_SECONDS);

/// Which slot took the arriving frame; LTP output follows it.
#[derive(Clone, Copy)]
enum Latest {
    A,
    B,
}

impl Node {
    /// Apply one DMX frame to every enabled output port listening on
    /// its universe.
    pub(crate) fn handle_dmx(
        &mut self,
        frame: &ArtDmx,
        from: Ipv4Addr,
        now: Instant,
        packet: &ArtPacket,
    ) {
        if self.hooks.fire(Event::Dmx, packet) {
            return;
        }
        // the low byte of the port-address field carries the universe
        let universe = (frame.universe & 0x00ff) as u8;

        let Node { ports, hooks, .. } = self;
        for (port_id, port) in ports.output.iter_mut().enumerate() {
            if !port.enabled || port.port.addr != universe {
                continue;
            }
            port.status |= PORT_STATUS_ACT_MASK;

            check_merge_timeouts(port, now);
            reconcile(port, from, now, &frame.data);

            if let Some(hook) = hooks.dmx_port.as_mut() {
                hook(port_id, &port.data[..port.length]);
            }
        }
    }
}

/// Evict sources whose last frame is older than the merge timeout.
/// Each slot ages independently.
fn check_merge_timeouts(port: &mut OutputPort, now: Instant) {
    for slot in [&mut port.source_a, &mut port.source_b] {
        if let Some(last_seen) = slot.last_seen {
            if now.saturating_duration_since(last_seen) > MERGE_TIMEOUT {
                debug!(source = ?slot.ip, "merge source timed out");
                slot.evict();
            }
        }
    }
}

/// Classify the sender against the port's two source slots and update
/// the output buffer accordingly.
fn reconcile(port: &mut OutputPort, from: Ipv4Addr, now: Instant, payload: &[u8]) {
    let n = payload.len();
    let a = port.source_a.ip;
    let b = port.source_b.ip;

    match (a, b) {
        // first packet ever seen on this port
        (None, None) => {
            port.source_a.adopt(from, now, payload);
            port.length = n;
            port.data[..n].copy_from_slice(payload);
        }
        // continued transmission from the only source
        (Some(ip_a), None) if ip_a == from => {
            port.source_a.refresh(now, payload);
            port.length = n;
            port.data[..n].copy_from_slice(payload);
        }
        (None, Some(ip_b)) if ip_b == from => {
            port.source_b.refresh(now, payload);
            port.length = n;
            port.data[..n].copy_from_slice(payload);
        }
        // a second source appears: the merge starts
        (Some(_), None) => {
            port.source_b.adopt(from, now, payload);
            port.length = n;
            merge(port, Latest::B);
        }
        (None, Some(_)) => {
            port.source_a.adopt(from, now, payload);
            port.length = n;
            merge(port, Latest::A);
        }
        // one source matching both slots is inconsistent state
        (Some(ip_a), Some(ip_b)) if ip_a == from && ip_b == from => {
            warn!(%from, "sender matches both merge slots; frame ignored");
        }
        // ongoing merge
        (Some(ip_a), Some(_)) if ip_a == from => {
            port.source_a.refresh(now, payload);
            port.length = n;
            merge(port, Latest::A);
        }
        (Some(_), Some(ip_b)) if ip_b == from => {
            port.source_b.refresh(now, payload);
            port.length = n;
            merge(port, Latest::B);
        }
        // a third concurrent source is discarded outright
        (Some(_), Some(_)) => {
            warn!(%from, "more than two sources for universe; frame discarded");
        }
    }
}

/// Reconcile the two slots into the output buffer.
fn merge(port: &mut OutputPort, latest: Latest) {
    match port.merge_mode {
        MergeMode::Htp => {
            for i in 0..port.length {
                port.data[i] = port.source_a.data[i].max(port.source_b.data[i]);
            }
        }
        MergeMode::Ltp => {
            let source = match latest {
                Latest::A => &port.source_a,
                Latest::B => &port.source_b,
            };
            port.data[..port.length].copy_from_slice(&source.data[..port.length]);
        }
    }
}
