//! Session and heartbeat management for connected clients
//!
//! This module owns the per-connection records of the server:
//! - Client lifecycle (join, leave, heartbeat timeout)
//! - One outstanding liveness probe per client, with idempotent resends
//! - Round-trip time sampling (last sample and running mean)
//! - The cheat-score ("malus") accumulated through protocol violations
//!
//! The manager never touches the transport itself. Operations that need a
//! probe on the wire return the probe id, and the tick orchestrator sends it.

use log::{debug, info};
use speedball_shared::UNKNOWN_RTT;
use std::net::SocketAddr;

/// Liveness probe state for one client
///
/// At most one probe is outstanding at a time. An unanswered probe is resent
/// with the same id so an in-flight acknowledgement still matches; a fresh id
/// is only allocated once the previous probe was acknowledged and a full
/// interval has elapsed since that acknowledgement.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    /// Id of the current probe, 0 before the first one is armed
    probe_id: u32,
    /// Send (or resend) time of the current probe, or the acknowledgement time
    /// once it has been answered
    reference_time: f64,
    acknowledged: bool,
    last_rtt: f64,
    rtt_sum: f64,
    rtt_samples: u32,
    /// Consecutive intervals the current probe went unanswered
    missed_intervals: u32,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            probe_id: 0,
            reference_time: 0.0,
            acknowledged: true,
            last_rtt: UNKNOWN_RTT,
            rtt_sum: 0.0,
            rtt_samples: 0,
            missed_intervals: 0,
        }
    }

    /// Allocates a fresh probe id and marks it sent at `now`.
    pub fn arm(&mut self, now: f64) -> u32 {
        self.probe_id = self.probe_id.wrapping_add(1).max(1);
        self.reference_time = now;
        self.acknowledged = false;
        self.missed_intervals = 0;
        self.probe_id
    }

    /// Advances the schedule and returns the probe id to put on the wire, if any.
    pub fn poll(&mut self, now: f64, interval: f64) -> Option<u32> {
        if now - self.reference_time < interval {
            return None;
        }

        if self.acknowledged {
            Some(self.arm(now))
        } else {
            self.reference_time = now;
            self.missed_intervals += 1;
            Some(self.probe_id)
        }
    }

    /// Records an acknowledgement and returns the measured sample.
    ///
    /// Stale ids and duplicate acknowledgements are ignored.
    pub fn acknowledge(&mut self, probe_id: u32, now: f64) -> Option<f64> {
        if self.acknowledged || probe_id != self.probe_id {
            return None;
        }

        let sample = now - self.reference_time;
        self.last_rtt = sample;
        self.rtt_sum += sample;
        self.rtt_samples += 1;
        self.acknowledged = true;
        self.reference_time = now;
        self.missed_intervals = 0;
        Some(sample)
    }

    pub fn last_rtt(&self) -> f64 {
        self.last_rtt
    }

    pub fn mean_rtt(&self) -> f64 {
        if self.rtt_samples == 0 {
            UNKNOWN_RTT
        } else {
            self.rtt_sum / self.rtt_samples as f64
        }
    }

    pub fn missed_intervals(&self) -> u32 {
        self.missed_intervals
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Network address, also the client's identity
    pub addr: SocketAddr,
    /// Cheat-score, only ever increases
    malus: u32,
    heartbeat: Heartbeat,
}

impl Client {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            malus: 0,
            heartbeat: Heartbeat::new(),
        }
    }

    pub fn malus(&self) -> u32 {
        self.malus
    }

    /// Adds `amount` to the cheat-score.
    pub fn penalize(&mut self, amount: u32) {
        self.malus = self.malus.saturating_add(amount);
        debug!(
            "Client {} cheat-score +{} (now {})",
            self.addr, amount, self.malus
        );
    }
}

/// Manages all connected clients
///
/// Clients are kept in join order so broadcasts and heartbeat resends are
/// emitted deterministically.
pub struct ClientManager {
    clients: Vec<Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: Vec::new(),
            max_clients,
        }
    }

    /// Registers a client and arms its first probe
    ///
    /// Returns the probe id to send, or None if the address is already
    /// connected or the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, now: f64) -> Option<u32> {
        if self.contains(addr) || self.clients.len() >= self.max_clients {
            return None;
        }

        let mut client = Client::new(addr);
        let probe_id = client.heartbeat.arm(now);
        info!("Client {} connected", addr);
        self.clients.push(client);

        Some(probe_id)
    }

    /// Removes a client. Returns true if the client was found.
    pub fn remove_client(&mut self, addr: SocketAddr) -> bool {
        if let Some(index) = self.clients.iter().position(|c| c.addr == addr) {
            let client = self.clients.remove(index);
            info!(
                "Client {} disconnected (cheat-score {})",
                client.addr, client.malus
            );
            true
        } else {
            false
        }
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.clients.iter().any(|c| c.addr == addr)
    }

    pub fn get(&self, addr: SocketAddr) -> Option<&Client> {
        self.clients.iter().find(|c| c.addr == addr)
    }

    pub fn get_mut(&mut self, addr: SocketAddr) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| c.addr == addr)
    }

    /// Applies an acknowledgement from `addr`. Returns the RTT sample if it
    /// matched the outstanding probe.
    pub fn acknowledge(&mut self, addr: SocketAddr, probe_id: u32, now: f64) -> Option<f64> {
        let client = self.get_mut(addr)?;
        let sample = client.heartbeat.acknowledge(probe_id, now);
        match sample {
            Some(rtt) => debug!("Client {} rtt {:.3}s", addr, rtt),
            None => debug!("Ignoring stale pong {} from {}", probe_id, addr),
        }
        sample
    }

    /// Advances every client's heartbeat and returns the probes to send
    pub fn poll_heartbeats(&mut self, now: f64, interval: f64) -> Vec<(SocketAddr, u32)> {
        self.clients
            .iter_mut()
            .filter_map(|client| {
                client
                    .heartbeat
                    .poll(now, interval)
                    .map(|probe_id| (client.addr, probe_id))
            })
            .collect()
    }

    /// Clients whose current probe went unanswered for at least
    /// `max_missed` consecutive intervals
    pub fn stale_clients(&self, max_missed: u32) -> Vec<SocketAddr> {
        self.clients
            .iter()
            .filter(|c| c.heartbeat.missed_intervals() >= max_missed)
            .map(|c| c.addr)
            .collect()
    }

    /// Last RTT sample, [`UNKNOWN_RTT`] before the first acknowledgement
    pub fn last_rtt(&self, addr: SocketAddr) -> Option<f64> {
        self.get(addr).map(|c| c.heartbeat.last_rtt())
    }

    pub fn mean_rtt(&self, addr: SocketAddr) -> Option<f64> {
        self.get(addr).map(|c| c.heartbeat.mean_rtt())
    }

    pub fn malus(&self, addr: SocketAddr) -> Option<u32> {
        self.get(addr).map(|c| c.malus)
    }

    /// Addresses of all clients in join order
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.clients.iter().map(|c| c.addr).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
