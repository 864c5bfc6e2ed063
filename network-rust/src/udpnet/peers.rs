use std::collections::HashMap;
use std::str;
use std::time;

use crossbeam_channel as cbc;
use log::error;

use super::sock;

const HEARTBEAT_INTERVAL: time::Duration = time::Duration::from_millis(15);
// Silence for many heartbeat intervals before declaring a peer lost, so a
// burst of dropped datagrams does not flap the membership.
const PEER_TIMEOUT: time::Duration = time::Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerUpdate {
    pub peers: Vec<String>,
    pub new: Option<String>,
    pub lost: Vec<String>,
}

/// Liveness bookkeeping behind `rx`, kept separate so membership logic can
/// be exercised without sockets. Registrations and removals are idempotent
/// set operations; duplicated or reordered heartbeats cannot corrupt it.
pub struct PeerTracker {
    last_seen: HashMap<String, time::Instant>,
    timeout: time::Duration,
}

impl PeerTracker {
    pub fn new(timeout: time::Duration) -> Self {
        PeerTracker {
            last_seen: HashMap::new(),
            timeout,
        }
    }

    /// Record a heartbeat from `id`; returns the id when it is a new peer.
    pub fn register(&mut self, id: &str, now: time::Instant) -> Option<String> {
        let is_new = !self.last_seen.contains_key(id);
        self.last_seen.insert(id.to_string(), now);
        is_new.then(|| id.to_string())
    }

    /// Drop peers that have been silent past the timeout; returns their ids.
    pub fn sweep(&mut self, now: time::Instant) -> Vec<String> {
        let mut lost: Vec<String> = self
            .last_seen
            .iter()
            .filter(|(_, when)| now.duration_since(**when) > self.timeout)
            .map(|(id, _)| id.clone())
            .collect();
        lost.sort();
        for id in &lost {
            self.last_seen.remove(id);
        }
        lost
    }

    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.last_seen.keys().cloned().collect();
        peers.sort();
        peers
    }
}

/// Periodically broadcast `id` on `port`. Broadcasting can be toggled with
/// `tx_enable`.
///
/// Returns `Err` when creating the socket fails. Ignores sending errors
/// after the socket has been created.
pub fn tx(port: u16, id: String, tx_enable: cbc::Receiver<bool>) -> std::io::Result<()> {
    let (s, addr) = sock::new_tx(port)?;

    let mut enabled = true;

    let ticker = cbc::tick(HEARTBEAT_INTERVAL);

    loop {
        cbc::select! {
            recv(tx_enable) -> enable => {
                enabled = enable.unwrap();
            },
            recv(ticker) -> _ => {
                if enabled {
                    if let Err(e) = s.send_to(id.as_bytes(), &addr) {
                        error!("sending heartbeat failed: {}", e);
                    }
                }
            },
        }
    }
}

/// Track peer heartbeats on `port` and emit a `PeerUpdate` whenever the
/// membership changes.
///
/// Returns `Err` when creating the socket fails. Ignores receiving errors
/// after creating the socket. Panics if sending to the channel fails.
pub fn rx(port: u16, peer_update: cbc::Sender<PeerUpdate>) -> std::io::Result<()> {
    let s = sock::new_rx(port)?;
    s.set_read_timeout(Some(PEER_TIMEOUT))?;

    let mut tracker = PeerTracker::new(PEER_TIMEOUT);
    let mut buf = [0; 1024];

    loop {
        let now = time::Instant::now();

        let mut new = None;
        if let Ok(n) = s.recv(&mut buf) {
            if let Ok(id) = str::from_utf8(&buf[..n]) {
                new = tracker.register(id, now);
            }
        }

        let lost = tracker.sweep(now);

        if new.is_some() || !lost.is_empty() {
            peer_update
                .send(PeerUpdate {
                    peers: tracker.peers(),
                    new,
                    lost,
                })
                .unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn first_heartbeat_reports_a_new_peer() {
        let mut tracker = PeerTracker::new(Duration::from_millis(500));
        let now = Instant::now();
        assert_eq!(tracker.register("2", now), Some(String::from("2")));
        assert_eq!(tracker.register("2", now), None);
        assert_eq!(tracker.peers(), vec![String::from("2")]);
    }

    #[test]
    fn duplicate_heartbeats_are_idempotent() {
        let mut tracker = PeerTracker::new(Duration::from_millis(500));
        let now = Instant::now();
        tracker.register("1", now);
        tracker.register("1", now);
        tracker.register("1", now);
        assert_eq!(tracker.peers(), vec![String::from("1")]);
        assert!(tracker.sweep(now).is_empty());
    }

    #[test]
    fn silent_peer_is_lost_after_the_timeout() {
        let mut tracker = PeerTracker::new(Duration::from_millis(500));
        let start = Instant::now();
        tracker.register("1", start);
        tracker.register("2", start + Duration::from_millis(400));

        let lost = tracker.sweep(start + Duration::from_millis(600));
        assert_eq!(lost, vec![String::from("1")]);
        assert_eq!(tracker.peers(), vec![String::from("2")]);

        // Sweeping again reports nothing; removal is idempotent.
        assert!(tracker.sweep(start + Duration::from_millis(600)).is_empty());
    }

    #[test]
    fn heartbeat_within_timeout_keeps_the_peer() {
        let mut tracker = PeerTracker::new(Duration::from_millis(500));
        let start = Instant::now();
        tracker.register("1", start);
        tracker.register("1", start + Duration::from_millis(450));
        assert!(tracker.sweep(start + Duration::from_millis(700)).is_empty());
        assert_eq!(tracker.peers(), vec![String::from("1")]);
    }
}
