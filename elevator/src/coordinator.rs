/// ----- COORDINATION ROLE -----
/// Deterministic role election over the live peer set: the smallest live
/// id is master, everyone else backs it up, and a node with no peers runs
/// standalone. There is no handshake; every node derives the same answer
/// from the same membership, so a lost master is replaced as soon as the
/// peer monitor reports it gone.

use shared_resources::node_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Standalone,
    Backup,
    Master,
}

/// The elected master: the minimum id among the live peers and ourselves.
pub fn master_id<'a>(self_id: &'a str, peers: &'a [String]) -> &'a str {
    node_id::min(peers.iter().map(String::as_str).chain(std::iter::once(self_id)))
        .unwrap_or(self_id)
}

pub fn elect(self_id: &str, peers: &[String]) -> Role {
    if peers.iter().all(|peer| peer == self_id) {
        Role::Standalone
    } else if master_id(self_id, peers) == self_id {
        Role::Master
    } else {
        Role::Backup
    }
}

/// Whether an assignment from `sender` should be honored. Anything from
/// the elected master (or below, during a transient multi-master window
/// where our membership lags) is authoritative; the larger id yields.
pub fn is_authoritative(sender: &str, self_id: &str, peers: &[String]) -> bool {
    node_id::cmp(sender, master_id(self_id, peers)).is_le()
}
