//! Host registry for the rendezvous service
//!
//! Maps join keywords to the public address a host registered from. Entries
//! are refreshed by keep-alives and swept once they go stale. The registry
//! itself is plain data; the network layer keeps it behind a single lock so
//! lookups, refreshes and sweeps never interleave.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;

/// A host waiting for players
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub keyword: String,
    pub addr: SocketAddr,
    /// Milliseconds since the epoch of the last registration or keep-alive
    pub last_seen: u64,
}

#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: HashMap<String, HostEntry>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host under `keyword`
    ///
    /// A keyword that is already taken keeps its first host; returns
    /// false in that case.
    pub fn register(&mut self, keyword: &str, addr: SocketAddr, now: u64) -> bool {
        if self.hosts.contains_key(keyword) {
            return false;
        }

        info!("Host {} registered keyword '{}'", addr, keyword);
        self.hosts.insert(
            keyword.to_string(),
            HostEntry {
                keyword: keyword.to_string(),
                addr,
                last_seen: now,
            },
        );
        true
    }

    /// Address of the host registered under `keyword`
    pub fn find(&self, keyword: &str) -> Option<SocketAddr> {
        self.hosts.get(keyword).map(|entry| entry.addr)
    }

    pub fn unregister(&mut self, keyword: &str) -> bool {
        self.hosts.remove(keyword).is_some()
    }

    /// Refreshes every entry registered from `addr`, returning how many matched
    pub fn keep_alive(&mut self, addr: SocketAddr, now: u64) -> usize {
        let mut refreshed = 0;
        for entry in self.hosts.values_mut().filter(|entry| entry.addr == addr) {
            entry.last_seen = now;
            refreshed += 1;
        }
        refreshed
    }

    /// Removes entries not seen for longer than `timeout_ms` and returns them
    pub fn sweep_stale(&mut self, now: u64, timeout_ms: u64) -> Vec<HostEntry> {
        let stale: Vec<String> = self
            .hosts
            .iter()
            .filter(|(_, entry)| now.saturating_sub(entry.last_seen) > timeout_ms)
            .map(|(keyword, _)| keyword.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|keyword| self.hosts.remove(&keyword))
            .collect()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.hosts.contains_key(keyword)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
