use std::collections::HashSet;
use std::sync::RwLock;

use alloy::primitives::Address;

use crate::error::{EngineError, EngineResult};

/// The set of addresses whose transaction activity triggers analysis.
///
/// Mutated by operator actions (add/remove) concurrently with poller reads,
/// so membership lives behind an `RwLock`: the poller takes many short read
/// locks per block while edits are rare. Parsing into `Address` up front
/// makes every comparison case-insensitive for free.
#[derive(Debug, Default)]
pub struct AddressWatchlist {
    inner: RwLock<HashSet<Address>>,
}

impl AddressWatchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a user-supplied address string. Rejected synchronously with no
    /// state mutation on malformed input.
    pub fn parse_address(raw: &str) -> EngineResult<Address> {
        raw.trim()
            .parse()
            .map_err(|_| EngineError::InvalidAddress(raw.to_string()))
    }

    /// Add an address. Returns false if it was already watched (idempotent).
    pub fn add(&self, address: Address) -> bool {
        self.inner.write().expect("watchlist lock poisoned").insert(address)
    }

    /// Remove an address. Returns false if it was not watched.
    pub fn remove(&self, address: Address) -> bool {
        self.inner.write().expect("watchlist lock poisoned").remove(&address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.inner.read().expect("watchlist lock poisoned").contains(address)
    }

    /// True if the transaction touches a watched address on either side.
    pub fn is_relevant(&self, from: &Address, to: Option<&Address>) -> bool {
        let set = self.inner.read().expect("watchlist lock poisoned");
        set.contains(from) || to.is_some_and(|to| set.contains(to))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("watchlist lock poisoned").is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("watchlist lock poisoned").len()
    }

    pub fn snapshot(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self
            .inner
            .read()
            .expect("watchlist lock poisoned")
            .iter()
            .copied()
            .collect();
        addresses.sort();
        addresses
    }
}
