//! Pool of candidate broker URIs for the failover transport.

use rand::Rng;

use crate::config::BrokerUri;

/// Tracks which broker URIs are free to try.
///
/// The reconnect loop acquires a URI before dialing and releases it if the
/// attempt fails (or when the connection later drops), so a URI is never
/// handed to two dial attempts at once. With `randomize` set, acquisition
/// picks uniformly among the free entries to spread reconnecting clients
/// across brokers.
#[derive(Debug)]
pub struct UriPool {
    free: Vec<BrokerUri>,
    randomize: bool,
}

impl UriPool {
    /// Creates a pool over the given URIs.
    pub fn new(uris: Vec<BrokerUri>, randomize: bool) -> Self {
        Self {
            free: uris,
            randomize,
        }
    }

    /// Takes a URI out of the pool, random or front-of-list per
    /// configuration. Returns `None` when every URI is currently in use.
    pub fn acquire(&mut self) -> Option<BrokerUri> {
        if self.free.is_empty() {
            return None;
        }
        let index = if self.randomize {
            rand::thread_rng().gen_range(0..self.free.len())
        } else {
            0
        };
        Some(self.free.remove(index))
    }

    /// Returns a URI to the pool after a failed attempt or a dropped
    /// connection. Duplicates are ignored.
    pub fn release(&mut self, uri: BrokerUri) {
        if !self.free.contains(&uri) {
            self.free.push(uri);
        }
    }

    /// Returns the number of free URIs.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Returns `true` when no URI is free.
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(host: &str) -> BrokerUri {
        BrokerUri::parse(&format!("tcp://{}:61616", host)).unwrap()
    }

    #[test]
    fn test_sequential_acquire_order() {
        let mut pool = UriPool::new(vec![uri("a"), uri("b"), uri("c")], false);
        assert_eq!(pool.acquire().unwrap().host(), "a");
        assert_eq!(pool.acquire().unwrap().host(), "b");
        assert_eq!(pool.acquire().unwrap().host(), "c");
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn test_release_returns_uri() {
        let mut pool = UriPool::new(vec![uri("a")], false);
        let taken = pool.acquire().unwrap();
        assert!(pool.is_empty());
        pool.release(taken);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_release_ignores_duplicates() {
        let mut pool = UriPool::new(vec![uri("a")], false);
        pool.release(uri("a"));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_randomized_acquire_covers_pool() {
        // Random selection still drains the pool completely.
        let mut pool = UriPool::new(vec![uri("a"), uri("b"), uri("c")], true);
        let mut hosts: Vec<String> = Vec::new();
        while let Some(u) = pool.acquire() {
            hosts.push(u.host().to_string());
        }
        hosts.sort();
        assert_eq!(hosts, ["a", "b", "c"]);
    }
}
