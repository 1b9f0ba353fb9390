//! Request tokens
//!
//! Each request class keeps its own monotonically increasing counter. An
//! operation takes a token when it is issued and may only commit its result
//! while that token is still the latest one for its class.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    Connect,
    List,
    /// Bumped on disconnect; every operation holds the value current at issue
    Session,
}

impl RequestClass {
    pub const ALL: [RequestClass; 3] = [RequestClass::Connect, RequestClass::List, RequestClass::Session];
}

pub struct RequestSequencer {
    counters: DashMap<RequestClass, AtomicU64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Issue the next token (starts at 1, 0 means "never issued")
    pub fn next(&self, class: RequestClass) -> u64 {
        self.counters
            .entry(class)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1
    }

    /// Latest issued token without issuing a new one
    pub fn current(&self, class: RequestClass) -> u64 {
        self.counters
            .get(&class)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn is_current(&self, class: RequestClass, token: u64) -> bool {
        self.current(class) == token
    }

    /// Make every outstanding token stale
    pub fn invalidate_all(&self) {
        for class in RequestClass::ALL {
            self.next(class);
        }
    }
}

impl Default for RequestSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_at_one() {
        let seq = RequestSequencer::new();
        assert_eq!(seq.current(RequestClass::List), 0);
        assert_eq!(seq.next(RequestClass::List), 1);
        assert_eq!(seq.current(RequestClass::List), 1);
    }

    #[test]
    fn test_latest_token_wins() {
        let seq = RequestSequencer::new();
        let first = seq.next(RequestClass::Connect);
        let second = seq.next(RequestClass::Connect);
        assert!(second > first);
        assert!(!seq.is_current(RequestClass::Connect, first));
        assert!(seq.is_current(RequestClass::Connect, second));
    }

    #[test]
    fn test_independent_classes() {
        let seq = RequestSequencer::new();
        assert_eq!(seq.next(RequestClass::Connect), 1);
        assert_eq!(seq.next(RequestClass::List), 1);
        assert_eq!(seq.next(RequestClass::Connect), 2);
        assert_eq!(seq.current(RequestClass::List), 1);
    }

    #[test]
    fn test_invalidate_all() {
        let seq = RequestSequencer::new();
        let list = seq.next(RequestClass::List);
        let session = seq.current(RequestClass::Session);
        seq.invalidate_all();
        assert!(!seq.is_current(RequestClass::List, list));
        assert!(!seq.is_current(RequestClass::Session, session));
    }
}
