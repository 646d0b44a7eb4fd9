use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Process-wide named boolean tokens used to guard FSM arcs.
///
/// Cloning yields another handle to the same registry. A token is either
/// held or free; there is no notion of who holds it, so any arc in any FSM
/// may release it.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    held: Arc<Mutex<BTreeSet<String>>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as held. Fails if it is already held.
    pub fn try_acquire(&self, name: &str) -> bool {
        let acquired = self.lock().insert(name.to_string());
        tracing::trace!(token = name, acquired, "token acquire");
        acquired
    }

    /// Free `name`. Releasing a free token is a no-op.
    pub fn release(&self, name: &str) {
        if self.lock().remove(name) {
            tracing::trace!(token = name, "token released");
        }
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// Names of all held tokens, sorted.
    pub fn held(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        // The set is always consistent between calls, so a poisoned lock is usable.
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_round_trip() {
        let tokens = TokenRegistry::new();
        assert!(tokens.try_acquire("X"));
        assert!(!tokens.try_acquire("X"));
        tokens.release("X");
        assert!(tokens.try_acquire("X"));
    }

    #[test]
    fn release_is_idempotent() {
        let tokens = TokenRegistry::new();
        tokens.release("never-held");
        tokens.try_acquire("X");
        tokens.release("X");
        tokens.release("X");
        assert!(!tokens.is_held("X"));
    }

    #[test]
    fn clones_share_state() {
        let a = TokenRegistry::new();
        let b = a.clone();
        assert!(a.try_acquire("Input Focus"));
        assert!(b.is_held("Input Focus"));
        assert!(!b.try_acquire("Input Focus"));
        b.release("Input Focus");
        assert!(!a.is_held("Input Focus"));
    }

    #[test]
    fn held_is_sorted() {
        let tokens = TokenRegistry::new();
        tokens.try_acquire("b");
        tokens.try_acquire("a");
        assert_eq!(tokens.held(), ["a", "b"]);
    }

    #[test]
    fn only_one_thread_wins() {
        let tokens = TokenRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = tokens.clone();
                std::thread::spawn(move || t.try_acquire("drag"))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
