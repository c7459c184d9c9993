use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Per-token logical locks. Acquisition is non-blocking: a busy token
/// is skipped for this tick rather than queued, which keeps tick
/// duration bounded and prevents the scheduler and claimer from racing
/// on the same ops wallet.
#[derive(Clone, Default)]
pub struct TokenLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl TokenLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, token_id: &str) -> Option<TokenGuard> {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        if held.contains(token_id) {
            return None;
        }
        held.insert(token_id.to_string());
        Some(TokenGuard {
            held: Arc::clone(&self.held),
            token_id: token_id.to_string(),
        })
    }
}

pub struct TokenGuard {
    held: Arc<Mutex<HashSet<String>>>,
    token_id: String,
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        held.remove(&self.token_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_guard_drops() {
        let locks = TokenLocks::new();
        let guard = locks.try_acquire("t1").expect("first acquire");
        assert!(locks.try_acquire("t1").is_none());
        assert!(locks.try_acquire("t2").is_some());
        drop(guard);
        assert!(locks.try_acquire("t1").is_some());
    }
}
