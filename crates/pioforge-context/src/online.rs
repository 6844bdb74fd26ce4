//! Which players have finished loading into the game.

use dashmap::DashMap;
use pioforge_protocol::{PlayerId, epoch_millis};

/// Players that sent `ic` (init complete) and have not disconnected.
///
/// Separate from the context tracker: a context exists from join, but a
/// player only counts as online once the client says it is ready.
#[derive(Default)]
pub struct OnlinePlayerRegistry {
    online: DashMap<PlayerId, i64>,
}

impl OnlinePlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a player online now. Re-marking keeps the original time.
    pub fn mark_online(&self, player_id: PlayerId) {
        self.online.entry(player_id).or_insert_with(epoch_millis);
    }

    /// Returns true if the player was online.
    pub fn mark_offline(&self, player_id: &PlayerId) -> bool {
        self.online.remove(player_id).is_some()
    }

    pub fn is_online(&self, player_id: &PlayerId) -> bool {
        self.online.contains_key(player_id)
    }

    /// Epoch milliseconds at which the player came online.
    pub fn online_since(&self, player_id: &PlayerId) -> Option<i64> {
        self.online.get(player_id).map(|entry| *entry.value())
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    pub fn clear(&self) {
        self.online.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_online_then_offline() {
        let registry = OnlinePlayerRegistry::new();
        let pid = PlayerId::new("p1");

        registry.mark_online(pid.clone());
        assert!(registry.is_online(&pid));
        assert_eq!(registry.online_count(), 1);

        assert!(registry.mark_offline(&pid));
        assert!(!registry.is_online(&pid));
        assert!(!registry.mark_offline(&pid));
    }

    #[test]
    fn test_mark_online_twice_keeps_first_timestamp() {
        let registry = OnlinePlayerRegistry::new();
        let pid = PlayerId::new("p1");

        registry.mark_online(pid.clone());
        let first = registry.online_since(&pid).unwrap();
        registry.mark_online(pid.clone());
        assert_eq!(registry.online_since(&pid), Some(first));
    }

    #[test]
    fn test_clear_empties_registry() {
        let registry = OnlinePlayerRegistry::new();
        registry.mark_online(PlayerId::new("a"));
        registry.mark_online(PlayerId::new("b"));
        registry.clear();
        assert_eq!(registry.online_count(), 0);
    }
}
