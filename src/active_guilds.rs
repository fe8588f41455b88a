use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Process-wide set of guilds whose messages are worth scanning: bullets
/// enabled and not in command-only mode. Lets the message hot path skip a
/// database round trip for inactive guilds.
///
/// Eventually consistent with the persisted config; every code path that
/// flips either condition (config commands, completion, reveal-channel loss,
/// guild leave) updates it.
#[derive(Clone)]
pub struct ActiveGuilds {
    inner: Arc<Mutex<HashSet<u64>>>,
}

impl ActiveGuilds {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replaces the set wholesale; used at startup from the persisted config.
    pub fn seed(&self, guild_ids: impl IntoIterator<Item = u64>) {
        let mut set = self.inner.lock().unwrap();
        set.clear();
        set.extend(guild_ids);
    }

    pub fn contains(&self, guild_id: u64) -> bool {
        self.inner.lock().unwrap().contains(&guild_id)
    }

    pub fn insert(&self, guild_id: u64) {
        self.inner.lock().unwrap().insert(guild_id);
    }

    pub fn remove(&self, guild_id: u64) {
        self.inner.lock().unwrap().remove(&guild_id);
    }
}

impl Default for ActiveGuilds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_contains() {
        let cache = ActiveGuilds::new();
        assert!(!cache.contains(1));

        cache.insert(1);
        assert!(cache.contains(1));

        cache.remove(1);
        assert!(!cache.contains(1));
        // Removing an absent guild is harmless.
        cache.remove(1);
    }

    #[test]
    fn test_seed_replaces_contents() {
        let cache = ActiveGuilds::new();
        cache.insert(1);
        cache.seed([2, 3]);
        assert!(!cache.contains(1));
        assert!(cache.contains(2) && cache.contains(3));
    }
}
