use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, RwLock};

use bytes::Bytes;
use tokio::sync::watch;

/// Sharded in-memory storage: one array of shards for data, one for users.
///
/// Shard locks are std locks, not tokio locks. Every critical section is a
/// plain map operation (plus a non-blocking watch signal) and never awaits,
/// so holding a std guard inside an async task is fine and keeps the read
/// path cheap.
pub struct Store {
    data: Vec<RwLock<DataShard>>,
    users: Vec<Mutex<HashMap<String, String>>>,
}

/// One partition of the data key space.
///
/// Condition slots live next to the entries they watch: a slot is created
/// under this shard's write lock when a get-when registers, and writers
/// signal it under the same lock. The slot never moves to another shard.
#[derive(Default)]
struct DataShard {
    entries: HashMap<String, Bytes>,
    watches: HashMap<String, watch::Sender<()>>,
}

/// Result of the synchronous phase of a get-when.
pub enum WatchOutcome {
    /// The condition key already holds the wanted value.
    Satisfied,
    /// Not satisfied yet; the receiver is signalled on every write to the
    /// condition key. It was subscribed under the shard's write lock, so a
    /// write that lands after the equality check cannot be missed.
    Pending(watch::Receiver<()>),
}

impl Store {
    pub fn new(database_shards: usize, user_shards: usize) -> Store {
        assert!(database_shards > 0, "database shard count must be positive");
        assert!(user_shards > 0, "user shard count must be positive");

        Store {
            data: (0..database_shards).map(|_| RwLock::default()).collect(),
            users: (0..user_shards).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard_index(key: &str, count: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % count as u64) as usize
    }

    fn data_shard_index(&self, key: &str) -> usize {
        Self::shard_index(key, self.data.len())
    }

    fn user_shard_index(&self, key: &str) -> usize {
        Self::shard_index(key, self.users.len())
    }

    /// Inserts the pair and, still under the shard's write lock, signals any
    /// condition slot watching the key.
    pub fn put(&self, key: String, value: Bytes) {
        let index = self.data_shard_index(&key);
        let mut shard = self.data[index].write().unwrap();
        shard.entries.insert(key.clone(), value);
        notify_if_present(&shard.watches, &key);
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        let index = self.data_shard_index(key);
        let shard = self.data[index].read().unwrap();
        shard.entries.get(key).cloned()
    }

    /// Writes every pair, grouped by shard. All involved shard write locks
    /// are acquired in ascending shard-index order before any write, which
    /// is what prevents deadlock between concurrent batches; each lock is
    /// released as soon as its group is written. Atomic per shard only.
    pub fn multi_put(&self, pairs: Vec<(String, Bytes)>) {
        let mut groups: BTreeMap<usize, Vec<(String, Bytes)>> = BTreeMap::new();
        for (key, value) in pairs {
            groups.entry(self.data_shard_index(&key)).or_default().push((key, value));
        }

        let locked: Vec<_> = groups
            .keys()
            .map(|&index| self.data[index].write().unwrap())
            .collect();

        for (mut shard, group) in locked.into_iter().zip(groups.into_values()) {
            for (key, value) in group {
                shard.entries.insert(key.clone(), value);
                notify_if_present(&shard.watches, &key);
            }
        }
    }

    /// Reads every key, grouped by shard, acquiring read locks in ascending
    /// shard-index order. Every requested key appears in the result; absent
    /// keys map to `None`.
    pub fn multi_get(&self, keys: Vec<String>) -> Vec<(String, Option<Bytes>)> {
        let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for key in keys {
            groups.entry(self.data_shard_index(&key)).or_default().push(key);
        }

        let locked: Vec<_> = groups
            .keys()
            .map(|&index| self.data[index].read().unwrap())
            .collect();

        let mut pairs = Vec::new();
        for (shard, group) in locked.into_iter().zip(groups.into_values()) {
            for key in group {
                let value = shard.entries.get(&key).cloned();
                pairs.push((key, value));
            }
        }

        pairs
    }

    /// True iff the user exists and the password matches.
    pub fn auth(&self, username: &str, password: &str) -> bool {
        let index = self.user_shard_index(username);
        let shard = self.users[index].lock().unwrap();
        shard.get(username).is_some_and(|stored| stored == password)
    }

    /// False if the username is taken, true after inserting it.
    pub fn register(&self, username: String, password: String) -> bool {
        let index = self.user_shard_index(&username);
        let mut shard = self.users[index].lock().unwrap();
        if shard.contains_key(&username) {
            false
        } else {
            shard.insert(username, password);
            true
        }
    }

    /// Synchronous phase of a get-when: under the condition shard's write
    /// lock, get-or-create the condition slot and compare the current value
    /// byte-for-byte against `expected`. An absent key satisfies nothing.
    pub fn watch(&self, key: &str, expected: &Bytes) -> WatchOutcome {
        let index = self.data_shard_index(key);
        let mut shard = self.data[index].write().unwrap();

        let slot = shard
            .watches
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(()).0);
        let receiver = slot.subscribe();

        if shard.entries.get(key) == Some(expected) {
            WatchOutcome::Satisfied
        } else {
            WatchOutcome::Pending(receiver)
        }
    }

    /// Re-check used by background waiters after a wake-up.
    pub fn matches(&self, key: &str, expected: &Bytes) -> bool {
        let index = self.data_shard_index(key);
        let shard = self.data[index].read().unwrap();
        shard.entries.get(key) == Some(expected)
    }
}

fn notify_if_present(watches: &HashMap<String, watch::Sender<()>>, key: &str) {
    if let Some(slot) = watches.get(key) {
        tracing::debug!("signalling condition for key {:?}", key);
        // No receivers is fine; a slot can outlive its waiters.
        let _ = slot.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let store = Store::new(4, 1);

        store.put("key1".to_string(), Bytes::from("value1"));

        assert_eq!(store.get("key1"), Some(Bytes::from("value1")));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn put_overwrites() {
        let store = Store::new(4, 1);

        store.put("key1".to_string(), Bytes::from("old"));
        store.put("key1".to_string(), Bytes::from("new"));

        assert_eq!(store.get("key1"), Some(Bytes::from("new")));
    }

    #[test]
    fn shard_routing_is_deterministic() {
        let store = Store::new(7, 3);

        let first = store.data_shard_index("some-key");
        let second = store.data_shard_index("some-key");

        assert_eq!(first, second);
        assert!(first < 7);
    }

    #[test]
    fn multi_put_then_multi_get_round_trips() {
        let store = Store::new(4, 1);

        store.multi_put(vec![
            ("a".to_string(), Bytes::from("A")),
            ("b".to_string(), Bytes::from("B")),
            ("c".to_string(), Bytes::from("C")),
        ]);

        let mut fetched = store.multi_get(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]);
        fetched.sort();

        assert_eq!(
            fetched,
            vec![
                ("a".to_string(), Some(Bytes::from("A"))),
                ("b".to_string(), Some(Bytes::from("B"))),
                ("c".to_string(), Some(Bytes::from("C"))),
            ]
        );
    }

    #[test]
    fn multi_get_maps_absent_keys_to_none() {
        let store = Store::new(4, 1);

        store.put("present".to_string(), Bytes::from("yes"));

        let mut fetched = store.multi_get(vec!["present".to_string(), "absent".to_string()]);
        fetched.sort();

        assert_eq!(
            fetched,
            vec![
                ("absent".to_string(), None),
                ("present".to_string(), Some(Bytes::from("yes"))),
            ]
        );
    }

    #[test]
    fn register_then_auth() {
        let store = Store::new(1, 4);

        assert!(store.register("ada".to_string(), "pw".to_string()));
        assert!(store.auth("ada", "pw"));
        assert!(!store.auth("ada", "wrong"));
        assert!(!store.auth("nobody", "pw"));
    }

    #[test]
    fn register_existing_user_fails() {
        let store = Store::new(1, 4);

        assert!(store.register("ada".to_string(), "pw".to_string()));
        assert!(!store.register("ada".to_string(), "other".to_string()));
        // The original password survives the failed re-registration.
        assert!(store.auth("ada", "pw"));
        assert!(!store.auth("ada", "other"));
    }

    #[test]
    fn watch_satisfied_when_value_matches() {
        let store = Store::new(4, 1);

        store.put("flag".to_string(), Bytes::from(vec![0x01]));

        let outcome = store.watch("flag", &Bytes::from(vec![0x01]));
        assert!(matches!(outcome, WatchOutcome::Satisfied));
    }

    #[test]
    fn watch_pending_when_value_differs_or_absent() {
        let store = Store::new(4, 1);

        assert!(matches!(
            store.watch("flag", &Bytes::from(vec![0x01])),
            WatchOutcome::Pending(_)
        ));

        store.put("flag".to_string(), Bytes::from(vec![0x00]));

        assert!(matches!(
            store.watch("flag", &Bytes::from(vec![0x01])),
            WatchOutcome::Pending(_)
        ));
    }

    #[tokio::test]
    async fn put_signals_pending_watch() {
        let store = Store::new(4, 1);

        let mut receiver = match store.watch("flag", &Bytes::from(vec![0x01])) {
            WatchOutcome::Pending(receiver) => receiver,
            WatchOutcome::Satisfied => panic!("no value written yet"),
        };

        store.put("flag".to_string(), Bytes::from(vec![0x01]));

        receiver.changed().await.unwrap();
        assert!(store.matches("flag", &Bytes::from(vec![0x01])));
    }

    #[tokio::test]
    async fn multi_put_signals_pending_watch() {
        let store = Store::new(4, 1);

        let mut receiver = match store.watch("flag", &Bytes::from(vec![0x01])) {
            WatchOutcome::Pending(receiver) => receiver,
            WatchOutcome::Satisfied => panic!("no value written yet"),
        };

        store.multi_put(vec![
            ("other".to_string(), Bytes::from("x")),
            ("flag".to_string(), Bytes::from(vec![0x01])),
        ]);

        receiver.changed().await.unwrap();
        assert!(store.matches("flag", &Bytes::from(vec![0x01])));
    }
}
