//! Bounded table of running encode jobs with LRU eviction.
//!
//! Victim selection, removal and insertion happen under a single lock
//! acquisition. Stopping victims and deleting their directories happens
//! after the lock is released, so slow encoders never block other keys.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use stillcast_av::Termination;
use stillcast_common::StreamKey;
use tokio::task::JoinSet;

use super::launcher::JobProcess;
use super::store::ArtifactStore;

struct JobEntry {
    process: Box<dyn JobProcess>,
    last_access: Instant,
    tick: u64,
}

#[derive(Default)]
struct Table {
    entries: HashMap<StreamKey, JobEntry>,
    next_tick: u64,
}

impl Table {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    /// Remove the `count` least recently accessed entries.
    fn take_lru(&mut self, count: usize) -> Vec<Victim> {
        let mut order: Vec<(u64, StreamKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.tick, key.clone()))
            .collect();
        order.sort_unstable();

        order
            .into_iter()
            .take(count)
            .filter_map(|(_, key)| {
                let entry = self.entries.remove(&key)?;
                Some(Victim {
                    key,
                    process: entry.process,
                    delete_dir: true,
                })
            })
            .collect()
    }
}

/// A job removed from the table, still to be stopped.
struct Victim {
    key: StreamKey,
    process: Box<dyn JobProcess>,
    delete_dir: bool,
}

/// Registry view of one job's encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    /// Exited on its own, with the OS exit status.
    Exited(String),
    /// Not registered: evicted, shut down, or never admitted.
    Gone,
}

/// Status view of one registered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub key: StreamKey,
    pub pid: Option<u32>,
    pub idle_secs: u64,
}

/// Registry of running encoders, capped at `capacity`.
pub struct JobRegistry {
    table: Mutex<Table>,
    capacity: usize,
    store: ArtifactStore,
    grace: Duration,
}

impl JobRegistry {
    /// `capacity` is clamped to at least one.
    pub fn new(capacity: usize, store: ArtifactStore, grace: Duration) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            capacity: capacity.max(1),
            store,
            grace,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &StreamKey) -> bool {
        self.table.lock().entries.contains_key(key)
    }

    /// Free one slot if the table is full.
    pub async fn make_room(&self) {
        let victims = {
            let mut table = self.table.lock();
            let len = table.entries.len();
            if len >= self.capacity {
                table.take_lru(len + 1 - self.capacity)
            } else {
                Vec::new()
            }
        };
        self.reap(victims).await;
    }

    /// Register a freshly launched job, evicting whatever is needed to stay
    /// within capacity. A previous process for the same key is stopped but
    /// its directory, now shared with the new job, is kept.
    pub async fn admit(&self, key: StreamKey, process: Box<dyn JobProcess>) {
        let victims = {
            let mut table = self.table.lock();
            let mut victims = Vec::new();

            if let Some(old) = table.entries.remove(&key) {
                victims.push(Victim {
                    key: key.clone(),
                    process: old.process,
                    delete_dir: false,
                });
            }

            let len = table.entries.len();
            if len + 1 > self.capacity {
                victims.extend(table.take_lru(len + 1 - self.capacity));
            }

            let tick = table.tick();
            tracing::info!(key = %key, pid = ?process.id(), "Registered encoder");
            table.entries.insert(
                key,
                JobEntry {
                    process,
                    last_access: Instant::now(),
                    tick,
                },
            );
            victims
        };
        self.reap(victims).await;
    }

    /// Mark a job as just used. Returns `false` if the key is not registered.
    pub fn touch(&self, key: &StreamKey) -> bool {
        let mut table = self.table.lock();
        let tick = table.tick();
        match table.entries.get_mut(key) {
            Some(entry) => {
                entry.tick = tick;
                entry.last_access = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Stop one job and delete its directory.
    pub async fn evict(&self, key: &StreamKey) -> bool {
        let victim = self.table.lock().entries.remove(key).map(|entry| Victim {
            key: key.clone(),
            process: entry.process,
            delete_dir: true,
        });
        let found = victim.is_some();
        self.reap(victim.into_iter().collect()).await;
        found
    }

    /// Whether the encoder for `key` is still registered, and still running.
    pub fn state(&self, key: &StreamKey) -> JobState {
        match self.table.lock().entries.get_mut(key) {
            Some(entry) => match entry.process.exit_status() {
                Some(status) => JobState::Exited(status),
                None => JobState::Running,
            },
            None => JobState::Gone,
        }
    }

    /// Registered jobs, most recently used first.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        let table = self.table.lock();
        let mut jobs: Vec<(u64, JobSnapshot)> = table
            .entries
            .iter()
            .map(|(key, entry)| {
                (
                    entry.tick,
                    JobSnapshot {
                        key: key.clone(),
                        pid: entry.process.id(),
                        idle_secs: entry.last_access.elapsed().as_secs(),
                    },
                )
            })
            .collect();
        jobs.sort_by(|a, b| b.0.cmp(&a.0));
        jobs.into_iter().map(|(_, job)| job).collect()
    }

    /// Stop every job. Directories are kept and served as cache on the next
    /// start.
    pub async fn shutdown(&self) {
        let victims: Vec<Victim> = self
            .table
            .lock()
            .entries
            .drain()
            .map(|(key, entry)| Victim {
                key,
                process: entry.process,
                delete_dir: false,
            })
            .collect();

        if !victims.is_empty() {
            tracing::info!("Stopping {} encoder(s)", victims.len());
        }
        self.reap(victims).await;
    }

    async fn reap(&self, victims: Vec<Victim>) {
        if victims.is_empty() {
            return;
        }

        let mut tasks = JoinSet::new();
        for mut victim in victims {
            let grace = self.grace;
            let store = self.store.clone();
            tasks.spawn(async move {
                match victim.process.terminate(grace).await {
                    Ok(Termination::Killed) => {
                        tracing::warn!(key = %victim.key, "Encoder ignored SIGTERM, killed")
                    }
                    Ok(outcome) => {
                        tracing::debug!(key = %victim.key, ?outcome, "Encoder stopped")
                    }
                    Err(e) => {
                        tracing::warn!(key = %victim.key, error = %e, "Failed to stop encoder")
                    }
                }
                if victim.delete_dir {
                    store.delete(&victim.key).await;
                }
                tracing::info!(key = %victim.key, "Evicted stream");
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Eviction task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct FakeProcess {
        terminated: Arc<AtomicBool>,
        exited: Option<String>,
    }

    #[async_trait]
    impl JobProcess for FakeProcess {
        fn id(&self) -> Option<u32> {
            Some(42)
        }

        fn exit_status(&mut self) -> Option<String> {
            self.exited.clone()
        }

        async fn terminate(&mut self, _grace: Duration) -> stillcast_av::Result<Termination> {
            self.terminated.store(true, Ordering::SeqCst);
            Ok(Termination::Graceful)
        }
    }

    fn fake() -> (Box<dyn JobProcess>, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        let process = FakeProcess {
            terminated: flag.clone(),
            exited: None,
        };
        (Box::new(process), flag)
    }

    fn key(n: usize) -> StreamKey {
        StreamKey::digest(format!("https://example.com/{n}.jpg"))
    }

    fn registry(capacity: usize, tmp: &tempfile::TempDir) -> JobRegistry {
        JobRegistry::new(capacity, ArtifactStore::new(tmp.path()), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(4, &tmp);
        let store = ArtifactStore::new(tmp.path());

        let mut flags = Vec::new();
        for n in 0..5 {
            store.prepare(&key(n)).await.unwrap();
            let (process, flag) = fake();
            flags.push(flag);
            registry.admit(key(n), process).await;
            assert!(registry.len() <= 4);
        }

        assert_eq!(registry.len(), 4);
        assert!(!registry.contains(&key(0)));
        assert!(flags[0].load(Ordering::SeqCst));
        assert!(!store.dir(&key(0)).exists());
        for n in 1..5 {
            assert!(registry.contains(&key(n)));
            assert!(!flags[n].load(Ordering::SeqCst));
            assert!(store.dir(&key(n)).exists());
        }
    }

    #[tokio::test]
    async fn test_touch_protects_from_eviction() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(2, &tmp);

        registry.admit(key(0), fake().0).await;
        registry.admit(key(1), fake().0).await;
        assert!(registry.touch(&key(0)));
        registry.admit(key(2), fake().0).await;

        assert!(registry.contains(&key(0)));
        assert!(!registry.contains(&key(1)));
        assert!(registry.contains(&key(2)));
    }

    #[tokio::test]
    async fn test_touch_unknown_key() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(2, &tmp);
        assert!(!registry.touch(&key(9)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_make_room_frees_one_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(2, &tmp);
        registry.admit(key(0), fake().0).await;

        registry.make_room().await;
        assert_eq!(registry.len(), 1);

        registry.admit(key(1), fake().0).await;
        registry.make_room().await;
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&key(1)));
    }

    #[tokio::test]
    async fn test_readmit_same_key_keeps_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(2, &tmp);
        let store = ArtifactStore::new(tmp.path());
        store.prepare(&key(0)).await.unwrap();

        let (first, first_flag) = fake();
        registry.admit(key(0), first).await;
        registry.admit(key(0), fake().0).await;

        assert!(first_flag.load(Ordering::SeqCst));
        assert_eq!(registry.len(), 1);
        assert!(store.dir(&key(0)).exists());
    }

    #[tokio::test]
    async fn test_evict_and_state() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(2, &tmp);
        let exited = FakeProcess {
            exited: Some("exit status: 1".into()),
            ..Default::default()
        };
        registry.admit(key(0), Box::new(exited)).await;
        registry.admit(key(1), Box::new(FakeProcess::default())).await;

        assert_eq!(registry.state(&key(0)), JobState::Exited("exit status: 1".into()));
        assert_eq!(registry.state(&key(1)), JobState::Running);
        assert!(registry.evict(&key(0)).await);
        assert!(!registry.evict(&key(0)).await);
        assert_eq!(registry.state(&key(0)), JobState::Gone);
    }

    #[tokio::test]
    async fn test_shutdown_keeps_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(3, &tmp);
        let store = ArtifactStore::new(tmp.path());

        let mut flags = Vec::new();
        for n in 0..3 {
            store.prepare(&key(n)).await.unwrap();
            let (process, flag) = fake();
            flags.push(flag);
            registry.admit(key(n), process).await;
        }

        registry.shutdown().await;
        assert!(registry.is_empty());
        for n in 0..3 {
            assert!(flags[n].load(Ordering::SeqCst));
            assert!(store.dir(&key(n)).exists());
        }
    }

    #[tokio::test]
    async fn test_snapshot_most_recent_first() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(3, &tmp);
        registry.admit(key(0), fake().0).await;
        registry.admit(key(1), fake().0).await;
        registry.touch(&key(0));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].key, key(0));
        assert_eq!(snapshot[0].pid, Some(42));
    }

    #[tokio::test]
    async fn test_lru_never_evicts_newer_than_survivor() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry(3, &tmp);
        let order = [0, 1, 2, 0, 3, 1, 4, 0, 5];

        for n in order {
            if !registry.touch(&key(n)) {
                registry.admit(key(n), fake().0).await;
            }
            assert!(registry.len() <= 3);
        }

        // Last three distinct accesses were 4, 0, 5.
        for n in [4, 0, 5] {
            assert!(registry.contains(&key(n)));
        }
        assert_eq!(registry.len(), 3);
    }
}
