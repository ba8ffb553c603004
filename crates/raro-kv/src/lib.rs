// crates/raro-kv/src/lib.rs
// Purpose: Embedded, ordered, ACID-transactional key-value store.
// Architecture: Thin wrapper over redb, adding a TTL envelope and a
//   monotonic store-wide version counter used by backup/restore.
// Dependencies: redb, bincode, tokio (background TTL sweep only)

mod backup;
mod envelope;
mod error;
mod txn;

pub use error::KvError;
pub use txn::{ReadTxn, Transaction, WriteTxn};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableTable, TableDefinition};

use envelope::{now_ms, Envelope};

pub type Result<T> = std::result::Result<T, KvError>;

pub(crate) const MAIN_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv_main");
pub(crate) const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("kv_meta");
const VERSION_KEY: &str = "version";

#[derive(Debug, Clone, Copy)]
pub struct KvInfo {
    pub entry_count: u64,
    pub version: u64,
}

/// An embedded ordered KV store.
///
/// Keys are kept in byte-lexicographic order by the backing redb table, so
/// `scan` naturally returns matches in key order. Writers are serialized by
/// redb's single-writer model; reads may run concurrently with the active
/// writer against the last-committed snapshot.
pub struct KvStore {
    db: Arc<Database>,
    closed: std::sync::atomic::AtomicBool,
}

impl KvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;
        let store = Self {
            db: Arc::new(db),
            closed: std::sync::atomic::AtomicBool::new(false),
        };
        store.ensure_tables()?;
        tracing::info!(path = %path.as_ref().display(), "kv store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            txn.open_table(MAIN_TABLE)?;
            txn.open_table(META_TABLE)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(KvError::Closed);
        }
        Ok(())
    }

    fn next_version(&self) -> Result<u64> {
        let write = self.db.begin_write()?;
        let next = {
            let mut meta = write.open_table(META_TABLE)?;
            let current = meta.get(VERSION_KEY)?.map(|v| v.value()).unwrap_or(0);
            let next = current + 1;
            meta.insert(VERSION_KEY, next)?;
            next
        };
        write.commit()?;
        Ok(next)
    }

    fn current_version(&self) -> Result<u64> {
        let read = self.db.begin_read()?;
        let meta = read.open_table(META_TABLE)?;
        Ok(meta.get(VERSION_KEY)?.map(|v| v.value()).unwrap_or(0))
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        let read = self.db.begin_read()?;
        let table = read.open_table(MAIN_TABLE)?;
        match table.get(key)? {
            Some(raw) => {
                let env = Envelope::decode(raw.value())?;
                if env.is_expired(now_ms()) {
                    drop(table);
                    drop(read);
                    let _ = self.delete(key);
                    Ok(None)
                } else {
                    Ok(Some(env.bytes))
                }
            }
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.set_with_ttl_opt(key, value, None)
    }

    pub fn set_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        self.set_with_ttl_opt(key, value, Some(ttl))
    }

    fn set_with_ttl_opt(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.check_open()?;
        let version = self.next_version()?;
        let expires_at_ms = ttl.map(|d| now_ms() + d.as_millis() as i64);
        let env = Envelope::fresh(value.to_vec(), version, expires_at_ms);
        let encoded = env.encode()?;
        let write = self.db.begin_write()?;
        {
            let mut table = write.open_table(MAIN_TABLE)?;
            table.insert(key, encoded.as_slice())?;
        }
        write.commit()?;
        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_open()?;
        let write = self.db.begin_write()?;
        {
            let mut table = write.open_table(MAIN_TABLE)?;
            table.remove(key)?;
        }
        write.commit()?;
        Ok(())
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn batch_set(&self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        self.check_open()?;
        let version = self.next_version()?;
        let write = self.db.begin_write()?;
        {
            let mut table = write.open_table(MAIN_TABLE)?;
            for (k, v) in items {
                let env = Envelope::fresh(v.clone(), version, None);
                table.insert(k.as_slice(), env.encode()?.as_slice())?;
            }
        }
        write.commit()?;
        Ok(())
    }

    pub fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    /// Returns entries whose key starts with `prefix`, in key order, capped
    /// at `limit` entries (`None` means unbounded).
    pub fn scan(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check_open()?;
        let read = self.db.begin_read()?;
        let table = read.open_table(MAIN_TABLE)?;
        let mut out = Vec::new();
        let now = now_ms();
        for entry in table.range(prefix.to_vec().as_slice()..)? {
            let (k, v) = entry?;
            let key_bytes = k.value();
            if !key_bytes.starts_with(prefix) {
                break;
            }
            let env = Envelope::decode(v.value())?;
            if env.is_expired(now) {
                continue;
            }
            out.push((key_bytes.to_vec(), env.bytes));
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    pub fn new_transaction(&self, writable: bool) -> Result<Transaction> {
        self.check_open()?;
        if writable {
            let version = self.next_version()?;
            Ok(Transaction::Write(WriteTxn::new(self.db.begin_write()?, version)))
        } else {
            Ok(Transaction::Read(ReadTxn::new(self.db.begin_read()?)))
        }
    }

    /// Runs `f` inside a fresh write transaction, committing on `Ok` and
    /// discarding (no-op, redb rolls back on drop) on `Err`. Generic over
    /// the closure's error type so callers layered on top (graph, query,
    /// transaction manager) can propagate their own error enum through `?`
    /// instead of round-tripping through [`KvError`].
    pub fn update<F, R, E>(&self, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&WriteTxn) -> std::result::Result<R, E>,
        E: From<KvError>,
    {
        self.check_open()?;
        let version = self.next_version()?;
        let txn = WriteTxn::new(self.db.begin_write()?, version);
        let result = f(&txn)?;
        txn.commit()?;
        Ok(result)
    }

    /// Runs `f` inside a read-only snapshot transaction.
    pub fn view<F, R, E>(&self, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&ReadTxn) -> std::result::Result<R, E>,
        E: From<KvError>,
    {
        self.check_open()?;
        let txn = ReadTxn::new(self.db.begin_read()?);
        f(&txn)
    }

    /// Serializes every entry with `version > since_version` as a stream of
    /// length-prefixed bincode records.
    pub fn backup(&self, writer: impl std::io::Write, since_version: u64) -> Result<()> {
        self.check_open()?;
        let read = self.db.begin_read()?;
        let table = read.open_table(MAIN_TABLE)?;
        backup::write_snapshot(writer, table.iter()?, since_version)
    }

    /// Replays a stream produced by [`KvStore::backup`].
    pub fn load(&self, reader: impl std::io::Read) -> Result<()> {
        self.check_open()?;
        let records = backup::read_snapshot(reader)?;
        let write = self.db.begin_write()?;
        {
            let mut table = write.open_table(MAIN_TABLE)?;
            for record in records {
                table.insert(record.key.as_slice(), record.encoded_value.as_slice())?;
            }
        }
        write.commit()?;
        Ok(())
    }

    pub fn size(&self) -> Result<u64> {
        let read = self.db.begin_read()?;
        let table = read.open_table(MAIN_TABLE)?;
        Ok(table.len()?)
    }

    pub fn info(&self) -> Result<KvInfo> {
        Ok(KvInfo {
            entry_count: self.size()?,
            version: self.current_version()?,
        })
    }

    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("kv store closed");
    }

    /// Spawns a background task that periodically sweeps expired entries.
    /// Stands in for compaction: redb reclaims space for removed keys on
    /// its own, this task only evicts TTL-expired entries proactively
    /// instead of waiting for the next read to notice them.
    pub fn spawn_ttl_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = store.sweep_expired() {
                    tracing::warn!(error = %e, "ttl sweep failed");
                }
            }
        })
    }

    fn sweep_expired(&self) -> Result<()> {
        self.check_open()?;
        let now = now_ms();
        let expired_keys: Vec<Vec<u8>> = {
            let read = self.db.begin_read()?;
            let table = read.open_table(MAIN_TABLE)?;
            let mut keys = Vec::new();
            for entry in table.iter()? {
                let (k, v) = entry?;
                let env = Envelope::decode(v.value())?;
                if env.is_expired(now) {
                    keys.push(k.value().to_vec());
                }
            }
            keys
        };
        if expired_keys.is_empty() {
            return Ok(());
        }
        let write = self.db.begin_write()?;
        {
            let mut table = write.open_table(MAIN_TABLE)?;
            for key in &expired_keys {
                table.remove(key.as_slice())?;
            }
        }
        write.commit()?;
        tracing::debug!(count = expired_keys.len(), "swept expired keys");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, KvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path().join("kv.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn kv_round_trip() {
        let (_dir, store) = temp_store();
        store.set(b"k1", b"v1").unwrap();
        store.set(b"k2", b"v2").unwrap();
        store.delete(b"k1").unwrap();
        let results = store.scan(b"k", None).unwrap();
        assert_eq!(results, vec![(b"k2".to_vec(), b"v2".to_vec())]);
    }

    #[test]
    fn scan_returns_keys_in_order() {
        let (_dir, store) = temp_store();
        for k in ["b", "a", "c"] {
            store.set(k.as_bytes(), b"x").unwrap();
        }
        let keys: Vec<Vec<u8>> = store
            .scan(b"", None)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn ttl_expired_entries_are_hidden_on_read() {
        let (_dir, store) = temp_store();
        store
            .set_with_ttl(b"k", b"v", Duration::from_millis(0))
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get(b"k").unwrap(), None);
    }

    #[test]
    fn closed_store_rejects_ops() {
        let (_dir, store) = temp_store();
        store.close();
        assert!(matches!(store.get(b"k").unwrap_err(), KvError::Closed));
    }
}
