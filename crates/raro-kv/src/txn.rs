use redb::ReadableTable;

use crate::envelope::{now_ms, Envelope};
use crate::error::KvError;
use crate::{Result, MAIN_TABLE};

/// An explicit, caller-driven write transaction. Prefer [`crate::KvStore::update`]
/// unless the caller genuinely needs to hold the transaction open across
/// several separate calls (e.g. the transaction manager composing KV writes
/// with graph writes).
pub struct WriteTxn {
    inner: redb::WriteTransaction,
    version: u64,
}

impl WriteTxn {
    pub(crate) fn new(inner: redb::WriteTransaction, version: u64) -> Self {
        Self { inner, version }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.inner.open_table(MAIN_TABLE)?;
        match table.get(key)? {
            Some(raw) => {
                let env = Envelope::decode(raw.value())?;
                if env.is_expired(now_ms()) {
                    Ok(None)
                } else {
                    Ok(Some(env.bytes))
                }
            }
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let env = Envelope::fresh(value.to_vec(), self.version, None);
        let mut table = self.inner.open_table(MAIN_TABLE)?;
        table.insert(key, env.encode()?.as_slice())?;
        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut table = self.inner.open_table(MAIN_TABLE)?;
        table.remove(key)?;
        Ok(())
    }

    /// Keys (and values) with the given prefix, in key order, as seen by
    /// this transaction (its own uncommitted writes included).
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self.inner.open_table(MAIN_TABLE)?;
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
        }
        Ok(out)
    }

    pub fn commit(self) -> Result<()> {
        self.inner.commit().map_err(KvError::from)
    }

    /// Discards all writes made in this transaction. Equivalent to letting
    /// the transaction drop without committing, spelled out for callers
    /// that want the intent to read clearly at the call site.
    pub fn rollback(self) {
        drop(self.inner);
    }
}

/// A read-only snapshot transaction.
pub struct ReadTxn {
    inner: redb::ReadTransaction,
}

impl ReadTxn {
    pub(crate) fn new(inner: redb::ReadTransaction) -> Self {
        Self { inner }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.inner.open_table(MAIN_TABLE)?;
        match table.get(key)? {
            Some(raw) => {
                let env = Envelope::decode(raw.value())?;
                if env.is_expired(now_ms()) {
                    Ok(None)
                } else {
                    Ok(Some(env.bytes))
                }
            }
            None => Ok(None),
        }
    }

    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self.inner.open_table(MAIN_TABLE)?;
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
        }
        Ok(out)
    }
}

/// A transaction handle returned by `new_transaction`, spanning both the
/// writable and read-only cases the operation's `writable` flag selects.
pub enum Transaction {
    Write(WriteTxn),
    Read(ReadTxn),
}

impl Transaction {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            Transaction::Write(t) => t.get(key),
            Transaction::Read(t) => t.get(key),
        }
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        match self {
            Transaction::Write(t) => t.set(key, value),
            Transaction::Read(_) => Err(KvError::ReadOnly),
        }
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        match self {
            Transaction::Write(t) => t.delete(key),
            Transaction::Read(_) => Err(KvError::ReadOnly),
        }
    }

    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        match self {
            Transaction::Write(t) => t.scan_prefix(prefix),
            Transaction::Read(t) => t.scan_prefix(prefix),
        }
    }

    pub fn commit(self) -> Result<()> {
        match self {
            Transaction::Write(t) => t.commit(),
            Transaction::Read(_) => Ok(()),
        }
    }

    pub fn rollback(self) {
        match self {
            Transaction::Write(t) => t.rollback(),
            Transaction::Read(_) => {}
        }
    }
}
