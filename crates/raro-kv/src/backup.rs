use std::io::{Read, Write};

use crate::envelope::Envelope;
use crate::error::KvError;
use crate::Result;

pub(crate) struct Record {
    pub key: Vec<u8>,
    pub encoded_value: Vec<u8>,
}

/// Writes a consistent incremental snapshot: every `(key, value)` pair
/// whose envelope version is greater than `since_version`, as
/// length-prefixed records (`u32` key len, key, `u32` value len, value).
pub(crate) fn write_snapshot<'a, I>(mut writer: impl Write, entries: I, since_version: u64) -> Result<()>
where
    I: Iterator<Item = std::result::Result<(redb::AccessGuard<'a, &'static [u8]>, redb::AccessGuard<'a, &'static [u8]>), redb::StorageError>>,
{
    for entry in entries {
        let (k, v) = entry.map_err(KvError::from)?;
        let key = k.value().to_vec();
        let encoded = v.value().to_vec();
        let env = Envelope::decode(&encoded)?;
        if env.version <= since_version {
            continue;
        }
        writer.write_all(&(key.len() as u32).to_le_bytes())?;
        writer.write_all(&key)?;
        writer.write_all(&(encoded.len() as u32).to_le_bytes())?;
        writer.write_all(&encoded)?;
    }
    Ok(())
}

pub(crate) fn read_snapshot(mut reader: impl Read) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let key_len = u32::from_le_bytes(len_buf) as usize;
        let mut key = vec![0u8; key_len];
        reader.read_exact(&mut key)?;

        reader.read_exact(&mut len_buf)?;
        let value_len = u32::from_le_bytes(len_buf) as usize;
        let mut value = vec![0u8; value_len];
        reader.read_exact(&mut value)?;

        records.push(Record {
            key,
            encoded_value: value,
        });
    }
    Ok(records)
}
