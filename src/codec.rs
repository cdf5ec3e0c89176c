//! Cache-file codec: persists and restores `(snapshot, key, result)`
//! triples, with lazy decoding of the result so `check` can validate
//! staleness without paying to decode a result it may discard.
//!
//! Uses a length-prefixed binary framing over `postcard` rather than a
//! plain-text format, since plain text has no way to defer decoding part
//! of a document without parsing the whole thing first.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::atomic;
use crate::error::CacheError;
use crate::model::Snapshot;

/// Bumping this invalidates every existing cache file on disk.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Serialize)]
struct HeaderWrite<'a, K> {
    version: u16,
    snapshot: &'a Snapshot,
    key: &'a K,
}

#[derive(Deserialize)]
struct HeaderRead<K> {
    version: u16,
    snapshot: Snapshot,
    key: K,
}

/// The decoded header of a cache file, with the result left as raw bytes
/// for deferred decoding.
pub struct DecodedHeader<K> {
    pub key: K,
    pub snapshot: Snapshot,
    result_bytes: Vec<u8>,
}

impl<K> DecodedHeader<K> {
    pub fn decode_result<V: DeserializeOwned>(&self) -> Result<V, CacheError> {
        Ok(postcard::from_bytes(&self.result_bytes)?)
    }

    /// Still-encoded result bytes, for writing back unchanged in a
    /// header-only rewrite.
    pub fn result_bytes(&self) -> &[u8] {
        &self.result_bytes
    }
}

pub fn decode_header<K: DeserializeOwned>(bytes: &[u8]) -> Result<DecodedHeader<K>, CacheError> {
    if bytes.len() < 4 {
        return Err(CacheError::Corrupt);
    }
    let (len_bytes, rest) = bytes.split_at(4);
    let header_len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;

    if rest.len() < header_len {
        return Err(CacheError::Corrupt);
    }
    let (header_bytes, result_bytes) = rest.split_at(header_len);

    let header: HeaderRead<K> = postcard::from_bytes(header_bytes)?;
    if header.version != FORMAT_VERSION {
        return Err(CacheError::Corrupt);
    }

    Ok(DecodedHeader {
        key: header.key,
        snapshot: header.snapshot,
        result_bytes: result_bytes.to_vec(),
    })
}

pub fn write_full<K: Serialize, V: Serialize>(
    path: &Path,
    snapshot: &Snapshot,
    key: &K,
    value: &V,
) -> Result<(), CacheError> {
    let result_bytes = postcard::to_allocvec(value)?;
    write_raw(path, snapshot, key, &result_bytes)
}

/// Writes without decoding or re-encoding the result value.
pub fn write_raw<K: Serialize>(
    path: &Path,
    snapshot: &Snapshot,
    key: &K,
    result_bytes: &[u8],
) -> Result<(), CacheError> {
    let header = HeaderWrite {
        version: FORMAT_VERSION,
        snapshot,
        key,
    };
    let header_bytes = postcard::to_allocvec(&header)?;

    let mut out = Vec::with_capacity(4 + header_bytes.len() + result_bytes.len());
    out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(result_bytes);

    atomic::write_file_atomic(path, &out)?;
    Ok(())
}
