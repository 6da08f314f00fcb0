//! # Snapshot Codec
//!
//! Binary container for the record index.
//!
//! ```text
//! magic   "TCLD"      4 bytes
//! version u16 LE      currently 1
//! digest  [u8; 32]    SHA-256 of the compressed payload
//! payload             zstd-compressed JSON { "version": 1, "records": [...] }
//! ```
//!
//! The digest covers every payload byte, so a truncated or partially
//! overwritten file never decodes.

use super::FileRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"TCLD";
pub const FORMAT_VERSION: u16 = 1;

const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 2 + DIGEST_LEN;
const COMPRESSION_LEVEL: i32 = 3;

/// Upper bound on the decompressed body.
const MAX_DECOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot is truncated ({0} bytes)")]
    Truncated(usize),

    #[error("bad magic bytes")]
    BadMagic,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u16),

    #[error("payload digest mismatch")]
    DigestMismatch,

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("invalid snapshot body: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct BodyRef<'a> {
    version: u16,
    records: &'a [FileRecord],
}

#[derive(Deserialize)]
struct Body {
    version: u16,
    records: Vec<FileRecord>,
}

pub fn encode(records: &[FileRecord]) -> Result<Vec<u8>, SnapshotError> {
    let json = serde_json::to_vec(&BodyRef {
        version: FORMAT_VERSION,
        records,
    })?;
    let payload = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
        .map_err(|e| SnapshotError::Compression(e.to_string()))?;
    let digest = Sha256::digest(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(digest.as_slice());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Vec<FileRecord>, SnapshotError> {
    if bytes.len() <= HEADER_LEN {
        return Err(SnapshotError::Truncated(bytes.len()));
    }

    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(SnapshotError::BadMagic);
    }

    let (version, rest) = rest.split_at(2);
    let version = u16::from_le_bytes([version[0], version[1]]);
    if version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }

    let (digest, payload) = rest.split_at(DIGEST_LEN);
    if Sha256::digest(payload).as_slice() != digest {
        return Err(SnapshotError::DigestMismatch);
    }

    let json = decompress(payload)?;
    let body: Body = serde_json::from_slice(&json)?;
    if body.version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(body.version));
    }

    Ok(body.records)
}

fn decompress(payload: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    use std::io::Read;

    let mut decoder = zstd::stream::Decoder::new(payload)
        .map_err(|e| SnapshotError::Decompression(format!("zstd init: {e}")))?;
    let mut output = Vec::new();
    decoder
        .by_ref()
        .take(MAX_DECOMPRESSED_SIZE + 1)
        .read_to_end(&mut output)
        .map_err(|e| SnapshotError::Decompression(format!("zstd: {e}")))?;

    if output.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(SnapshotError::Decompression(
            "decompressed size exceeds limit".to_string(),
        ));
    }

    Ok(output)
}
