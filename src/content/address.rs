//! Content addressing
//!
//! Content hashes are IPFS-compatible CIDs. When a client does not supply
//! one we derive a CIDv1 (raw codec, sha2-256) from the bytes ourselves.
//!
//! Accepted address forms:
//! - CID: `bafkrei...` (v1) or `Qm...` (v0)
//! - SHA256 prefixed: `sha256-<64 hex>`
//! - Raw SHA256 hex: `<64 hex>`

use std::str::FromStr;

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use sha2::{Digest, Sha256};

use crate::types::ViviError;

/// Multicodec code for raw bytes
const RAW_CODEC: u64 = 0x55;

/// CIDv1 (raw, sha2-256) of `data`, in its default base32 string form
pub fn content_address(data: &[u8]) -> String {
    let hash = Code::Sha2_256.digest(data);
    Cid::new_v1(RAW_CODEC, hash).to_string()
}

/// `sha256-<hex>` of `data`, used as a strong ETag
pub fn sha256_tag(data: &[u8]) -> String {
    format!("sha256-{}", hex::encode(Sha256::digest(data)))
}

/// Normalise a content address to `sha256-<hex>`
pub fn parse_content_address(addr: &str) -> Result<String, ViviError> {
    if addr.starts_with("baf") || addr.starts_with("Qm") || addr.starts_with('z') {
        let cid = Cid::from_str(addr)
            .map_err(|e| ViviError::BadRequest(format!("Invalid CID format: {}", e)))?;
        let digest = cid.hash().digest();
        if digest.len() != 32 {
            return Err(ViviError::BadRequest(format!(
                "CID uses unsupported hash algorithm (expected SHA256, got {} bytes)",
                digest.len()
            )));
        }
        return Ok(format!("sha256-{}", hex::encode(digest)));
    }

    if let Some(hex_hash) = addr.strip_prefix("sha256-") {
        if is_sha256_hex(hex_hash) {
            return Ok(format!("sha256-{}", hex_hash.to_ascii_lowercase()));
        }
        return Err(ViviError::BadRequest(format!(
            "Invalid sha256 hash: expected 64 hex chars, got {}",
            hex_hash.len()
        )));
    }

    if is_sha256_hex(addr) {
        return Ok(format!("sha256-{}", addr.to_ascii_lowercase()));
    }

    Err(ViviError::BadRequest(format!(
        "Unrecognized address format: {}",
        addr
    )))
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}
