use crate::incident::model::NormalizedEntry;
use sha2::{Digest, Sha256};
use ulid::Ulid;

/// Run identifier stamped on every log line of one report generation.
pub fn run_id_ulid() -> String {
    format!("r_{}", Ulid::new())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Content hash of a normalized transcript. Identical threads fingerprint
/// identically across runs, so logs can tell a re-run from a changed thread.
pub fn transcript_fingerprint(entries: &[NormalizedEntry]) -> String {
    let mut h = Sha256::new();
    for entry in entries {
        h.update(entry.transcript_line().as_bytes());
        h.update(b"\n");
    }
    hex::encode(h.finalize())
}
