// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload fingerprints: SHA-256 digests of source files so that intake and
// delivery can prove bytes were never altered in transit.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Whether `data` still matches a previously computed digest.
pub fn matches_digest(data: &[u8], expected_hex: &str) -> bool {
    hash_bytes(data).eq_ignore_ascii_case(expected_hex)
}
