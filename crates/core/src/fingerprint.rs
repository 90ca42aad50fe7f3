// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job fingerprints.
//!
//! A fingerprint is SHA-256 over a versioned, length-prefixed encoding of the
//! method name, one source hash, the normalized options and the dependency
//! digests. Maps are encoded with sorted keys no matter how `serde_json` was
//! compiled, and dependencies are sorted by slot and position, so the digest
//! depends only on content.

use crate::options::Options;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

const DOMAIN: &[u8] = b"ax-fingerprint/v1";

/// Hex SHA-256 identity of a job request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Job,
    Dataset,
}

/// One resolved input of a job as it enters the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDigest {
    pub kind: DependencyKind,
    pub slot: String,
    pub position: u32,
    pub fingerprint: Fingerprint,
    /// Dataset name within the producing job, for dataset inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
}

/// Compute the fingerprint of a job request.
///
/// `options` must already be normalized against the method's schema.
pub fn fingerprint(
    method: &str,
    source_hash: &str,
    options: &Options,
    dependencies: &[DependencyDigest],
) -> Fingerprint {
    let mut hasher = Sha256::new();
    field(&mut hasher, b'D', DOMAIN);
    field(&mut hasher, b'M', method.as_bytes());
    field(&mut hasher, b'H', source_hash.as_bytes());

    let mut encoded = Vec::new();
    encode_object(options, &mut encoded);
    field(&mut hasher, b'O', &encoded);

    let mut deps: Vec<&DependencyDigest> = dependencies.iter().collect();
    deps.sort_by(|a, b| (a.kind, &a.slot, a.position).cmp(&(b.kind, &b.slot, b.position)));
    hasher.update((deps.len() as u64).to_be_bytes());
    for dep in deps {
        let kind: &[u8] = match dep.kind {
            DependencyKind::Job => b"job",
            DependencyKind::Dataset => b"dataset",
        };
        field(&mut hasher, b'k', kind);
        field(&mut hasher, b's', dep.slot.as_bytes());
        field(&mut hasher, b'p', &dep.position.to_be_bytes());
        field(&mut hasher, b'f', dep.fingerprint.as_str().as_bytes());
        field(&mut hasher, b'n', dep.dataset.as_deref().unwrap_or("").as_bytes());
    }

    Fingerprint(hex(&hasher.finalize()))
}

/// Content hash of method source text.
pub fn source_hash(text: &str) -> String {
    hex(&Sha256::digest(text.as_bytes()))
}

fn field(hasher: &mut Sha256, tag: u8, bytes: &[u8]) {
    hasher.update([tag]);
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn encode_len(len: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(&(len as u64).to_be_bytes());
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.push(b's');
    encode_len(s.len(), out);
    out.extend_from_slice(s.as_bytes());
}

fn encode_object(map: &Options, out: &mut Vec<u8>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    out.push(b'{');
    encode_len(entries.len(), out);
    for (key, value) in entries {
        encode_str(key, out);
        encode_value(value, out);
    }
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(b'0'),
        Value::Bool(true) => out.push(b't'),
        Value::Bool(false) => out.push(b'f'),
        Value::Number(n) => {
            let text = n.to_string();
            out.push(b'#');
            encode_len(text.len(), out);
            out.extend_from_slice(text.as_bytes());
        }
        Value::String(s) => encode_str(s, out),
        Value::Array(items) => {
            out.push(b'[');
            encode_len(items.len(), out);
            for item in items {
                encode_value(item, out);
            }
        }
        Value::Object(map) => encode_object(map, out),
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
