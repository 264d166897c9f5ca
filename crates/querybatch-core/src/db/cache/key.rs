//! Deterministic cache keys for query results.
#![expect(clippy::cast_possible_truncation)]

use crate::{db::command::SqlCommand, value::Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Key-encoding version byte; bump when the hashed layout changes.
const CACHE_KEY_VERSION: u8 = 1;

///
/// CacheKey
///
/// Region-scoped SHA-256 fingerprint of one command's SQL text and parameters.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CacheKey {
    region: String,
    digest: [u8; 32],
}

impl CacheKey {
    #[must_use]
    pub fn for_command(region: &str, command: &SqlCommand) -> Self {
        let mut hasher = Sha256::new();
        write_tag(&mut hasher, CACHE_KEY_VERSION);
        write_str(&mut hasher, command.sql());
        write_u32(&mut hasher, command.params().len() as u32);
        for param in command.params() {
            write_value(&mut hasher, param);
        }

        Self {
            region: region.to_string(),
            digest: hasher.finalize().into(),
        }
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub const fn digest(&self) -> &[u8; 32] {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.region)?;
        for byte in &self.digest[..8] {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}

fn write_u32(hasher: &mut Sha256, v: u32) {
    hasher.update(v.to_be_bytes());
}

fn write_str(hasher: &mut Sha256, s: &str) {
    write_u32(hasher, s.len() as u32);
    hasher.update(s.as_bytes());
}

fn write_value(hasher: &mut Sha256, value: &Value) {
    write_tag(hasher, value.tag());
    match value {
        Value::Null => {}
        Value::Bool(v) => write_tag(hasher, u8::from(*v)),
        Value::Int(v) => hasher.update(v.to_be_bytes()),
        Value::Float(v) => hasher.update(v.to_bits().to_be_bytes()),
        Value::Text(v) => write_str(hasher, v),
        Value::Blob(v) => {
            write_u32(hasher, v.len() as u32);
            hasher.update(v);
        }
    }
}
