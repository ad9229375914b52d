//! Versioned wire form of a stored battle.
//!
//! Every backend stores the same bytes: a JSON envelope
//!
//! ```json
//! { "schema_version": 1, "battle": { ... } }
//! ```
//!
//! The version is checked before the battle itself is decoded, so a payload
//! from a newer build fails with [`StoreError::Schema`] rather than a
//! confusing field error.

use arena_core::Battle;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema_version: u32,
    battle: &'a Battle,
}

#[derive(Deserialize)]
struct Header {
    schema_version: u32,
}

#[derive(Deserialize)]
struct Envelope {
    battle: Battle,
}

/// Encode a battle into the stored form.
///
/// # Errors
/// Returns [`StoreError::Serialization`] if encoding fails.
pub fn encode(battle: &Battle) -> Result<Vec<u8>> {
    serde_json::to_vec(&EnvelopeRef {
        schema_version: SCHEMA_VERSION,
        battle,
    })
    .map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode a stored payload.
///
/// # Errors
/// Returns [`StoreError::Schema`] for a foreign version and
/// [`StoreError::Serialization`] for malformed data.
pub fn decode(bytes: &[u8]) -> Result<Battle> {
    let header: Header =
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
    if header.schema_version != SCHEMA_VERSION {
        return Err(StoreError::Schema {
            found: header.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(envelope.battle)
}
