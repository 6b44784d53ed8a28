//! Registry snapshots with BLAKE3 fingerprints.
//!
//! A [`RegistrySnapshot`] is what downstream loggers persist about the
//! semantic layer: one [`IndividualRecord`] per registered individual and
//! bone, plus a fingerprint that changes whenever any recorded value does.

use serde::{Deserialize, Serialize};

use crate::individual::Individual;
use crate::IndividualError;

/// Semantic values of one individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    pub id: String,
    pub class: String,
    pub type_name: String,
    /// Name of the described actor (the skeletal actor for bones).
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_mask: Option<String>,
    /// Id of the owning skeletal individual, bones only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub is_loaded: bool,
    pub is_movable: bool,
}

impl IndividualRecord {
    pub(crate) fn new(individual: &Individual, actor: &str, parent_id: Option<&str>) -> Self {
        Self {
            id: individual.id_value().to_owned(),
            class: individual.class_value().to_owned(),
            type_name: individual.type_name().to_owned(),
            actor: actor.to_owned(),
            visual_mask: individual.visual_mask_value().map(str::to_owned),
            parent_id: parent_id.map(str::to_owned),
            is_loaded: individual.is_loaded(),
            is_movable: individual.is_movable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Sorted by id, then type name.
    pub individuals: Vec<IndividualRecord>,
    /// BLAKE3 hex digest of the records.
    pub hash: String,
}

impl RegistrySnapshot {
    pub fn new(mut individuals: Vec<IndividualRecord>) -> Self {
        individuals.sort_by(|a, b| (&a.id, &a.type_name).cmp(&(&b.id, &b.type_name)));
        let hash = compute_hash(&individuals);
        Self { individuals, hash }
    }

    pub fn fingerprint(&self) -> &str {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&IndividualRecord> {
        self.individuals.iter().find(|r| r.id == id)
    }

    pub fn to_json(&self) -> Result<String, IndividualError> {
        serde_json::to_string_pretty(self).map_err(|e| IndividualError::SnapshotError {
            details: e.to_string(),
        })
    }

    /// Parse a snapshot and check its fingerprint.
    pub fn from_json(json: &str) -> Result<Self, IndividualError> {
        let snapshot: Self = serde_json::from_str(json).map_err(|e| IndividualError::SnapshotError {
            details: e.to_string(),
        })?;
        let expected = compute_hash(&snapshot.individuals);
        if snapshot.hash != expected {
            return Err(IndividualError::SnapshotError {
                details: format!("fingerprint mismatch: stored {}, computed {expected}", snapshot.hash),
            });
        }
        Ok(snapshot)
    }
}

/// Fields are length-prefixed so that no two record lists hash alike.
fn compute_hash(records: &[IndividualRecord]) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut field = |bytes: &[u8]| {
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };
    for r in records {
        field(r.id.as_bytes());
        field(r.class.as_bytes());
        field(r.type_name.as_bytes());
        field(r.actor.as_bytes());
        field(r.visual_mask.as_deref().unwrap_or("\u{0}").as_bytes());
        field(r.parent_id.as_deref().unwrap_or("\u{0}").as_bytes());
        field(&[r.is_loaded as u8, r.is_movable as u8]);
    }
    hasher.finalize().to_hex().to_string()
}
