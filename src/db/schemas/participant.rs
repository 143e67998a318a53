//! Participant document schema
//!
//! One document per registered end user. The normalized email is the
//! identity key (unique index); the subject id is the opaque identifier
//! everything else in the service refers to. Experiment assignments are
//! stored as plain labels and hashed only at the API edge.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for participants
pub const PARTICIPANT_COLLECTION: &str = "participants";

/// Participant document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ParticipantDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Stable opaque identifier, assigned once at registration
    pub subject_id: String,

    /// Normalized (lower-cased) email, the unique identity key
    pub email: String,

    /// Display name, caller updatable
    #[serde(default)]
    pub nickname: String,

    /// Free-form motto, caller updatable
    #[serde(default)]
    pub motto: String,

    /// Registration instant, UTC epoch seconds, immutable
    #[serde(default)]
    pub start_date: i64,

    /// Per-activity-type counters
    #[serde(default)]
    pub activity: HashMap<String, i64>,

    /// Experiment name to assigned group, plain labels
    #[serde(default)]
    pub experiments: HashMap<String, String>,
}

impl ParticipantDoc {
    /// Create a new participant document
    pub fn new(email: String, subject_id: String, start_date: i64) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            subject_id,
            email,
            nickname: String::new(),
            motto: String::new(),
            start_date,
            activity: HashMap::new(),
            experiments: HashMap::new(),
        }
    }
}

impl IntoIndexes for ParticipantDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on email backs the atomic find-or-create upsert
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            // Index on subject_id for resource lookups
            (
                doc! { "subject_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("subject_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ParticipantDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
