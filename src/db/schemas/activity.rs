//! Activity record schema
//!
//! One document per ingested browsing activity.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for activity records
pub const ACTIVITY_COLLECTION: &str = "activities";

/// Activity record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ActivityDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning participant subject id
    pub subject_id: String,

    /// Page the activity happened on
    pub url: String,

    /// Activity kind (see crate::activity for supported kinds)
    #[serde(rename = "type")]
    pub kind: String,

    /// Clicked element, present for click activities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,

    /// Server-side ingestion instant, UTC epoch seconds
    pub recorded_at: i64,
}

impl ActivityDoc {
    /// Create a new activity record
    pub fn new(
        subject_id: String,
        url: String,
        kind: String,
        element: Option<String>,
        recorded_at: i64,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            subject_id,
            url,
            kind,
            element,
            recorded_at,
        }
    }
}

impl IntoIndexes for ActivityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "subject_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("subject_id_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ActivityDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
