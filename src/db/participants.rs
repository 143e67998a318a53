//! Participant store contracts and the MongoDB implementation
//!
//! `IdentityStore` is the narrow contract the auth gateway consumes:
//! find-or-create with at-most-one-record-per-email under concurrent
//! registration. `ParticipantStore` widens it with the profile, activity,
//! and experiment operations the resource routes need.

use async_trait::async_trait;
use bson::doc;
use mongodb::options::ReturnDocument;
use uuid::Uuid;

use crate::activity::NewActivity;
use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    ActivityDoc, ParticipantDoc, ACTIVITY_COLLECTION, PARTICIPANT_COLLECTION,
};
use crate::types::{Result, WaymarkError};

/// Durable email-to-participant mapping consumed by the auth gateway
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find or create the participant for a normalized email
    ///
    /// Concurrent first-time calls for the same email must yield the same
    /// subject id and a single record. Implementations must be atomic; the
    /// gateway never emulates this with read-then-write.
    async fn find_or_create(&self, normalized_email: &str) -> Result<String>;
}

/// Profile fields a participant may change about themselves
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub motto: Option<String>,
}

/// Full participant storage surface for the resource routes
#[async_trait]
pub trait ParticipantStore: IdentityStore {
    /// Look up a participant by subject id
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<ParticipantDoc>>;

    /// Apply a profile update and return the updated participant
    ///
    /// Only nickname and motto are writable; identity fields and counters
    /// are never touched.
    async fn update_profile(
        &self,
        subject_id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<ParticipantDoc>>;

    /// Insert an activity record and bump the participant's per-type counter
    async fn record_activity(&self, subject_id: &str, activity: &NewActivity) -> Result<()>;

    /// Assign a participant to an experiment group, overwriting any prior
    /// assignment for that experiment. Returns false if the subject is
    /// unknown.
    async fn assign_experiment(
        &self,
        subject_id: &str,
        experiment: &str,
        group: &str,
    ) -> Result<bool>;
}

/// MongoDB-backed participant store
pub struct MongoParticipantStore {
    participants: MongoCollection<ParticipantDoc>,
    activities: MongoCollection<ActivityDoc>,
}

impl MongoParticipantStore {
    /// Open the participant and activity collections, applying indexes
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            participants: client.collection(PARTICIPANT_COLLECTION).await?,
            activities: client.collection(ACTIVITY_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl IdentityStore for MongoParticipantStore {
    async fn find_or_create(&self, normalized_email: &str) -> Result<String> {
        // Single atomic upsert against the unique email index. Under a
        // concurrent first-time race exactly one insert wins; the losers
        // get the winner's document back. The candidate subject id is only
        // persisted when this call performs the insert.
        let candidate_subject = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        let update = doc! {
            "$setOnInsert": {
                "email": normalized_email,
                "subject_id": &candidate_subject,
                "nickname": "",
                "motto": "",
                "start_date": now,
                "activity": {},
                "experiments": {},
                "metadata": {
                    "is_deleted": false,
                    "created_at": bson::DateTime::now(),
                    "updated_at": bson::DateTime::now(),
                },
            }
        };

        let participant = self
            .participants
            .inner()
            .find_one_and_update(doc! { "email": normalized_email }, update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| WaymarkError::Database(format!("find_or_create failed: {}", e)))?
            .ok_or_else(|| WaymarkError::Database("Upsert returned no document".into()))?;

        Ok(participant.subject_id)
    }
}

#[async_trait]
impl ParticipantStore for MongoParticipantStore {
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<ParticipantDoc>> {
        self.participants
            .find_one(doc! { "subject_id": subject_id })
            .await
    }

    async fn update_profile(
        &self,
        subject_id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<ParticipantDoc>> {
        let mut set = doc! { "metadata.updated_at": bson::DateTime::now() };
        if let Some(nickname) = update.nickname {
            set.insert("nickname", nickname);
        }
        if let Some(motto) = update.motto {
            set.insert("motto", motto);
        }

        self.participants
            .update_one(doc! { "subject_id": subject_id }, doc! { "$set": set })
            .await?;

        self.find_by_subject(subject_id).await
    }

    async fn record_activity(&self, subject_id: &str, activity: &NewActivity) -> Result<()> {
        let record = ActivityDoc::new(
            subject_id.to_string(),
            activity.url.clone(),
            activity.kind.clone(),
            activity.element.clone(),
            chrono::Utc::now().timestamp(),
        );
        self.activities.insert_one(record).await?;

        let mut inc = bson::Document::new();
        inc.insert(format!("activity.{}", activity.kind), 1i64);

        self.participants
            .update_one(
                doc! { "subject_id": subject_id },
                doc! {
                    "$inc": inc,
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
            .await?;

        Ok(())
    }

    async fn assign_experiment(
        &self,
        subject_id: &str,
        experiment: &str,
        group: &str,
    ) -> Result<bool> {
        let mut set = bson::Document::new();
        set.insert(format!("experiments.{}", experiment), group);
        set.insert("metadata.updated_at", bson::DateTime::now());

        let result = self
            .participants
            .update_one(doc! { "subject_id": subject_id }, doc! { "$set": set })
            .await?;

        Ok(result.matched_count > 0)
    }
}
