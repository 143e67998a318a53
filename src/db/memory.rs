//! In-memory participant store
//!
//! Backs dev mode when MongoDB is unreachable, and the test suites. The
//! find-or-create atomicity contract is satisfied by dashmap's entry API:
//! concurrent first-time registrations for one email race on the shard
//! lock and exactly one insert wins.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::activity::NewActivity;
use crate::db::participants::{IdentityStore, ParticipantStore, ProfileUpdate};
use crate::db::schemas::{ActivityDoc, ParticipantDoc};
use crate::types::Result;

/// Participant store held entirely in process memory
#[derive(Default)]
pub struct MemoryParticipantStore {
    /// Normalized email -> participant
    by_email: DashMap<String, ParticipantDoc>,
    /// Subject id -> normalized email
    subject_index: DashMap<String, String>,
    /// Subject id -> ingested activity records
    activities: DashMap<String, Vec<ActivityDoc>>,
}

impl MemoryParticipantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered participants
    pub fn participant_count(&self) -> usize {
        self.by_email.len()
    }

    /// Number of activity records ingested for a subject
    pub fn activity_count(&self, subject_id: &str) -> usize {
        self.activities
            .get(subject_id)
            .map(|records| records.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl IdentityStore for MemoryParticipantStore {
    async fn find_or_create(&self, normalized_email: &str) -> Result<String> {
        let entry = self
            .by_email
            .entry(normalized_email.to_string())
            .or_insert_with(|| {
                ParticipantDoc::new(
                    normalized_email.to_string(),
                    Uuid::new_v4().to_string(),
                    chrono::Utc::now().timestamp(),
                )
            });
        let subject_id = entry.subject_id.clone();
        drop(entry);

        self.subject_index
            .insert(subject_id.clone(), normalized_email.to_string());

        Ok(subject_id)
    }
}

#[async_trait]
impl ParticipantStore for MemoryParticipantStore {
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<ParticipantDoc>> {
        let email = match self.subject_index.get(subject_id) {
            Some(email) => email.clone(),
            None => return Ok(None),
        };
        Ok(self.by_email.get(&email).map(|p| p.clone()))
    }

    async fn update_profile(
        &self,
        subject_id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<ParticipantDoc>> {
        let email = match self.subject_index.get(subject_id) {
            Some(email) => email.clone(),
            None => return Ok(None),
        };

        if let Some(mut participant) = self.by_email.get_mut(&email) {
            if let Some(nickname) = update.nickname {
                participant.nickname = nickname;
            }
            if let Some(motto) = update.motto {
                participant.motto = motto;
            }
            return Ok(Some(participant.clone()));
        }

        Ok(None)
    }

    async fn record_activity(&self, subject_id: &str, activity: &NewActivity) -> Result<()> {
        let record = ActivityDoc::new(
            subject_id.to_string(),
            activity.url.clone(),
            activity.kind.clone(),
            activity.element.clone(),
            chrono::Utc::now().timestamp(),
        );
        self.activities
            .entry(subject_id.to_string())
            .or_default()
            .push(record);

        if let Some(email) = self.subject_index.get(subject_id) {
            if let Some(mut participant) = self.by_email.get_mut(email.value()) {
                *participant
                    .activity
                    .entry(activity.kind.clone())
                    .or_insert(0) += 1;
            }
        }

        Ok(())
    }

    async fn assign_experiment(
        &self,
        subject_id: &str,
        experiment: &str,
        group: &str,
    ) -> Result<bool> {
        let email = match self.subject_index.get(subject_id) {
            Some(email) => email.clone(),
            None => return Ok(false),
        };

        match self.by_email.get_mut(&email) {
            Some(mut participant) => {
                participant
                    .experiments
                    .insert(experiment.to_string(), group.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::KIND_PAGE_VISIT;

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = MemoryParticipantStore::new();
        let first = store.find_or_create("a@x.org").await.unwrap();
        let second = store.find_or_create("a@x.org").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.participant_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_emails_get_distinct_subjects() {
        let store = MemoryParticipantStore::new();
        let a = store.find_or_create("a@x.org").await.unwrap();
        let b = store.find_or_create("b@x.org").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.participant_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_registration_creates_one_record() {
        let store = std::sync::Arc::new(MemoryParticipantStore::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.find_or_create("race@x.org").await.unwrap()
            }));
        }

        let mut subjects = Vec::new();
        for handle in handles {
            subjects.push(handle.await.unwrap());
        }

        subjects.dedup();
        assert_eq!(subjects.len(), 1);
        assert_eq!(store.participant_count(), 1);
    }

    #[tokio::test]
    async fn test_profile_update_touches_only_profile_fields() {
        let store = MemoryParticipantStore::new();
        let subject = store.find_or_create("a@x.org").await.unwrap();

        let updated = store
            .update_profile(
                &subject,
                ProfileUpdate {
                    nickname: Some("Tester".into()),
                    motto: Some("Measure twice".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.nickname, "Tester");
        assert_eq!(updated.motto, "Measure twice");
        assert_eq!(updated.subject_id, subject);
        assert_eq!(updated.email, "a@x.org");
    }

    #[tokio::test]
    async fn test_record_activity_bumps_counter() {
        let store = MemoryParticipantStore::new();
        let subject = store.find_or_create("a@x.org").await.unwrap();

        let activity = NewActivity {
            url: "https://example.org/questions/1".into(),
            kind: KIND_PAGE_VISIT.into(),
            element: None,
        };
        store.record_activity(&subject, &activity).await.unwrap();
        store.record_activity(&subject, &activity).await.unwrap();

        assert_eq!(store.activity_count(&subject), 2);
        let participant = store.find_by_subject(&subject).await.unwrap().unwrap();
        assert_eq!(participant.activity.get(KIND_PAGE_VISIT), Some(&2));
    }

    #[tokio::test]
    async fn test_assign_experiment_unknown_subject() {
        let store = MemoryParticipantStore::new();
        let assigned = store
            .assign_experiment("nobody", "exp", "group")
            .await
            .unwrap();
        assert!(!assigned);
    }
}
