//! PollService - translates poll lifecycle requests into store operations
//! and derives the events to broadcast.
//!
//! Every mutation is one logical step from the caller's perspective: the
//! store write happens first, then the matching broadcast is scheduled as a
//! detached task. A broadcast failure can never block or fail the response
//! already owed to the caller.
//!
//! # Vote atomicity
//!
//! A vote is a read-increment-write on the serialized option list. Two
//! concurrent voters reading the same base would lose one increment if the
//! second write blindly overwrote the first, so the write goes through the
//! store's compare-and-swap primitive and retries from a fresh read on
//! conflict. Retries are bounded; exhaustion surfaces as
//! [`StoreError::Conflict`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::poll::{
    OptionId, Poll, PollError, PollId, PollOption, ServerMessage, StoreError,
};
use crate::ports::{Broadcaster, KeyValueStore};

/// Set key holding every poll id.
const POLLS_SET_KEY: &str = "polls";

/// Hash field names of a poll record.
const FIELD_QUESTION: &str = "question";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_OPTIONS: &str = "options";

/// Upper bound on compare-and-swap retries for one vote.
const MAX_VOTE_ATTEMPTS: usize = 32;

/// Cap on the per-attempt retry backoff.
const MAX_VOTE_BACKOFF_MS: u64 = 10;

/// Result of a successfully recorded vote.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub new_vote_count: u64,
    pub option_value: String,
    pub all_options: Vec<PollOption>,
}

/// The poll mutation engine.
pub struct PollService {
    store: Arc<dyn KeyValueStore>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl PollService {
    pub fn new(store: Arc<dyn KeyValueStore>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Creates a poll, persists it, and schedules a `new_poll` broadcast to
    /// every live session.
    ///
    /// Fails with [`PollError::Validation`] before any store write if the
    /// question is empty or no options are given.
    pub async fn create_poll(
        &self,
        question: String,
        description: Option<String>,
        options: Vec<String>,
    ) -> Result<Poll, PollError> {
        let poll = Poll::new(question, description, options)?;

        let mut fields = vec![
            (FIELD_QUESTION.to_string(), poll.question.clone()),
            (FIELD_OPTIONS.to_string(), encode_options(&poll.options)),
        ];
        if let Some(description) = &poll.description {
            fields.push((FIELD_DESCRIPTION.to_string(), description.clone()));
        }

        self.store.hash_set(&poll_key(poll.id), &fields).await?;
        self.store
            .set_add(POLLS_SET_KEY, &poll.id.to_string())
            .await?;

        tracing::info!(poll_id = %poll.id, "poll created");
        self.schedule_broadcast_all(ServerMessage::NewPoll { poll: poll.clone() });

        Ok(poll)
    }

    /// Fetches a poll by id.
    pub async fn get_poll(&self, id: PollId) -> Result<Poll, PollError> {
        let fields = self
            .store
            .hash_get_all(&poll_key(id))
            .await?
            .ok_or_else(|| PollError::not_found(id))?;

        Ok(decode_poll(id, &fields)?)
    }

    /// Records one vote for an option and schedules a `vote_update`
    /// broadcast to the poll's topic.
    ///
    /// Conflicting writers back off linearly (capped) before re-reading,
    /// which spreads contending voters apart. The retry bound trades
    /// liveness for a guaranteed response: past [`MAX_VOTE_ATTEMPTS`]
    /// conflicts the vote fails with [`StoreError::Conflict`] instead of
    /// looping, and the caller decides whether to resubmit.
    pub async fn vote(&self, poll_id: PollId, option_id: OptionId) -> Result<VoteOutcome, PollError> {
        let key = poll_key(poll_id);

        for attempt in 0..MAX_VOTE_ATTEMPTS {
            let fields = self
                .store
                .hash_get_all(&key)
                .await?
                .ok_or_else(|| PollError::not_found(poll_id))?;

            let raw = fields
                .get(FIELD_OPTIONS)
                .ok_or_else(|| StoreError::Corrupt(format!("poll {poll_id} has no options field")))?;

            let mut options = decode_options(raw)?;
            let index = options
                .iter()
                .position(|o| o.id == option_id)
                .ok_or_else(|| PollError::invalid_option(option_id))?;

            options[index].vote += 1;
            let updated = encode_options(&options);

            if self
                .store
                .hash_compare_and_set(&key, FIELD_OPTIONS, raw, &updated)
                .await?
            {
                let voted = options[index].clone();
                let outcome = VoteOutcome {
                    poll_id,
                    option_id,
                    new_vote_count: voted.vote,
                    option_value: voted.value,
                    all_options: options,
                };

                self.schedule_broadcast_poll(
                    poll_id,
                    ServerMessage::VoteUpdate {
                        poll_id,
                        option_id,
                        new_vote_count: outcome.new_vote_count,
                        option_value: outcome.option_value.clone(),
                        all_options: outcome.all_options.clone(),
                    },
                );

                return Ok(outcome);
            }

            tracing::debug!(%poll_id, attempt, "vote write conflicted, retrying");
            let backoff = Duration::from_millis((attempt as u64 + 1).min(MAX_VOTE_BACKOFF_MS));
            tokio::time::sleep(backoff).await;
        }

        Err(StoreError::Conflict.into())
    }

    /// Deletes a poll and schedules a `poll_deleted` broadcast to every
    /// live session.
    pub async fn delete_poll(&self, id: PollId) -> Result<(), PollError> {
        let key = poll_key(id);

        if !self.store.exists(&key).await? {
            return Err(PollError::not_found(id));
        }

        self.store.delete(&key).await?;
        self.store
            .set_remove(POLLS_SET_KEY, &id.to_string())
            .await?;

        tracing::info!(poll_id = %id, "poll deleted");
        self.schedule_broadcast_all(ServerMessage::PollDeleted { poll_id: id });

        Ok(())
    }

    /// Lists every poll. Ids whose record vanished concurrently are
    /// skipped, not treated as an error.
    pub async fn list_polls(&self) -> Result<Vec<Poll>, PollError> {
        let ids = self.store.set_members(POLLS_SET_KEY).await?;

        let mut polls = Vec::with_capacity(ids.len());
        for raw_id in ids {
            let Ok(id) = raw_id.parse::<PollId>() else {
                tracing::warn!(id = %raw_id, "skipping unparseable poll id in index set");
                continue;
            };
            match self.store.hash_get_all(&poll_key(id)).await? {
                Some(fields) => match decode_poll(id, &fields) {
                    Ok(poll) => polls.push(poll),
                    Err(error) => {
                        tracing::warn!(poll_id = %id, %error, "skipping undecodable poll record");
                    }
                },
                None => {
                    // Deleted between the set read and the record fetch.
                    tracing::debug!(poll_id = %id, "poll record missing, skipping");
                }
            }
        }

        Ok(polls)
    }

    fn schedule_broadcast_all(&self, message: ServerMessage) {
        let broadcaster = Arc::clone(&self.broadcaster);
        tokio::spawn(async move {
            broadcaster.broadcast_all(&message).await;
        });
    }

    fn schedule_broadcast_poll(&self, poll_id: PollId, message: ServerMessage) {
        let broadcaster = Arc::clone(&self.broadcaster);
        tokio::spawn(async move {
            broadcaster.broadcast_poll(poll_id, &message).await;
        });
    }
}

fn poll_key(id: PollId) -> String {
    format!("poll:{id}")
}

fn encode_options(options: &[PollOption]) -> String {
    serde_json::to_string(options).expect("PollOption serialization should not fail")
}

fn decode_options(raw: &str) -> Result<Vec<PollOption>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(format!("options field: {e}")))
}

fn decode_poll(id: PollId, fields: &HashMap<String, String>) -> Result<Poll, StoreError> {
    let question = fields
        .get(FIELD_QUESTION)
        .cloned()
        .ok_or_else(|| StoreError::Corrupt(format!("poll {id} has no question field")))?;
    let raw_options = fields
        .get(FIELD_OPTIONS)
        .ok_or_else(|| StoreError::Corrupt(format!("poll {id} has no options field")))?;

    Ok(Poll {
        id,
        question,
        description: fields.get(FIELD_DESCRIPTION).cloned(),
        options: decode_options(raw_options)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Captures broadcasts for assertions instead of delivering them.
    struct RecordingBroadcaster {
        sent: Mutex<Vec<(Option<PollId>, ServerMessage)>>,
    }

    impl RecordingBroadcaster {
        fn new() -> Self {
            Self { sent: Mutex::new(Vec::new()) }
        }

        fn messages(&self) -> Vec<(Option<PollId>, ServerMessage)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast_poll(&self, poll_id: PollId, message: &ServerMessage) {
            self.sent.lock().unwrap().push((Some(poll_id), message.clone()));
        }

        async fn broadcast_all(&self, message: &ServerMessage) {
            self.sent.lock().unwrap().push((None, message.clone()));
        }
    }

    fn service() -> (PollService, Arc<InMemoryStore>, Arc<RecordingBroadcaster>) {
        let store = Arc::new(InMemoryStore::new());
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let service = PollService::new(store.clone(), broadcaster.clone());
        (service, store, broadcaster)
    }

    /// Let detached broadcast tasks run to completion.
    async fn drain_tasks() {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn create_poll_persists_record_and_index_entry() {
        let (service, store, _) = service();

        let poll = service
            .create_poll("Q?".into(), Some("why".into()), vec!["A".into(), "B".into()])
            .await
            .unwrap();

        let fields = store
            .hash_get_all(&poll_key(poll.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fields.get("question").unwrap(), "Q?");
        assert_eq!(fields.get("description").unwrap(), "why");

        let ids = store.set_members(POLLS_SET_KEY).await.unwrap();
        assert!(ids.contains(&poll.id.to_string()));
    }

    #[tokio::test]
    async fn create_poll_broadcasts_new_poll_globally() {
        let (service, _, broadcaster) = service();

        let poll = service
            .create_poll("Q?".into(), None, vec!["A".into()])
            .await
            .unwrap();
        drain_tasks().await;

        let sent = broadcaster.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.is_none());
        assert!(
            matches!(&sent[0].1, ServerMessage::NewPoll { poll: p } if p.id == poll.id)
        );
    }

    #[tokio::test]
    async fn create_poll_with_no_options_writes_nothing() {
        let (service, store, broadcaster) = service();

        let result = service.create_poll("Q?".into(), None, vec![]).await;
        drain_tasks().await;

        assert!(matches!(result, Err(PollError::Validation(_))));
        assert!(store.set_members(POLLS_SET_KEY).await.unwrap().is_empty());
        assert!(broadcaster.messages().is_empty());
    }

    #[tokio::test]
    async fn absent_description_reads_back_as_none() {
        let (service, _, _) = service();

        let created = service
            .create_poll("Q?".into(), None, vec!["A".into()])
            .await
            .unwrap();
        let fetched = service.get_poll(created.id).await.unwrap();

        assert_eq!(fetched.description, None);
    }

    #[tokio::test]
    async fn get_poll_unknown_id_is_not_found() {
        let (service, _, _) = service();
        let result = service.get_poll(PollId::new()).await;
        assert!(matches!(result, Err(PollError::NotFound(_))));
    }

    #[tokio::test]
    async fn vote_increments_and_broadcasts_to_poll_topic() {
        let (service, _, broadcaster) = service();

        let poll = service
            .create_poll("Q?".into(), None, vec!["Red".into(), "Blue".into()])
            .await
            .unwrap();
        let red = poll.options[0].id;

        let outcome = service.vote(poll.id, red).await.unwrap();
        drain_tasks().await;

        assert_eq!(outcome.new_vote_count, 1);
        assert_eq!(outcome.option_value, "Red");

        let fetched = service.get_poll(poll.id).await.unwrap();
        assert_eq!(fetched.options[0].vote, 1);
        assert_eq!(fetched.options[1].vote, 0);

        let vote_updates: Vec<_> = broadcaster
            .messages()
            .into_iter()
            .filter(|(topic, m)| {
                *topic == Some(poll.id) && matches!(m, ServerMessage::VoteUpdate { .. })
            })
            .collect();
        assert_eq!(vote_updates.len(), 1);
    }

    #[tokio::test]
    async fn vote_on_unknown_poll_is_not_found() {
        let (service, _, _) = service();
        let result = service.vote(PollId::new(), OptionId::new()).await;
        assert!(matches!(result, Err(PollError::NotFound(_))));
    }

    #[tokio::test]
    async fn vote_with_foreign_option_leaves_counts_unchanged() {
        let (service, _, _) = service();

        let poll = service
            .create_poll("Q?".into(), None, vec!["A".into()])
            .await
            .unwrap();

        let result = service.vote(poll.id, OptionId::new()).await;
        assert!(matches!(result, Err(PollError::InvalidOption(_))));

        let fetched = service.get_poll(poll.id).await.unwrap();
        assert_eq!(fetched.options[0].vote, 0);
    }

    #[tokio::test]
    async fn concurrent_votes_on_one_option_all_land() {
        let (service, _, _) = service();
        let service = Arc::new(service);

        let poll = service
            .create_poll("Q?".into(), None, vec!["Red".into()])
            .await
            .unwrap();
        let option_id = poll.options[0].id;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let service = service.clone();
            let poll_id = poll.id;
            handles.push(tokio::spawn(async move {
                service.vote(poll_id, option_id).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let fetched = service.get_poll(poll.id).await.unwrap();
        assert_eq!(fetched.options[0].vote, 50);
    }

    /// Delegates to the inner store but rejects every compare-and-swap,
    /// as if another writer always got there first.
    struct ContestedStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl crate::ports::KeyValueStore for ContestedStore {
        async fn hash_get_all(
            &self,
            key: &str,
        ) -> Result<Option<HashMap<String, String>>, StoreError> {
            self.inner.hash_get_all(key).await
        }

        async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
            self.inner.hash_set(key, fields).await
        }

        async fn hash_compare_and_set(
            &self,
            _key: &str,
            _field: &str,
            _expected: &str,
            _new: &str,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            self.inner.exists(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }

        async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
            self.inner.set_add(set_key, member).await
        }

        async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
            self.inner.set_remove(set_key, member).await
        }

        async fn set_members(&self, set_key: &str) -> Result<std::collections::HashSet<String>, StoreError> {
            self.inner.set_members(set_key).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn vote_retry_exhaustion_surfaces_conflict() {
        let store = Arc::new(ContestedStore {
            inner: InMemoryStore::new(),
        });
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let service = PollService::new(store, broadcaster.clone());

        let poll = service
            .create_poll("Q?".into(), None, vec!["A".into()])
            .await
            .unwrap();

        let result = service.vote(poll.id, poll.options[0].id).await;
        drain_tasks().await;

        assert!(matches!(
            result,
            Err(PollError::Store(StoreError::Conflict))
        ));
        // A vote that never landed must not announce an update.
        assert!(broadcaster
            .messages()
            .iter()
            .all(|(_, m)| !matches!(m, ServerMessage::VoteUpdate { .. })));
    }

    #[tokio::test]
    async fn delete_poll_removes_record_and_broadcasts() {
        let (service, store, broadcaster) = service();

        let poll = service
            .create_poll("Q?".into(), None, vec!["A".into()])
            .await
            .unwrap();

        service.delete_poll(poll.id).await.unwrap();
        drain_tasks().await;

        assert!(matches!(
            service.get_poll(poll.id).await,
            Err(PollError::NotFound(_))
        ));
        assert!(store.set_members(POLLS_SET_KEY).await.unwrap().is_empty());

        let deletions: Vec<_> = broadcaster
            .messages()
            .into_iter()
            .filter(|(topic, m)| {
                topic.is_none()
                    && matches!(m, ServerMessage::PollDeleted { poll_id } if *poll_id == poll.id)
            })
            .collect();
        assert_eq!(deletions.len(), 1);
    }

    #[tokio::test]
    async fn delete_unknown_poll_is_not_found() {
        let (service, _, _) = service();
        let result = service.delete_poll(PollId::new()).await;
        assert!(matches!(result, Err(PollError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_polls_skips_ids_with_missing_records() {
        let (service, store, _) = service();

        let keep = service
            .create_poll("Keep".into(), None, vec!["A".into()])
            .await
            .unwrap();
        let gone = service
            .create_poll("Gone".into(), None, vec!["A".into()])
            .await
            .unwrap();

        // Simulate a concurrent delete that only removed the record.
        store.delete(&poll_key(gone.id)).await.unwrap();

        let polls = service.list_polls().await.unwrap();
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].id, keep.id);
    }
}
