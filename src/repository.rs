use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;

use crate::cache::keys::{review_state_key, user_review_pattern, REVIEW_STATE_TTL};
use crate::cache::{CacheError, LocalCache};
use crate::clock::Clock;
use crate::scheduler::{due_queue, grade, Grade, ReviewState};
use crate::store::KeyValueStore;

/// Ids per remote request when loading many review states.
pub const FETCH_BATCH_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("remote store rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Remote document store holding review states by document id.
pub trait DocumentStore {
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ReviewState>, RemoteError>> + Send;

    /// Returns the records that exist among `ids`; absent ids are skipped.
    fn get_many(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<ReviewState>, RemoteError>> + Send;

    fn set(
        &self,
        id: &str,
        record: &ReviewState,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

impl<D: DocumentStore> DocumentStore for Arc<D> {
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ReviewState>, RemoteError>> + Send {
        (**self).get(id)
    }

    fn get_many(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<ReviewState>, RemoteError>> + Send {
        (**self).get_many(ids)
    }

    fn set(
        &self,
        id: &str,
        record: &ReviewState,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).set(id, record)
    }
}

pub fn document_id(user_id: &str, word_id: &str) -> String {
    format!("{}_{}", user_id, word_id)
}

/// One user's review states, read through the local cache and written
/// through to both the cache and the remote store.
pub struct ReviewRepository<D, S, C> {
    user_id: String,
    remote: D,
    cache: Arc<LocalCache<S, C>>,
}

impl<D, S, C> ReviewRepository<D, S, C>
where
    D: DocumentStore,
    S: KeyValueStore,
    C: Clock,
{
    pub fn new(user_id: impl Into<String>, remote: D, cache: Arc<LocalCache<S, C>>) -> Self {
        Self {
            user_id: user_id.into(),
            remote,
            cache,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn cache(&self) -> &LocalCache<S, C> {
        &self.cache
    }

    /// Cached or remote state; a fresh default state for words never studied.
    pub async fn load(&self, word_id: &str) -> Result<ReviewState, RepositoryError> {
        let key = review_state_key(&self.user_id, word_id);
        if let Some(state) = self.cache.get::<ReviewState>(&key) {
            return Ok(state);
        }

        match self.remote.get(&document_id(&self.user_id, word_id)).await? {
            Some(state) => {
                self.cache.set(&key, &state, Some(REVIEW_STATE_TTL));
                Ok(state)
            }
            None => Ok(ReviewState::new(word_id)),
        }
    }

    /// States for `word_ids`, in the same order. Cache misses are fetched in
    /// chunks of [`FETCH_BATCH_SIZE`], all chunks in flight together.
    pub async fn load_many(&self, word_ids: &[String]) -> Result<Vec<ReviewState>, RepositoryError> {
        let mut found: HashMap<String, ReviewState> = HashMap::with_capacity(word_ids.len());
        let mut missing = Vec::new();
        let mut requested = HashSet::new();

        for word_id in word_ids {
            if !requested.insert(word_id.as_str()) {
                continue;
            }
            let key = review_state_key(&self.user_id, word_id);
            match self.cache.get::<ReviewState>(&key) {
                Some(state) => {
                    found.insert(word_id.clone(), state);
                }
                None => missing.push(document_id(&self.user_id, word_id)),
            }
        }

        if !missing.is_empty() {
            tracing::debug!(
                user_id = %self.user_id,
                missing = missing.len(),
                batches = missing.len().div_ceil(FETCH_BATCH_SIZE),
                "fetching review states"
            );

            let batches = try_join_all(
                missing
                    .chunks(FETCH_BATCH_SIZE)
                    .map(|chunk| self.remote.get_many(chunk)),
            )
            .await?;

            for state in batches.into_iter().flatten() {
                if !requested.contains(state.word_id.as_str()) {
                    continue;
                }
                let key = review_state_key(&self.user_id, &state.word_id);
                self.cache.set(&key, &state, Some(REVIEW_STATE_TTL));
                found.insert(state.word_id.clone(), state);
            }
        }

        Ok(word_ids
            .iter()
            .map(|word_id| {
                found
                    .get(word_id)
                    .cloned()
                    .unwrap_or_else(|| ReviewState::new(word_id.as_str()))
            })
            .collect())
    }

    /// Grades one answer and writes the new state to the cache, then the
    /// remote store. A failed remote write leaves the cached state in place.
    pub async fn record_review(
        &self,
        word_id: &str,
        outcome: Grade,
    ) -> Result<ReviewState, RepositoryError> {
        let current = self.load(word_id).await?;
        let next = grade(&current, outcome, self.cache.clock().now());

        let key = review_state_key(&self.user_id, word_id);
        self.cache.set(&key, &next, Some(REVIEW_STATE_TTL));

        if let Err(err) = self
            .remote
            .set(&document_id(&self.user_id, word_id), &next)
            .await
        {
            tracing::warn!(
                user_id = %self.user_id,
                word_id,
                error = %err,
                "failed to persist review state remotely"
            );
            return Err(err.into());
        }

        tracing::debug!(
            user_id = %self.user_id,
            word_id,
            grade = %outcome,
            interval = next.interval,
            "review recorded"
        );
        Ok(next)
    }

    /// The due subset of `word_ids`, ordered for review.
    pub async fn review_queue(&self, word_ids: &[String]) -> Result<Vec<ReviewState>, RepositoryError> {
        let states = self.load_many(word_ids).await?;
        let now = self.cache.clock().now();
        Ok(due_queue(&states, now).into_iter().cloned().collect())
    }

    /// Drops this user's cached review states.
    pub fn invalidate(&self) -> Result<usize, RepositoryError> {
        Ok(self.cache.remove_pattern(&user_review_pattern(&self.user_id))?)
    }
}
