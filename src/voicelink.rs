//! Hand-off point to the audio engine.
//!
//! Playback itself happens in the voicelink node; this crate only queues
//! validated requests for it, per guild, in arrival order. The engine takes
//! requests with [`Voicelink::next`]. A guild holds at most `max_queue`
//! pending requests and the oldest one is dropped to make room.

use crate::error::BotResult;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

/// Default number of pending requests a guild may hold
pub const DEFAULT_MAX_QUEUE: usize = 1000;

/// A play request waiting for the audio engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    pub guild_id: u64,
    pub channel_id: u64,
    pub requester_id: u64,
    pub query: String,
}

#[async_trait]
pub trait Voicelink: Send + Sync {
    /// Queue a request and return its 1-based position
    async fn enqueue(&self, request: TrackRequest) -> BotResult<usize>;

    /// Pending requests of a guild, oldest first
    async fn pending(&self, guild_id: u64) -> Vec<TrackRequest>;

    /// Take the oldest pending request of a guild
    async fn next(&self, guild_id: u64) -> Option<TrackRequest>;
}

/// In-process request queue read by the audio engine
#[derive(Debug)]
pub struct RequestQueue {
    queues: RwLock<HashMap<u64, VecDeque<TrackRequest>>>,
    max_queue: usize,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE)
    }
}

impl RequestQueue {
    pub fn new(max_queue: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            max_queue: max_queue.max(1),
        }
    }

    /// Number of guilds with pending requests
    pub async fn guild_count(&self) -> usize {
        self.queues.read().await.len()
    }
}

#[async_trait]
impl Voicelink for RequestQueue {
    async fn enqueue(&self, request: TrackRequest) -> BotResult<usize> {
        let mut queues = self.queues.write().await;
        let queue = queues.entry(request.guild_id).or_default();
        while queue.len() >= self.max_queue {
            if let Some(dropped) = queue.pop_front() {
                debug!(
                    "Queue of guild {} is full, dropping {:?}",
                    dropped.guild_id, dropped.query
                );
            }
        }
        queue.push_back(request);
        Ok(queue.len())
    }

    async fn pending(&self, guild_id: u64) -> Vec<TrackRequest> {
        let queues = self.queues.read().await;
        queues
            .get(&guild_id)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn next(&self, guild_id: u64) -> Option<TrackRequest> {
        let mut queues = self.queues.write().await;
        let queue = queues.get_mut(&guild_id)?;
        let request = queue.pop_front();
        if queue.is_empty() {
            queues.remove(&guild_id);
        }
        request
    }
}
