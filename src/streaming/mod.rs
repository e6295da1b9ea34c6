//! Response Resumer (§4.4): spools tokens of an in-flight streaming
//! response to a local file and serves a replay stream so a disconnected
//! client can catch up and keep receiving live output. Exactly one
//! recorder is active per conversation across the fleet; other instances
//! are redirected to the owning one via a shared locator (§4.4.2, §6.4).
//!
//! This module owns the recording state machine and spool I/O. It does
//! not own any wire protocol — a shell adapts `ResumerRegistry`'s
//! operations onto its streaming RPC/HTTP framework.

mod recording;
mod replay;

use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use dashmap::DashMap;
use futures_util::Stream;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub use recording::Recording;
pub use replay::replay_stream;

use crate::{
    cache::{RecordingLocator, ResumerLocator},
    config::{ResumerConfig, ServerConfig},
    error::{CoreError, CoreResult},
    events::{EventBus, RecordingState, ServerEvent},
    observability::metrics,
};

/// Resolves the address this instance advertises to other instances via
/// the locator (§4.4.2), in priority order: explicit configuration,
/// an observed forwarded host/port the caller supplies, then a local
/// hostname fallback. Returns `None` (logged by the caller) if nothing
/// usable is available.
pub fn resolve_advertised_host(server: &ServerConfig, observed_host: Option<&str>) -> Option<String> {
    if let Some(explicit) = &server.advertised_address {
        return Some(explicit.clone());
    }
    if let Some(observed) = observed_host {
        return Some(observed.to_string());
    }
    std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty())
}

/// Registry of every recording currently open or closing on this
/// instance, and the entry point a shell calls for each Response Resumer
/// RPC (§4.4.4).
pub struct ResumerRegistry {
    config: ResumerConfig,
    locator: Arc<ResumerLocator>,
    events: Arc<EventBus>,
    recordings: Arc<DashMap<Uuid, Arc<Recording>>>,
}

/// Outcome of a `Replay` call: either this instance owns the recording and
/// can stream it, or another instance does and the caller must redirect.
pub enum ReplayOutcome {
    Redirect(RecordingLocator),
    Stream(Pin<Box<dyn Stream<Item = std::io::Result<Vec<u8>>> + Send>>),
}

/// Outcome of a `Cancel` call.
pub enum CancelOutcome {
    Redirect(RecordingLocator),
    /// `true` once `state=closed` was observed within the 30s bound;
    /// `false` if cancellation was registered but the wait timed out.
    /// Per §5, the caller still treats this as `accepted=true`.
    Accepted { closed_before_timeout: bool },
}

use std::pin::Pin;

impl ResumerRegistry {
    pub fn new(config: ResumerConfig, locator: Arc<ResumerLocator>, events: Arc<EventBus>) -> Self {
        Self {
            config,
            locator,
            events,
            recordings: Arc::new(DashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Begins recording a streaming response for `conversation_id`.
    /// Rejects a second concurrent writer for the same conversation on
    /// this instance; a second writer on a *different* instance is
    /// prevented only by that instance observing the locator (§5).
    pub async fn start_record(
        &self,
        conversation_id: Uuid,
        advertised_host: Option<String>,
        advertised_port: u16,
    ) -> CoreResult<RecordHandle> {
        if !self.config.enabled {
            return Err(CoreError::Unavailable("response resumer disabled".to_string()));
        }
        if self.recordings.len() >= self.config.max_concurrent_recordings {
            return Err(CoreError::Unavailable(
                "response resumer at max concurrent recordings".to_string(),
            ));
        }
        if self.recordings.contains_key(&conversation_id) {
            return Err(CoreError::conflict(
                "RECORDING_ALREADY_OPEN",
                Some(conversation_id.to_string()),
            ));
        }

        tokio::fs::create_dir_all(&self.config.spool_dir)
            .await
            .map_err(|e| CoreError::Internal(format!("failed to create spool dir: {e}")))?;

        let spool_name = format!("{conversation_id}-{}.spool", Uuid::new_v4());
        let spool_path = PathBuf::from(&self.config.spool_dir).join(&spool_name);
        let file = create_spool_file(&spool_path)
            .await
            .map_err(|e| CoreError::Internal(format!("failed to create spool file: {e}")))?;

        let recording = Arc::new(Recording::new(conversation_id, spool_path));
        self.recordings.insert(conversation_id, recording.clone());
        metrics::set_recordings_open(self.recordings.len());
        metrics::record_recording_transition("open");

        let locator_value = RecordingLocator {
            advertised_host: advertised_host.unwrap_or_else(|| "unknown".to_string()),
            advertised_port,
            spool_name,
        };
        if !self.locator.claim(conversation_id, &locator_value).await.unwrap_or(false) {
            tracing::warn!(%conversation_id, "failed to claim resumer locator on record start");
        }

        self.spawn_locator_refresh(recording.clone(), locator_value);

        Ok(RecordHandle {
            recording,
            file,
            locator: self.locator.clone(),
            events: self.events.clone(),
            registry: self.recordings_handle(),
        })
    }

    fn recordings_handle(&self) -> RecordingsHandle {
        RecordingsHandle(self.recordings.clone())
    }

    /// Refreshes the locator's TTL every `locator_refresh_secs` while the
    /// recording is open (§4.4.2). Exits as soon as the recording leaves
    /// the open state; the final `closing` transition deletes the
    /// locator itself (see `RecordHandle::complete`).
    fn spawn_locator_refresh(&self, recording: Arc<Recording>, locator_value: RecordingLocator) {
        let locator = self.locator.clone();
        let interval = Duration::from_secs(self.config.locator_refresh_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !recording.is_open() {
                    break;
                }
                locator.refresh(recording.conversation_id, &locator_value).await;
            }
        });
    }

    /// Replay (§4.4.4): require READER at the call site before invoking
    /// this. Serves the live stream if this instance holds the
    /// recording; otherwise redirects to whichever instance the locator
    /// names, or `notFound` if no locator exists.
    pub async fn replay(&self, conversation_id: Uuid) -> CoreResult<ReplayOutcome> {
        if let Some(recording) = self.recordings.get(&conversation_id) {
            let stream = replay_stream(recording.clone());
            return Ok(ReplayOutcome::Stream(Box::pin(stream)));
        }
        match self.locator.lookup(conversation_id).await {
            Some(locator) => Ok(ReplayOutcome::Redirect(locator)),
            None => Err(CoreError::not_found("recording", conversation_id.to_string())),
        }
    }

    /// Cancel (§4.4.4): require WRITER (never an agent key) at the call
    /// site. Bounds the wait for `closed` at 30 seconds but always
    /// reports acceptance once cancellation was registered locally.
    pub async fn cancel(&self, conversation_id: Uuid) -> CoreResult<CancelOutcome> {
        let Some(recording) = self.recordings.get(&conversation_id).map(|r| r.clone()) else {
            return match self.locator.lookup(conversation_id).await {
                Some(locator) => Ok(CancelOutcome::Redirect(locator)),
                None => Err(CoreError::not_found("recording", conversation_id.to_string())),
            };
        };

        recording.request_cancel();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        loop {
            if recording.is_closed() {
                return Ok(CancelOutcome::Accepted { closed_before_timeout: true });
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(CancelOutcome::Accepted { closed_before_timeout: false });
            }
            let _ = tokio::time::timeout(remaining, recording.notify.notified()).await;
        }
    }

    /// CheckRecordings (§4.4.4): the subset of `conversation_ids` with a
    /// recording in progress *on this instance*. Access filtering (the
    /// "silently drops ids the caller cannot read" rule) is the caller's
    /// responsibility, applied before or after this call.
    pub fn check_recordings(&self, conversation_ids: &[Uuid]) -> Vec<Uuid> {
        conversation_ids
            .iter()
            .copied()
            .filter(|id| self.recordings.contains_key(id))
            .collect()
    }
}

/// Shared handle to the registry's map, held by `RecordHandle` so it can
/// remove itself on completion without borrowing the registry.
#[derive(Clone)]
struct RecordingsHandle(Arc<DashMap<Uuid, Arc<Recording>>>);

async fn create_spool_file(path: &PathBuf) -> std::io::Result<tokio::fs::File> {
    let mut options = tokio::fs::OpenOptions::new();
    options.create_new(true).write(true).read(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).await
}

/// Handle the writer side of a recording uses to append tokens and, on
/// completion, release resources. The shell drives this from its inbound
/// streaming RPC handler.
pub struct RecordHandle {
    recording: Arc<Recording>,
    file: tokio::fs::File,
    locator: Arc<ResumerLocator>,
    events: Arc<EventBus>,
    registry: RecordingsHandle,
}

impl RecordHandle {
    pub fn conversation_id(&self) -> Uuid {
        self.recording.conversation_id
    }

    /// Whether the producer should stop: either `requestCancel` flipped
    /// the flag, or the cooperative cancellation token fired.
    pub fn should_stop(&self) -> bool {
        self.recording.cancel_requested() || self.recording.cancel_token.is_cancelled()
    }

    /// Appends a chunk to the spool file and bumps `lastOffset`.
    pub async fn record_chunk(&mut self, data: &[u8]) -> CoreResult<()> {
        if self.should_stop() {
            return Err(CoreError::conflict("RECORDING_CANCELLED", None));
        }
        self.file
            .write_all(data)
            .await
            .map_err(|e| CoreError::Internal(format!("spool write failed: {e}")))?;
        self.file
            .flush()
            .await
            .map_err(|e| CoreError::Internal(format!("spool flush failed: {e}")))?;
        self.recording.advance(data.len() as u64);
        Ok(())
    }

    /// Transitions `open -> closing`, deletes the locator, and starts
    /// the best-effort spool deletion path once readers drain (§4.4.3,
    /// §4.4.5). Called on normal completion, stream-end, cancellation,
    /// or spool write failure.
    pub async fn complete(self) {
        self.recording.begin_closing();
        self.recording.remove_writer();
        metrics::record_recording_transition("closing");
        self.locator.release(self.recording.conversation_id).await;
        self.events.publish(ServerEvent::RecordingStateChanged {
            conversation_id: self.recording.conversation_id,
            timestamp: now_rfc3339(),
            state: RecordingState::Closing,
        });

        if self.recording.try_close() {
            metrics::record_recording_transition("closed");
            self.events.publish(ServerEvent::RecordingStateChanged {
                conversation_id: self.recording.conversation_id,
                timestamp: now_rfc3339(),
                state: RecordingState::Closed,
            });
            let _ = tokio::fs::remove_file(&self.recording.spool_path).await;
        }
        self.registry.0.remove(&self.recording.conversation_id);
        metrics::set_recordings_open(self.registry.0.len());
    }
}

fn now_rfc3339() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;

    use super::*;
    use crate::config::ResumerConfig;

    fn test_registry(spool_dir: &std::path::Path) -> ResumerRegistry {
        let cache: Arc<dyn crate::cache::Cache> =
            Arc::new(crate::cache::MemoryCache::new(&crate::config::MemoryCacheConfig::default()));
        let locator = Arc::new(ResumerLocator::new(cache, Duration::from_secs(10)));
        let events = Arc::new(EventBus::new());
        ResumerRegistry::new(
            ResumerConfig {
                spool_dir: spool_dir.to_string_lossy().into_owned(),
                ..Default::default()
            },
            locator,
            events,
        )
    }

    #[tokio::test]
    async fn record_and_replay_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_registry(dir.path());
        let conversation_id = Uuid::new_v4();

        let mut handle = registry
            .start_record(conversation_id, Some("host".to_string()), 7443)
            .await
            .unwrap();
        handle.record_chunk(b"hello ").await.unwrap();
        handle.record_chunk(b"world").await.unwrap();

        let ReplayOutcome::Stream(mut stream) = registry.replay(conversation_id).await.unwrap() else {
            panic!("expected local stream, not redirect");
        };

        handle.complete().await;

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend(chunk.unwrap());
        }
        assert_eq!(collected, b"hello world");
    }

    #[tokio::test]
    async fn second_concurrent_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_registry(dir.path());
        let conversation_id = Uuid::new_v4();

        let _handle = registry
            .start_record(conversation_id, None, 7443)
            .await
            .unwrap();
        let second = registry.start_record(conversation_id, None, 7443).await;
        assert!(matches!(second, Err(CoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn replay_without_a_recording_or_locator_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_registry(dir.path());
        let err = registry.replay(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn cancel_marks_closing_and_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_registry(dir.path());
        let conversation_id = Uuid::new_v4();

        let handle = registry.start_record(conversation_id, None, 7443).await.unwrap();
        assert!(!handle.should_stop());

        let cancel_task = {
            let conversation_id = conversation_id;
            tokio::spawn(async move { registry.cancel(conversation_id).await })
        };

        // Give the cancel call a moment to register, then let the writer
        // observe it and complete, as the real producer contract requires.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.should_stop());
        handle.complete().await;

        let outcome = cancel_task.await.unwrap().unwrap();
        assert!(matches!(outcome, CancelOutcome::Accepted { closed_before_timeout: true }));
    }
}
