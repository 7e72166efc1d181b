//! The live session table.
//!
//! Sessions are owned exclusively by the registry; other components see
//! an `Arc<StreamSession>` only for the scope of a single dispatch.
//! There is no reliable transport-level close signal for the stream
//! connections, so liveness is inferred from sink write failures
//! (heartbeat broadcast) and activity timestamps (idle sweep).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trove_core::SessionId;
use trove_rpc::RpcResponse;

use crate::frames::SessionFrame;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A single live stream session: an identity, a sink, and activity
/// timestamps.
pub struct StreamSession {
    id: SessionId,
    tx: mpsc::Sender<SessionFrame>,
    created_at: DateTime<Utc>,
    last_activity_ms: AtomicU64,
}

impl StreamSession {
    fn new(id: SessionId, tx: mpsc::Sender<SessionFrame>) -> Self {
        Self {
            id,
            tx,
            created_at: Utc::now(),
            last_activity_ms: AtomicU64::new(now_ms()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Refresh the activity timestamp.
    pub fn touch(&self) {
        self.last_activity_ms.store(now_ms(), Ordering::Relaxed);
    }

    /// How long since the last inbound message or outbound delivery.
    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_ms().saturating_sub(last))
    }

    /// Attempt to push a frame into the sink without blocking.
    fn send(&self, frame: SessionFrame) -> Result<(), mpsc::error::TrySendError<SessionFrame>> {
        self.tx.try_send(frame)
    }
}

/// In-memory table of live stream sessions.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<StreamSession>>,
    sink_queue_depth: usize,
}

impl SessionRegistry {
    pub fn new(sink_queue_depth: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            sink_queue_depth,
        }
    }

    /// Allocate a fresh session and return its id plus the receiving end
    /// of the sink. Never blocks.
    pub fn open(&self) -> (SessionId, mpsc::Receiver<SessionFrame>) {
        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(self.sink_queue_depth);
        let session = Arc::new(StreamSession::new(id.clone(), tx));
        let _ = self.sessions.insert(id.clone(), session);
        (id, rx)
    }

    pub fn lookup(&self, id: &SessionId) -> Option<Arc<StreamSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Refresh a session's activity timestamp. No-op when absent.
    pub fn touch(&self, id: &SessionId) -> bool {
        match self.sessions.get(id) {
            Some(entry) => {
                entry.value().touch();
                true
            }
            None => false,
        }
    }

    /// Remove a session. Dropping the sender closes the sink; an
    /// already-closed sink is tolerated. Idempotent.
    pub fn close(&self, id: &SessionId) -> bool {
        if self.sessions.remove(id).is_some() {
            info!(session_id = %id, "session closed");
            true
        } else {
            false
        }
    }

    /// Deliver a dispatched response through a session's sink.
    ///
    /// A session closed in the interim fails closed: the response is
    /// dropped and the session is never recreated. A closed sink removes
    /// the session; a full sink drops the frame but leaves the session
    /// for the heartbeat broadcast to judge.
    pub fn deliver_response(&self, id: &SessionId, response: RpcResponse) -> bool {
        let Some(session) = self.lookup(id) else {
            warn!(session_id = %id, "response dropped, session no longer open");
            return false;
        };
        match session.send(SessionFrame::ToolResponse(response)) {
            Ok(()) => {
                session.touch();
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                let _ = self.close(id);
                false
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %id, "sink full, response dropped");
                false
            }
        }
    }

    /// Broadcast one heartbeat frame to every live session.
    ///
    /// Successful delivery counts as activity; any delivery failure is
    /// evidence the session is dead and removes it immediately rather
    /// than waiting for the sweep. Returns the number of sessions
    /// removed.
    pub fn broadcast_heartbeat(&self) -> usize {
        // Snapshot, then act: never hold a table reference across sends.
        let snapshot: Vec<Arc<StreamSession>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut dead = Vec::new();
        for session in snapshot {
            match session.send(SessionFrame::heartbeat()) {
                Ok(()) => session.touch(),
                Err(_) => dead.push(session.id().clone()),
            }
        }

        let mut removed = 0;
        for id in dead {
            if self.close(&id) {
                removed += 1;
                debug!(session_id = %id, "heartbeat failed, session removed");
            }
        }
        removed
    }

    /// Close every session idle longer than `idle_threshold`. This is
    /// the only reclamation path for clients that vanished without a
    /// clean disconnect. Returns the number of sessions closed.
    pub fn sweep(&self, idle_threshold: Duration) -> usize {
        let stale: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > idle_threshold)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in stale {
            if self.close(&id) {
                removed += 1;
                debug!(session_id = %id, "idle session swept");
            }
        }
        removed
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

/// Spawn the periodic heartbeat broadcast.
pub fn start_heartbeat_task(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = registry.broadcast_heartbeat();
                    if removed > 0 {
                        info!(removed, "dead sessions removed on heartbeat");
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}

/// Spawn the periodic idle sweep.
pub fn start_sweep_task(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    idle_threshold: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = registry.sweep(idle_threshold);
                    if removed > 0 {
                        info!(removed, "idle sessions swept");
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}
