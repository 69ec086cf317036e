//! # Player Sessions
//!
//! A [`PlayerSession`] is the per-connection actor: it owns the bounded
//! outbound queue and, once logged in, exactly one attached
//! [`Character`]. It is the only path from a world mutation to a specific
//! human's screen.
//!
//! ## Lifecycle
//!
//! 1. **Connecting** - constructed, not yet in the session set
//! 2. **Active** - in the set, with or without an attached character
//! 3. **Disconnecting** - logout effects running
//! 4. **Closed** - out of the set, queue closed
//!
//! [`SessionManager::disconnect`] is the only way out of `Active` and the only
//! place a character is detached. It runs at most once per session.

pub mod queue;

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::config::SessionConfig;
use crate::logutil::escape_log;
use crate::metrics;
use crate::world::character::Character;
use crate::world::errors::WorldError;
use crate::world::sync::{lock, read, write};
use crate::world::World;

pub use queue::{OutboundQueue, OverflowPolicy, SendOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Disconnecting,
    Closed,
}

/// Transport handle owned by a session. Closing is best effort; failures are
/// logged by the disconnect path and never propagated.
pub trait Connection: Send + Sync {
    fn peer(&self) -> String;
    fn close(&self) -> io::Result<()>;
}

struct SessionInner {
    state: SessionState,
    character: Option<Arc<Character>>,
    last_activity: DateTime<Utc>,
}

pub struct PlayerSession {
    id: SessionId,
    peer: String,
    connected_at: DateTime<Utc>,
    inner: RwLock<SessionInner>,
    queue: OutboundQueue,
    connection: Mutex<Option<Box<dyn Connection>>>,
}

impl fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerSession")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PlayerSession {
    fn new(id: SessionId, connection: Box<dyn Connection>, config: &SessionConfig) -> Self {
        let now = Utc::now();
        let peer = connection.peer();
        Self {
            id,
            queue: OutboundQueue::new(
                format!("{}@{}", id, peer),
                config.queue_capacity,
                config.overflow_policy,
            ),
            peer,
            connected_at: now,
            inner: RwLock::new(SessionInner {
                state: SessionState::Connecting,
                character: None,
                last_activity: now,
            }),
            connection: Mutex::new(Some(connection)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        read(&self.inner).last_activity
    }

    pub fn touch(&self) {
        write(&self.inner).last_activity = Utc::now();
    }

    pub fn state(&self) -> SessionState {
        read(&self.inner).state
    }

    fn set_state(&self, state: SessionState) {
        write(&self.inner).state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn character(&self) -> Option<Arc<Character>> {
        read(&self.inner).character.clone()
    }

    /// Bind `character` to this session. The caller has already claimed the
    /// character's back-reference.
    pub(crate) fn attach(&self, character: Arc<Character>) -> Result<(), WorldError> {
        let mut inner = write(&self.inner);
        if inner.state != SessionState::Active {
            return Err(WorldError::SessionClosed);
        }
        if inner.character.is_some() {
            return Err(WorldError::AlreadyAttached);
        }
        inner.character = Some(character);
        Ok(())
    }

    fn detach(&self) -> Option<Arc<Character>> {
        write(&self.inner).character.take()
    }

    /// Queue a message for this session's drain task.
    pub fn send(&self, text: impl Into<String>) -> SendOutcome {
        self.queue.push(text)
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }
}

/// The set of live sessions.
pub struct SessionManager {
    config: SessionConfig,
    sessions: Mutex<HashMap<SessionId, Arc<PlayerSession>>>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection. Fails with [`WorldError::SessionLimit`] when
    /// `max_sessions` is reached; the connection is closed in that case.
    pub fn connect(&self, connection: Box<dyn Connection>) -> Result<Arc<PlayerSession>, WorldError> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(PlayerSession::new(id, connection, &self.config));
        let total = {
            let mut sessions = lock(&self.sessions);
            if self.config.max_sessions > 0 && sessions.len() >= self.config.max_sessions {
                drop(sessions);
                warn!(
                    target: "mushcore::sessions",
                    "session.reject peer={} reason=limit max={}",
                    escape_log(session.peer()),
                    self.config.max_sessions
                );
                close_connection(&session);
                return Err(WorldError::SessionLimit(self.config.max_sessions));
            }
            session.set_state(SessionState::Active);
            sessions.insert(id, Arc::clone(&session));
            sessions.len()
        };
        metrics::inc_sessions_opened();
        info!(
            target: "mushcore::sessions",
            "session.open id={} peer={} total={}",
            id,
            escape_log(session.peer()),
            total
        );
        Ok(session)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<PlayerSession>> {
        lock(&self.sessions).get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Characters attached to a live session, sorted by name.
    pub fn online_characters(&self) -> Vec<Arc<Character>> {
        let mut online: Vec<Arc<Character>> = lock(&self.sessions)
            .values()
            .filter_map(|s| s.character())
            .collect();
        online.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        online
    }

    /// Tear a session down. Returns `false` when the session was already
    /// removed, so a second call is a harmless no-op.
    ///
    /// Everything runs while the session set is locked: logout effects, the
    /// detach, closing the connection and queue, and removal from the set.
    pub fn disconnect(&self, world: &World, session: &Arc<PlayerSession>) -> bool {
        let mut sessions = lock(&self.sessions);
        match sessions.get(&session.id()) {
            Some(current) if Arc::ptr_eq(current, session) => {}
            _ => return false,
        }
        session.set_state(SessionState::Disconnecting);

        let character_name = match session.detach() {
            Some(character) => {
                world.character_logged_out(&character);
                character.release();
                Some(character.name().to_string())
            }
            None => None,
        };

        let pending = session.queue.len();
        if pending > 0 {
            warn!(
                target: "mushcore::sessions",
                "session.disconnect.pending id={} pending={}",
                session.id(),
                pending
            );
        }
        close_connection(session);
        session.queue.close();
        sessions.remove(&session.id());
        let remaining = sessions.len();
        session.set_state(SessionState::Closed);
        drop(sessions);

        metrics::inc_sessions_closed();
        info!(
            target: "mushcore::sessions",
            "session.close id={} peer={} character={} remaining={}",
            session.id(),
            escape_log(session.peer()),
            character_name.as_deref().map(escape_log).unwrap_or_else(|| "-".into()),
            remaining
        );
        true
    }
}

fn close_connection(session: &PlayerSession) {
    let connection = lock(&session.connection).take();
    if let Some(connection) = connection {
        if let Err(e) = connection.close() {
            warn!(
                target: "mushcore::sessions",
                "session.close_failed id={} peer={} error={}",
                session.id(),
                escape_log(session.peer()),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingConnection {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Connection for CountingConnection {
        fn peer(&self) -> String {
            "test:1".into()
        }

        fn close(&self) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            } else {
                Ok(())
            }
        }
    }

    fn counting(fail: bool) -> (Box<dyn Connection>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (Box::new(CountingConnection { closes: closes.clone(), fail }), closes)
    }

    #[test]
    fn session_limit_rejects_and_closes() {
        let manager = SessionManager::new(SessionConfig {
            max_sessions: 1,
            ..SessionConfig::default()
        });
        let (first, _) = counting(false);
        manager.connect(first).unwrap();
        let (second, closes) = counting(false);
        assert_eq!(manager.connect(second).unwrap_err(), WorldError::SessionLimit(1));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn new_sessions_are_active_with_distinct_ids() {
        let manager = SessionManager::new(SessionConfig::default());
        let a = manager.connect(counting(false).0).unwrap();
        let b = manager.connect(counting(false).0).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.is_active());
        assert!(manager.get(b.id()).is_some());
    }

    #[test]
    fn failed_close_does_not_leak_to_caller() {
        let manager = SessionManager::new(SessionConfig::default());
        let (conn, closes) = counting(true);
        let session = manager.connect(conn).unwrap();
        close_connection(&session);
        close_connection(&session);
        assert_eq!(closes.load(Ordering::SeqCst), 1, "close is attempted once");
    }
}
