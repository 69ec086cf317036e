//! Process-wide counters for sessions, commands and outbound delivery.
use std::sync::atomic::{AtomicU64, Ordering};

static SESSIONS_OPENED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_CLOSED: AtomicU64 = AtomicU64::new(0);
static COMMANDS_EXECUTED: AtomicU64 = AtomicU64::new(0);
static COMMANDS_REJECTED: AtomicU64 = AtomicU64::new(0);
static MESSAGES_ENQUEUED: AtomicU64 = AtomicU64::new(0);
static MESSAGES_DROPPED: AtomicU64 = AtomicU64::new(0);
static INVARIANT_VIOLATIONS: AtomicU64 = AtomicU64::new(0);
static SCRIPT_FAILURES: AtomicU64 = AtomicU64::new(0);

pub fn inc_sessions_opened() {
    SESSIONS_OPENED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_sessions_closed() {
    SESSIONS_CLOSED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_commands_executed() {
    COMMANDS_EXECUTED.fetch_add(1, Ordering::Relaxed);
}
/// Unknown, denied or malformed input that never reached a handler.
pub fn inc_commands_rejected() {
    COMMANDS_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_messages_enqueued() {
    MESSAGES_ENQUEUED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_messages_dropped() {
    MESSAGES_DROPPED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_invariant_violations() {
    INVARIANT_VIOLATIONS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_script_failures() {
    SCRIPT_FAILURES.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub commands_executed: u64,
    pub commands_rejected: u64,
    pub messages_enqueued: u64,
    pub messages_dropped: u64,
    pub invariant_violations: u64,
    pub script_failures: u64,
}

impl Snapshot {
    /// Sessions opened and not yet closed.
    pub fn sessions_live(&self) -> u64 {
        self.sessions_opened.saturating_sub(self.sessions_closed)
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        sessions_opened: SESSIONS_OPENED.load(Ordering::Relaxed),
        sessions_closed: SESSIONS_CLOSED.load(Ordering::Relaxed),
        commands_executed: COMMANDS_EXECUTED.load(Ordering::Relaxed),
        commands_rejected: COMMANDS_REJECTED.load(Ordering::Relaxed),
        messages_enqueued: MESSAGES_ENQUEUED.load(Ordering::Relaxed),
        messages_dropped: MESSAGES_DROPPED.load(Ordering::Relaxed),
        invariant_violations: INVARIANT_VIOLATIONS.load(Ordering::Relaxed),
        script_failures: SCRIPT_FAILURES.load(Ordering::Relaxed),
    }
}
