//! Test utilities & fixtures.
//! Worlds here use deliberately cheap Argon2 parameters so login-heavy tests stay fast.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mushcore::config::{Argon2Config, Config};
use mushcore::session::{Connection, PlayerSession};
use mushcore::world::World;

pub const PASSWORD: &str = "Password123";

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.security.argon2 = Some(Argon2Config {
        memory_kib: Some(8),
        time_cost: Some(1),
        parallelism: Some(1),
    });
    config
}

#[allow(dead_code)]
pub fn test_world() -> World {
    World::new(test_config()).expect("world")
}

/// Connection double recording whether the transport was asked to close.
pub struct TestConnection {
    peer: String,
    closed: Arc<AtomicBool>,
}

impl TestConnection {
    #[allow(dead_code)]
    pub fn new(peer: &str, closed: Arc<AtomicBool>) -> Self {
        Self {
            peer: peer.to_string(),
            closed,
        }
    }
}

impl Connection for TestConnection {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[allow(dead_code)]
pub fn connect(world: &World, peer: &str) -> (Arc<PlayerSession>, Arc<AtomicBool>) {
    let closed = Arc::new(AtomicBool::new(false));
    let session = world
        .connect(Box::new(TestConnection::new(peer, Arc::clone(&closed))))
        .expect("connect");
    (session, closed)
}

/// Everything queued for `session` so far, oldest first.
#[allow(dead_code)]
pub fn drain(session: &PlayerSession) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(message) = session.queue().try_recv() {
        out.push(message);
    }
    out
}

/// Connect and create a character named `name`, discarding the greeting output.
#[allow(dead_code)]
pub fn player(world: &World, name: &str) -> Arc<PlayerSession> {
    let (session, _) = connect(world, &format!("{}-peer", name.to_lowercase()));
    world.process_command(&session, &format!("create {} {}", name, PASSWORD));
    assert!(session.character().is_some(), "character {} should be attached", name);
    drain(&session);
    session
}

/// Run one line and return what it queued.
#[allow(dead_code)]
pub fn run(world: &World, session: &Arc<PlayerSession>, input: &str) -> Vec<String> {
    world.process_command(session, input);
    drain(session)
}
