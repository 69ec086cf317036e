//! Line-based TCP adapter.
//!
//! One reader task per connection feeds lines to the command pipeline; one
//! drain task writes the session's outbound queue back, one line per
//! message. A leading `/` on input is stripped here.

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::session::Connection;
use crate::world::sync::lock;
use crate::world::World;

const WELCOME: &str =
    "Welcome. Use 'login <name> <password>' or 'create <name> <password>'. Type 'help' for commands.";

struct TcpConnection {
    peer: SocketAddr,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl Connection for TcpConnection {
    fn peer(&self) -> String {
        self.peer.to_string()
    }

    fn close(&self) -> io::Result<()> {
        match lock(&self.shutdown).take() {
            Some(tx) => tx
                .send(())
                .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "reader already gone")),
            None => Ok(()),
        }
    }
}

/// Accept connections until the listener fails.
pub async fn run(world: Arc<World>, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow!("Failed to bind {}: {}", bind, e))?;
    info!("server.listen addr={}", bind);
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("server.accept_failed error={}", e);
                continue;
            }
        };
        let world = Arc::clone(&world);
        tokio::spawn(async move {
            handle_connection(world, stream, peer).await;
        });
    }
}

async fn handle_connection(world: Arc<World>, stream: TcpStream, peer: SocketAddr) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut shutdown) = oneshot::channel();
    let connection = TcpConnection {
        peer,
        shutdown: Mutex::new(Some(tx)),
    };
    let session = match world.connect(Box::new(connection)) {
        Ok(session) => session,
        Err(e) => {
            let _ = write_half
                .write_all(format!("{}\r\n", e.user_message()).as_bytes())
                .await;
            return;
        }
    };
    session.send(WELCOME);

    let drain = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(message) = session.queue().recv().await {
                let line = format!("{}\r\n", message.replace('\n', "\r\n"));
                if let Err(e) = write_half.write_all(line.as_bytes()).await {
                    debug!("server.write_failed session={} error={}", session.id(), e);
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        })
    };

    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let input = line.trim();
                    let input = input.strip_prefix('/').unwrap_or(input);
                    world.process_command(&session, input);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("server.read_failed session={} error={}", session.id(), e);
                    break;
                }
            }
        }
    }

    world.disconnect(&session);
    let _ = drain.await;
}
