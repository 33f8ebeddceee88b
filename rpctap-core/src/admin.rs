//! Admin command channel
//!
//! A line-oriented text listener on a dedicated socket. The only
//! recognized verb is `EXIT` (case-insensitive, trailing arguments
//! ignored), which triggers orderly shutdown. Anything else — a
//! malformed line, an empty read, an accept failure — is logged and
//! the listener keeps accepting. The admin channel never crashes the
//! process.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::Result;

/// Shutdown signal shared between the admin channel and the serve loop.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Admin listener bound to its own port.
pub struct AdminChannel {
    listener: TcpListener,
    shutdown_tx: watch::Sender<bool>,
}

impl AdminChannel {
    /// Bind the admin listener. Binding failure is fatal to startup.
    pub async fn bind(addr: SocketAddr) -> Result<(Self, ShutdownSignal)> {
        let listener = TcpListener::bind(addr).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok((
            Self {
                listener,
                shutdown_tx,
            },
            shutdown_rx,
        ))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and process commands until `EXIT` arrives.
    pub async fn run(self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!("Admin accept failed: {e}");
                    continue;
                }
            };

            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    tracing::error!("No command read from admin socket ({peer})");
                }
                Ok(_) => {
                    if self.handle_command(&line, peer) {
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!("Admin read failed ({peer}): {e}");
                }
            }
        }
    }

    /// Returns true when the command requests shutdown.
    fn handle_command(&self, line: &str, peer: SocketAddr) -> bool {
        let verb = line
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase();

        match verb.as_str() {
            "EXIT" => {
                tracing::info!("Admin channel received EXIT, stopping");
                let _ = self.shutdown_tx.send(true);
                true
            }
            "" => {
                tracing::warn!("Empty admin command from {peer}");
                false
            }
            other => {
                tracing::warn!("Unknown admin command from {peer}: {other}");
                false
            }
        }
    }
}
