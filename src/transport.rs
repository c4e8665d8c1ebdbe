// src/transport.rs - Newline-delimited JSON position feed over TCP
use std::io::{BufRead, BufReader};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;

use crate::error::ConnectionError;
use crate::landmarks::Landmark;

/// Reads `{"x": .., "y": ..}` lines from an external tracker on a dedicated
/// thread. Positions come out in receipt order.
pub struct SocketFeed {
    stream: TcpStream,
    positions: Receiver<Landmark>,
    reader: Option<JoinHandle<ConnectionError>>,
}

impl SocketFeed {
    pub fn connect(addr: &str) -> Result<Self, ConnectionError> {
        let stream = TcpStream::connect(addr).map_err(|source| ConnectionError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        let read_half = stream.try_clone()?;
        let (tx, rx) = mpsc::channel();

        let reader = std::thread::Builder::new()
            .name("socket-feed".to_string())
            .spawn(move || {
                let reason = read_positions(read_half, |position| tx.send(position).is_ok());
                tracing::info!("socket feed stopped: {}", reason);
                reason
            })?;

        tracing::info!(addr, "socket feed connected");
        Ok(Self {
            stream,
            positions: rx,
            reader: Some(reader),
        })
    }

    /// Everything received since the last call, oldest first.
    pub fn drain(&self) -> Vec<Landmark> {
        self.positions.try_iter().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.reader
            .as_ref()
            .map(|reader| !reader.is_finished())
            .unwrap_or(false)
    }

    /// Closes the connection and joins the reader thread. Returns why the
    /// reader stopped, or `None` if it was already shut down.
    pub fn shutdown(&mut self) -> Option<ConnectionError> {
        let reader = self.reader.take()?;
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!("socket already closed: {}", e);
        }
        match reader.join() {
            Ok(reason) => Some(reason),
            Err(_) => {
                tracing::error!("socket feed reader panicked");
                None
            }
        }
    }
}

impl Drop for SocketFeed {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pumps records into `deliver` until the peer goes away or `deliver`
/// refuses one. Malformed lines are skipped.
fn read_positions(stream: TcpStream, mut deliver: impl FnMut(Landmark) -> bool) -> ConnectionError {
    for line in BufReader::new(stream).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => return ConnectionError::Lost(e),
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Landmark>(&line) {
            Ok(position) => {
                if !deliver(position) {
                    break;
                }
            }
            Err(e) => tracing::warn!("dropping malformed position record: {}", e),
        }
    }
    ConnectionError::Closed
}
