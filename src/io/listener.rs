//! Inbound command listener
//!
//! A dedicated thread reads the parameter socket and applies keyed JSON
//! updates to the shared [`ParamStore`]. The socket read carries a 100 ms
//! timeout so the thread can poll the shutdown flag and exit well inside
//! the engine's join budget.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::EngineError;
use crate::params::ParamStore;

/// Largest accepted parameter datagram
const MAX_DATAGRAM: usize = 1024;

/// How often the listener wakes to poll the shutdown flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawn the command listener thread
///
/// # Errors
///
/// Returns `EngineError::Io` when the command port cannot be bound; this
/// is fatal at init time.
pub fn spawn_listener(
    addr: SocketAddr,
    store: ParamStore,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, EngineError> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_read_timeout(Some(POLL_INTERVAL))?;
    log::info!("listening for parameter updates on {}", addr);

    let handle = std::thread::Builder::new()
        .name("nd-commands".to_string())
        .spawn(move || listen_loop(socket, store, shutdown))
        .map_err(EngineError::Io)?;
    Ok(handle)
}

fn listen_loop(socket: UdpSocket, store: ParamStore, shutdown: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, _peer)) => {
                store.apply_datagram(&buf[..len]);
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => {
                log::warn!("command socket error: {}", err);
            }
        }
    }
    log::debug!("command listener exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_listener_applies_updates_and_shuts_down() {
        let store = ParamStore::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        // Bind on an ephemeral port to keep the test isolated.
        let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);

        let handle = spawn_listener(addr, store.clone(), shutdown.clone()).unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(br#"{"flux_sens": 2.5}"#, addr)
            .unwrap();

        // Give the listener a few poll cycles to pick the datagram up.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while store.snapshot().flux_sens != 2.5 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(store.snapshot().flux_sens, 2.5);

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn test_bind_failure_is_fatal() {
        let holder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = holder.local_addr().unwrap();

        let store = ParamStore::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        assert!(spawn_listener(addr, store, shutdown).is_err());
    }
}
