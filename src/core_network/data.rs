use crate::config::ClientConfig;
use crate::constants::{ACCEPT_RETRY_DELAY, DATA_GREETING};
use crate::core_error::ClientError;
use crate::core_transfer::{receive_framed, ConsoleSink, FileSink, ReceiveOutcome};
use crate::helpers::{report_error, report_warning, sanitize_input, send_response};
use crate::session::{CommandMode, SessionState, TransferKind};
use log::{debug, error, info, trace, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// Binds the data listener once for the whole session.
pub async fn bind_data_listener(port: u16) -> io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1)?;
    debug!("Data socket listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accepts the server's data connections and runs the pending transfer on each.
pub struct DataWorker {
    listener: TcpListener,
    state: Arc<SessionState>,
    config: Arc<ClientConfig>,
}

impl DataWorker {
    pub fn new(listener: TcpListener, state: Arc<SessionState>, config: Arc<ClientConfig>) -> Self {
        Self {
            listener,
            state,
            config,
        }
    }

    /// Serves data connections until shutdown. Outside shell mode the worker
    /// stops after the first transfer cycle.
    ///
    /// The session shuts down whenever the worker goes away, including on a
    /// fatal error or when its task is aborted (see the `Drop` impl).
    pub async fn run(self) -> Result<(), ClientError> {
        let single_shot = self.state.mode != CommandMode::Shell;

        loop {
            let (stream, addr) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept data connection: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                        continue;
                    }
                },
                _ = self.state.shutdown.wait() => break,
            };
            info!("Accepted data connection from {}", addr);

            let pending = self.state.snapshot();
            trace!(
                "Pending transfer: awaiting_file={} awaiting_list={}",
                pending.awaiting_file(),
                pending.awaiting_list()
            );
            let Some(kind) = pending.active else {
                warn!("Data connection from {} with no pending transfer, closing it", addr);
                continue;
            };

            let result = self.serve_transfer(stream, kind).await;
            if single_shot {
                return result;
            }
            if let Err(e) = result {
                if e.is_fatal() {
                    return Err(e);
                }
                report_error(&e.to_operator_message());
            }
        }

        debug!("Closing data listener");
        Ok(())
    }

    /// Runs one transfer cycle. The data connection is closed on return.
    async fn serve_transfer(&self, mut stream: TcpStream, kind: TransferKind) -> Result<(), ClientError> {
        if let Err(e) = send_response(&mut stream, DATA_GREETING).await {
            self.state.abandon_transfer(None);
            return Err(e.into());
        }
        trace!("Data greeting sent");

        match kind {
            TransferKind::List => self.receive_list(&mut stream).await,
            TransferKind::Get(filename) => self.receive_file(&mut stream, &filename).await,
        }
    }

    async fn receive_list(&self, stream: &mut TcpStream) -> Result<(), ClientError> {
        println!("Receiving directory structure from server");
        let mut sink = ConsoleSink::stdout();
        let outcome = receive_framed(
            stream,
            &mut sink,
            &self.state.shutdown,
            self.config.recv_buffer_size,
            self.config.idle_timeout(),
        )
        .await;

        match outcome {
            Ok(ReceiveOutcome::Completed(len)) => {
                debug!("Directory listing received ({} bytes)", len);
                self.state.complete_transfer(None);
                Ok(())
            }
            Ok(ReceiveOutcome::Cancelled) => {
                self.state.abandon_transfer(None);
                Ok(())
            }
            Err(e) => {
                self.state.abandon_transfer(None);
                Err(e)
            }
        }
    }

    async fn receive_file(&self, stream: &mut TcpStream, filename: &str) -> Result<(), ClientError> {
        let Some(name) = sanitize_input(filename) else {
            self.state.abandon_transfer(None);
            return Err(ClientError::BadFilename(filename.to_string()));
        };
        let path = self.config.download_dir.join(name);

        let mut sink = if path.exists() {
            report_warning(&ClientError::DuplicateFilename(filename.to_string()).to_operator_message());
            self.state.set_duplicate_filename();
            FileSink::discard(&path, Arc::clone(&self.state))
        } else {
            if !self.state.bad_filename() {
                println!("Receiving {} from server", filename);
            }
            match FileSink::create(&path, Arc::clone(&self.state)).await {
                Ok(sink) => sink,
                Err(e) => {
                    error!("Failed to create {}: {}", path.display(), e);
                    self.state.abandon_transfer(None);
                    return Err(e.into());
                }
            }
        };

        let outcome = receive_framed(
            stream,
            &mut sink,
            &self.state.shutdown,
            self.config.recv_buffer_size,
            self.config.idle_timeout(),
        )
        .await;

        let duplicate = self.state.snapshot().duplicate_filename;
        let written = sink.written();
        let created = sink.created_path().map(|p| p.to_path_buf());
        drop(sink);

        match outcome {
            Ok(ReceiveOutcome::Completed(len)) => {
                let removed = self
                    .state
                    .complete_transfer(created.as_deref().map(|p| (p, written)));
                if removed {
                    debug!("Removed {} after bad filename", path.display());
                    report_error(&ClientError::BadFilename(filename.to_string()).to_operator_message());
                } else if duplicate {
                    debug!("Discarded {} bytes received for duplicate {}", len, filename);
                } else if created.is_some() {
                    info!("Stored {} ({} of {} bytes written)", path.display(), written, len);
                }
                Ok(())
            }
            Ok(ReceiveOutcome::Cancelled) => {
                self.state.abandon_transfer(created.as_deref());
                Ok(())
            }
            Err(e) => {
                self.state.abandon_transfer(created.as_deref());
                Err(e)
            }
        }
    }
}

impl Drop for DataWorker {
    fn drop(&mut self) {
        if !self.state.shutdown.is_shutdown() {
            debug!("Data worker stopped, shutting the session down");
        }
        self.state.shutdown.set_kill_received();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_network::control::ControlChannel;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bind_data_listener_any_port() {
        let listener = bind_data_listener(0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_unspecified());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_worker_drops_unrequested_connection() {
        let listener = bind_data_listener(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = SessionState::new(CommandMode::Shell);
        let worker = DataWorker::new(listener, Arc::clone(&state), Arc::new(ClientConfig::default()));
        let handle = tokio::spawn(worker.run());

        let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut buf = Vec::new();
        data.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());

        state.shutdown.set_kill_received();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_worker_list_cycle() {
        let listener = bind_data_listener(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = SessionState::new(CommandMode::Shell);
        let worker = DataWorker::new(listener, Arc::clone(&state), Arc::new(ClientConfig::default()));
        let handle = tokio::spawn(worker.run());

        state.begin_transfer(TransferKind::List).unwrap();
        let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut greeting = vec![0u8; DATA_GREETING.len()];
        data.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, DATA_GREETING);

        data.write_all(b"a.txt\nb.txt\n@@END_DATA").await.unwrap();
        let mut rest = Vec::new();
        data.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"@@END_DATA");
        assert!(!state.is_pending());

        // Shell mode keeps serving after a cycle.
        assert!(!state.shutdown.is_shutdown());
        state.shutdown.set_kill_received();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_worker_single_shot_stops_after_one_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            download_dir: dir.path().to_path_buf(),
            ..ClientConfig::default()
        };
        let listener = bind_data_listener(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = SessionState::new(CommandMode::Get);
        let worker = DataWorker::new(listener, Arc::clone(&state), Arc::new(config));
        let handle = tokio::spawn(worker.run());

        state
            .begin_transfer(TransferKind::Get("report.txt".into()))
            .unwrap();
        let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut greeting = vec![0u8; DATA_GREETING.len()];
        data.read_exact(&mut greeting).await.unwrap();
        data.write_all(b"line one\nline two\n@@END_DATA").await.unwrap();
        let mut rest = Vec::new();
        data.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"@@END_DATA");

        handle.await.unwrap().unwrap();
        assert!(state.shutdown.kill_received());
        assert_eq!(
            std::fs::read(dir.path().join("report.txt")).unwrap(),
            b"line one\nline two\n"
        );
    }

    #[tokio::test]
    async fn test_worker_drops_partial_file_when_peer_vanishes() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            download_dir: dir.path().to_path_buf(),
            ..ClientConfig::default()
        };
        let listener = bind_data_listener(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = SessionState::new(CommandMode::Shell);
        let worker = DataWorker::new(listener, Arc::clone(&state), Arc::new(config));
        let handle = tokio::spawn(worker.run());

        state
            .begin_transfer(TransferKind::Get("cut.txt".into()))
            .unwrap();
        let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut greeting = vec![0u8; DATA_GREETING.len()];
        data.read_exact(&mut greeting).await.unwrap();
        data.write_all(b"half of it").await.unwrap();
        data.shutdown().await.unwrap();
        let mut rest = Vec::new();
        data.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        // The cycle is abandoned but the worker keeps serving.
        assert!(!state.is_pending());
        assert!(!dir.path().join("cut.txt").exists());
        state.shutdown.set_kill_received();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_worker_exit_ends_shell_loop() {
        let listener = bind_data_listener(0).await.unwrap();
        let state = SessionState::new(CommandMode::Shell);
        let worker = DataWorker::new(listener, Arc::clone(&state), Arc::new(ClientConfig::default()));
        let handle = tokio::spawn(worker.run());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(state.shutdown.kill_received());

        // Operator input stays open, yet the shell returns instead of prompting forever.
        let control_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (client, server) = tokio::join!(
            TcpStream::connect(control_listener.local_addr().unwrap()),
            control_listener.accept()
        );
        let _server = server.unwrap();
        let mut channel = ControlChannel::new(client.unwrap(), Arc::clone(&state));
        let (_input_tx, input_rx) = tokio::io::duplex(64);
        tokio::time::timeout(
            Duration::from_secs(2),
            channel.run_shell(tokio::io::BufReader::new(input_rx)),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!state.shutdown.server_disconnect());
    }

    #[tokio::test]
    async fn test_dropping_worker_shuts_session_down() {
        let listener = bind_data_listener(0).await.unwrap();
        let state = SessionState::new(CommandMode::Shell);
        let worker = DataWorker::new(listener, Arc::clone(&state), Arc::new(ClientConfig::default()));
        assert!(!state.shutdown.is_shutdown());
        drop(worker);
        assert!(state.shutdown.kill_received());
    }
}
