use crate::core_command::CommandError;
use crate::core_error::ClientError;
use crate::core_network::control::ControlChannel;
use crate::helpers::report_error;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// How the session was started: one LIST, one GET, or an interactive shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    List,
    Get,
    Shell,
}

/// The transfer the data worker should execute on the next inbound connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    List,
    Get(String),
}

#[derive(Debug, Default, Clone)]
pub struct PendingTransfer {
    pub active: Option<TransferKind>,
    pub bad_filename: bool,
    pub duplicate_filename: bool,
    /// Empty file left by a completed GET, removed if the server reports a bad filename late.
    pub orphan: Option<PathBuf>,
}

impl PendingTransfer {
    pub fn awaiting_file(&self) -> bool {
        matches!(self.active, Some(TransferKind::Get(_)))
    }

    pub fn awaiting_list(&self) -> bool {
        matches!(self.active, Some(TransferKind::List))
    }
}

/// Monotonic shutdown flags. Once set they are never cleared.
#[derive(Debug)]
pub struct ShutdownFlags {
    kill_received: AtomicBool,
    server_disconnect: AtomicBool,
    tx: watch::Sender<bool>,
}

impl ShutdownFlags {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            kill_received: AtomicBool::new(false),
            server_disconnect: AtomicBool::new(false),
            tx,
        }
    }

    pub fn set_kill_received(&self) {
        self.kill_received.store(true, Ordering::Release);
        self.tx.send_replace(true);
    }

    pub fn set_server_disconnect(&self) {
        self.server_disconnect.store(true, Ordering::Release);
        self.set_kill_received();
    }

    pub fn kill_received(&self) -> bool {
        self.kill_received.load(Ordering::Acquire)
    }

    pub fn server_disconnect(&self) -> bool {
        self.server_disconnect.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.kill_received() || self.server_disconnect()
    }

    /// Resolves once either flag is set.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|down| *down).await;
    }
}

impl Default for ShutdownFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by the control channel and the data worker for one session.
#[derive(Debug)]
pub struct SessionState {
    pub mode: CommandMode,
    pub shutdown: ShutdownFlags,
    pending: Mutex<PendingTransfer>,
    transfer_done: Notify,
}

impl SessionState {
    pub fn new(mode: CommandMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            shutdown: ShutdownFlags::new(),
            pending: Mutex::new(PendingTransfer::default()),
            transfer_done: Notify::new(),
        })
    }

    fn pending(&self) -> MutexGuard<'_, PendingTransfer> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new command cycle. Refused while another transfer is pending.
    pub fn begin_transfer(&self, kind: TransferKind) -> Result<(), CommandError> {
        let mut pending = self.pending();
        if pending.active.is_some() {
            return Err(CommandError::TransferInProgress);
        }
        debug!("Awaiting transfer {:?}", kind);
        *pending = PendingTransfer {
            active: Some(kind),
            ..PendingTransfer::default()
        };
        Ok(())
    }

    pub fn snapshot(&self) -> PendingTransfer {
        self.pending().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.pending().active.is_some()
    }

    pub fn bad_filename(&self) -> bool {
        self.pending().bad_filename
    }

    pub fn set_duplicate_filename(&self) {
        self.pending().duplicate_filename = true;
    }

    /// Records the server's bad-filename status.
    ///
    /// When the GET already finished before the status arrived, the empty file
    /// it left behind is removed here. Returns the removed path, if any.
    pub fn mark_bad_filename(&self) -> Option<PathBuf> {
        let orphan = {
            let mut pending = self.pending();
            pending.bad_filename = true;
            if pending.active.is_some() {
                return None;
            }
            pending.orphan.take()
        }?;

        match std::fs::remove_file(&orphan) {
            Ok(()) => {
                info!("Removed {} after late bad filename status", orphan.display());
                Some(orphan)
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", orphan.display(), e);
                None
            }
        }
    }

    /// Ends the active cycle after the sentinel handshake.
    ///
    /// `created` is the file a GET opened itself together with the number of
    /// payload bytes written to it. Returns true when that file was removed
    /// because the server reported a bad filename.
    pub fn complete_transfer(&self, created: Option<(&Path, u64)>) -> bool {
        let mut removed = false;
        {
            let mut pending = self.pending();
            if let Some((path, written)) = created {
                if pending.bad_filename {
                    removed = remove_quietly(path);
                } else if written == 0 {
                    pending.orphan = Some(path.to_path_buf());
                }
            }
            pending.active = None;
        }
        self.transfer_done.notify_one();
        removed
    }

    /// Ends the active cycle after a failed transfer, dropping any partial file.
    pub fn abandon_transfer(&self, created: Option<&Path>) {
        {
            let mut pending = self.pending();
            if let Some(path) = created {
                remove_quietly(path);
            }
            pending.active = None;
        }
        self.transfer_done.notify_one();
    }

    pub async fn transfer_done(&self) {
        self.transfer_done.notified().await;
    }
}

fn remove_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// How a session ended, handed back to `main` which owns the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Completed,
    ServerDisconnect,
    Failed,
}

impl SessionEnd {
    /// Every termination path exits with 1. Callers cannot tell a clean end
    /// from a failure by the status alone.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Tears the session down: closes the control connection, stops the data
/// worker (aborting it after `grace`) and folds both results into a `SessionEnd`.
pub async fn teardown(
    control: ControlChannel,
    worker: JoinHandle<Result<(), ClientError>>,
    state: &SessionState,
    grace: Duration,
    control_result: Result<(), ClientError>,
) -> SessionEnd {
    debug!("Client tear down");
    state.shutdown.set_kill_received();
    control.close().await;

    let abort = worker.abort_handle();
    let worker_result = match tokio::time::timeout(grace, worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            warn!("Data worker ended abnormally: {}", join_error);
            Ok(())
        }
        Err(_) => {
            warn!("Data worker did not stop within {:?}, aborting it", grace);
            abort.abort();
            Ok(())
        }
    };

    let mut end = if state.shutdown.server_disconnect() {
        SessionEnd::ServerDisconnect
    } else {
        SessionEnd::Completed
    };

    for result in [control_result, worker_result] {
        if let Err(e) = result {
            report_error(&e.to_operator_message());
            if end == SessionEnd::Completed {
                end = SessionEnd::Failed;
            }
        }
    }

    info!("Session ended: {:?}", end);
    end
}
