use crate::session::SessionState;
use log::debug;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Destination for the payload of one transfer.
pub trait TransferSink: Send {
    fn write_payload(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Called once, after the end-of-data marker was seen.
    fn finish(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Prints a LIST payload exactly as received.
pub struct ConsoleSink<W> {
    out: W,
}

impl<W> ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl ConsoleSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> TransferSink for ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_payload(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }
}

/// Writes a GET payload to disk.
///
/// Writes are suppressed while the server has reported a bad filename, and
/// entirely when the target already existed locally (no file is opened).
pub struct FileSink {
    file: Option<File>,
    path: PathBuf,
    state: Arc<SessionState>,
    written: u64,
}

impl FileSink {
    pub async fn create(path: &Path, state: Arc<SessionState>) -> io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            state,
            written: 0,
        })
    }

    /// Sink for a duplicate filename: the existing file is never touched.
    pub fn discard(path: &Path, state: Arc<SessionState>) -> Self {
        Self {
            file: None,
            path: path.to_path_buf(),
            state,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Path of the file this sink created, if it created one.
    pub fn created_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|_| self.path.as_path())
    }
}

impl TransferSink for FileSink {
    async fn write_payload(&mut self, bytes: &[u8]) -> io::Result<()> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Ok(()),
        };
        if self.state.bad_filename() {
            debug!("Suppressing {} bytes for {}", bytes.len(), self.path.display());
            return Ok(());
        }
        file.write_all(bytes).await?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{CommandMode, TransferKind};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_console_sink_prints_verbatim() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.write_payload(b"a.txt\n").await.unwrap();
        sink.write_payload(b"b.txt\n").await.unwrap();
        sink.finish().await.unwrap();
        assert_eq!(sink.into_inner(), b"a.txt\nb.txt\n\n");
    }

    #[tokio::test]
    async fn test_file_sink_writes_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let state = SessionState::new(CommandMode::Get);

        let mut sink = FileSink::create(&path, state).await.unwrap();
        sink.write_payload(&[0xff, 0x00, b'a']).await.unwrap();
        sink.finish().await.unwrap();

        assert_eq!(sink.written(), 3);
        assert_eq!(sink.created_path(), Some(path.as_path()));
        drop(sink);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xff, 0x00, b'a']);
    }

    #[tokio::test]
    async fn test_file_sink_suppressed_on_bad_filename() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.txt");
        let state = SessionState::new(CommandMode::Get);
        state
            .begin_transfer(TransferKind::Get("missing.txt".into()))
            .unwrap();

        let mut sink = FileSink::create(&path, Arc::clone(&state)).await.unwrap();
        state.mark_bad_filename();
        sink.write_payload(b"should not land").await.unwrap();
        sink.finish().await.unwrap();

        assert_eq!(sink.written(), 0);
        drop(sink);
        assert_eq!(std::fs::read(&path).unwrap(), b"");
    }

    #[tokio::test]
    async fn test_discard_sink_leaves_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        std::fs::write(&path, b"original").unwrap();
        let state = SessionState::new(CommandMode::Get);

        let mut sink = FileSink::discard(&path, state);
        sink.write_payload(b"replacement").await.unwrap();
        sink.finish().await.unwrap();

        assert_eq!(sink.created_path(), None);
        assert_eq!(std::fs::read(&path).unwrap(), b"original");
    }
}
