use crate::AssetError;
use futures::channel::mpsc;
use futures::executor::block_on;
use futures::stream::{self, BoxStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Chunks a file reader may hold before the consumer catches up.
const READ_AHEAD: usize = 4;

type ChunkSender = mpsc::Sender<Result<Vec<u8>, AssetError>>;

/// An opened asset: its total length when the transport knows it, and the
/// body as a stream of chunks.
pub struct AssetStream {
    pub total_len: Option<u64>,
    pub chunks: BoxStream<'static, Result<Vec<u8>, AssetError>>,
}

impl std::fmt::Debug for AssetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStream")
            .field("total_len", &self.total_len)
            .finish_non_exhaustive()
    }
}

/// Where asset bytes come from. Implementations are shared across loads.
pub trait AssetSource: Send + Sync {
    fn open(&self, uri: &str) -> Result<AssetStream, AssetError>;
}

/// Reads assets from a directory on disk in fixed-size chunks.
///
/// Reads run on a dedicated thread and reach the consumer through a bounded
/// channel, so polling the chunk stream never blocks on disk I/O.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
    chunk_size: usize,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Resolve a URI against the root. Leading slashes are treated as
    /// root-relative, the way the web viewer addressed its public folder.
    pub fn resolve(&self, uri: &str) -> PathBuf {
        self.root.join(uri.trim_start_matches('/'))
    }
}

impl AssetSource for FsSource {
    fn open(&self, uri: &str) -> Result<AssetStream, AssetError> {
        let path = self.resolve(uri);
        let file = std::fs::File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.display().to_string()),
            _ => AssetError::Io(e),
        })?;
        let total_len = file.metadata().ok().map(|m| m.len());
        let chunk_size = self.chunk_size;
        tracing::debug!(path = %path.display(), ?total_len, "opened asset file");

        let (mut tx, rx) = mpsc::channel(READ_AHEAD);
        std::thread::Builder::new()
            .name("asset-read".into())
            .spawn(move || read_chunks(file, chunk_size, &mut tx))?;

        Ok(AssetStream {
            total_len,
            chunks: rx.boxed(),
        })
    }
}

/// Body of the reader thread. Stops at end of file, after a read error, or
/// once the consumer drops its end of the channel.
fn read_chunks(mut file: File, chunk_size: usize, tx: &mut ChunkSender) {
    loop {
        let mut buf = vec![0u8; chunk_size];
        let item = match file.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => Err(AssetError::Io(e)),
        };
        let failed = item.is_err();
        if block_on(tx.send(item)).is_err() {
            tracing::debug!("asset reader stopped, consumer gone");
            return;
        }
        if failed {
            return;
        }
    }
}

/// In-memory asset source with configurable chunking and injected transport
/// failures. Used by tests and the headless CLI.
#[derive(Debug, Clone)]
pub struct MemorySource {
    assets: HashMap<String, Arc<Vec<u8>>>,
    fail_after_chunks: HashMap<String, usize>,
    chunk_size: usize,
    report_length: bool,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self {
            assets: HashMap::new(),
            fail_after_chunks: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            report_length: true,
        }
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.assets.insert(uri.into(), Arc::new(bytes));
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Make reads of `uri` fail after delivering `chunks` chunks.
    pub fn failing_after(mut self, uri: impl Into<String>, chunks: usize) -> Self {
        self.fail_after_chunks.insert(uri.into(), chunks);
        self
    }

    /// Withhold the total length, as a transport without a length header would.
    pub fn without_length(mut self) -> Self {
        self.report_length = false;
        self
    }
}

impl AssetSource for MemorySource {
    fn open(&self, uri: &str) -> Result<AssetStream, AssetError> {
        let bytes = self
            .assets
            .get(uri)
            .ok_or_else(|| AssetError::NotFound(uri.to_string()))?;

        let mut items: Vec<Result<Vec<u8>, AssetError>> = Vec::new();
        let mut received = 0u64;
        for (i, chunk) in bytes.chunks(self.chunk_size).enumerate() {
            if self.fail_after_chunks.get(uri) == Some(&i) {
                break;
            }
            received += chunk.len() as u64;
            items.push(Ok(chunk.to_vec()));
        }
        if self.fail_after_chunks.contains_key(uri) {
            items.push(Err(AssetError::Transport {
                uri: uri.to_string(),
                received,
            }));
        }

        Ok(AssetStream {
            total_len: self.report_length.then_some(bytes.len() as u64),
            chunks: stream::iter(items).boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn collect(stream: AssetStream) -> Vec<Result<Vec<u8>, AssetError>> {
        block_on(stream.chunks.collect::<Vec<_>>())
    }

    #[test]
    fn memory_source_chunks_body() {
        let source = MemorySource::new()
            .with_asset("a.bin", (0u8..10).collect())
            .with_chunk_size(4);
        let opened = source.open("a.bin").unwrap();
        assert_eq!(opened.total_len, Some(10));
        let sizes: Vec<usize> = collect(opened)
            .into_iter()
            .map(|c| c.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn memory_source_injects_transport_failure() {
        let source = MemorySource::new()
            .with_asset("a.bin", vec![1; 12])
            .with_chunk_size(4)
            .failing_after("a.bin", 1);
        let items = collect(source.open("a.bin").unwrap());
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(AssetError::Transport { received: 4, .. })
        ));
    }

    #[test]
    fn memory_source_missing_asset() {
        let source = MemorySource::new();
        assert!(matches!(source.open("nope"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn memory_source_can_hide_length() {
        let source = MemorySource::new()
            .with_asset("a.bin", vec![0; 3])
            .without_length();
        assert_eq!(source.open("a.bin").unwrap().total_len, None);
    }

    #[test]
    fn fs_source_reads_file_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("texture.ktx2"), vec![7u8; 300]).unwrap();
        let source = FsSource::new(dir.path()).with_chunk_size(128);

        let opened = source.open("/texture.ktx2").unwrap();
        assert_eq!(opened.total_len, Some(300));
        let body: Vec<u8> = collect(opened)
            .into_iter()
            .flat_map(|c| c.unwrap())
            .collect();
        assert_eq!(body.len(), 300);
    }

    #[test]
    fn fs_source_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsSource::new(dir.path());
        assert!(matches!(
            source.open("missing.ktx2"),
            Err(AssetError::NotFound(_))
        ));
    }
}
