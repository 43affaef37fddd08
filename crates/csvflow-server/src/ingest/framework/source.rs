//! File sources
//!
//! An uploaded file exposes a name, a declared size and a byte stream. The
//! stream is opened lazily inside the launched pipeline task.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncRead;

pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait FileSource: Send + Sync {
    fn filename(&self) -> &str;

    /// Declared size in bytes
    fn size(&self) -> u64;

    async fn open(&self) -> io::Result<FileReader>;

    /// Whether the filename carries a `.csv` extension (ASCII case-insensitive)
    fn has_csv_extension(&self) -> bool {
        Path::new(self.filename())
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }
}

/// File buffered in memory, e.g. a multipart upload field
#[derive(Debug, Clone)]
pub struct InMemoryFile {
    filename: String,
    data: Bytes,
}

impl InMemoryFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl FileSource for InMemoryFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn open(&self) -> io::Result<FileReader> {
        Ok(Box::new(io::Cursor::new(self.data.clone())))
    }
}

/// File on the local filesystem
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    filename: String,
    size: u64,
    /// Set for spooled uploads; deletes the file on drop
    temp: Option<TempPath>,
}

impl LocalFile {
    /// Stat `path` and capture its current size
    pub async fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path,
            filename,
            size: metadata.len(),
            temp: None,
        })
    }

    /// Wrap a spooled temporary file under the name the client gave it
    ///
    /// The file is removed when the returned value is dropped.
    pub fn temporary(filename: impl Into<String>, temp: TempPath, size: u64) -> Self {
        Self {
            path: temp.to_path_buf(),
            filename: filename.into(),
            size,
            temp: Some(temp),
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileSource for LocalFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn open(&self) -> io::Result<FileReader> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}
