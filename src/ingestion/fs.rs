//! Filesystem seam for the ingestion processor

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Size in bytes without opening the file
    async fn file_size(&self, path: &Path) -> io::Result<u64>;

    async fn open_read(&self, path: &Path) -> io::Result<BoxedReader>;

    /// Create or truncate
    async fn create_write(&self, path: &Path) -> io::Result<BoxedWriter>;

    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] over `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn open_read(&self, path: &Path) -> io::Result<BoxedReader> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn create_write(&self, path: &Path) -> io::Result<BoxedWriter> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Box::new(file))
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_local_fs_write_rename_read() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem;
        let partial = dir.path().join("doc.partial");
        let done = dir.path().join("doc.txt");

        let mut writer = fs.create_write(&partial).await.unwrap();
        writer.write_all(b"<p>hello</p>").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        fs.rename(&partial, &done).await.unwrap();
        assert_eq!(fs.file_size(&done).await.unwrap(), 12);

        let mut reader = fs.open_read(&done).await.unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "<p>hello</p>");

        fs.remove_file(&done).await.unwrap();
        assert_eq!(
            fs.file_size(&done).await.unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }
}
