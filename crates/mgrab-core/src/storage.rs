//! Disk I/O and artifact lifecycle for direct downloads.
//!
//! Preallocates a `.part` temp file (posix_fallocate on Unix when available,
//! else set_len), supports concurrent offset writes (pwrite), and finishes
//! with either an atomic rename to the final path or an explicit discard so
//! a failed fetch never leaves a valid-looking artifact behind.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Builder for a new temp download file. Call `preallocate` then `build` to
/// get an `ArtifactWriter` that supports concurrent `write_at` from multiple
/// worker threads.
pub struct ArtifactWriterBuilder {
    file: File,
    temp_path: PathBuf,
}

impl ArtifactWriterBuilder {
    /// Create a new temp file at `temp_path` (e.g. `movie.mp4.part`).
    /// Overwrites if the path already exists.
    pub fn create(temp_path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(ArtifactWriterBuilder {
            file,
            temp_path: temp_path.to_path_buf(),
        })
    }

    /// Preallocate `size` bytes. On Unix tries `posix_fallocate` for real
    /// block allocation; falls back to `set_len` on failure or non-Unix.
    pub fn preallocate(&mut self, size: u64) -> io::Result<()> {
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file.set_len(size)
    }

    /// Finish building and return a writer that can be shared for concurrent writes.
    pub fn build(self) -> ArtifactWriter {
        ArtifactWriter {
            file: Arc::new(self.file),
            temp_path: self.temp_path,
        }
    }
}

/// Writer for a temp download file. Safe to clone and use from multiple
/// threads; each `write_at` is independent (pwrite-style).
#[derive(Clone)]
pub struct ArtifactWriter {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl ArtifactWriter {
    /// Write `data` at `offset`. Does not change the file's logical cursor;
    /// safe for concurrent use.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        let n = self.file.write_at(data, offset)?;
        if n != data.len() {
            return Err(io::Error::other(format!(
                "short write: {} of {}",
                n,
                data.len()
            )));
        }
        Ok(())
    }

    /// Non-Unix fallback: seek + write on a cloned handle.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = (*self.file).try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)?;
        Ok(())
    }

    /// Sync file data to disk. Call before `finalize` for durability.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Atomically rename the temp file to the final path. Consumes the writer
    /// and closes the file. Fails if `final_path` is on a different filesystem.
    pub fn finalize(self, final_path: &Path) -> io::Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        std::fs::rename(&temp_path, final_path)
    }

    /// Delete the temp file. Consumes the writer; used on fetch failure so no
    /// partial artifact survives.
    pub fn discard(self) -> io::Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        match std::fs::remove_file(&temp_path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Path for the temp file: appends `.part` to the final path
/// (e.g. `movie.mp4` -> `movie.mp4.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}
