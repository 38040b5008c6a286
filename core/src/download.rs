use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

pub const CONTENT_TYPE_ZIP: &str = "application/zip";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A file handed back to the transport layer, which decides how to deliver it.
pub struct Download {
    pub content_type: &'static str,
    pub filename: String,
    body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("content_type", &self.content_type)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

impl Download {
    pub fn from_bytes(
        content_type: &'static str,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            content_type,
            filename: filename.into(),
            body: Box::new(Cursor::new(bytes)),
        }
    }

    /// Streams `path`, deleting it once the download is dropped.
    pub fn from_temp_file(
        content_type: &'static str,
        filename: impl Into<String>,
        path: PathBuf,
    ) -> io::Result<Self> {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) => {
                let _ = fs::remove_file(&path);
                return Err(err);
            }
        };
        Ok(Self {
            content_type,
            filename: filename.into(),
            body: Box::new(TempFileBody {
                path,
                file: Some(file),
            }),
        })
    }

    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.body.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn write_to<W: Write>(mut self, writer: &mut W) -> io::Result<u64> {
        io::copy(&mut self.body, writer)
    }

    /// Writes the body to `dir/<filename>` and returns that path.
    pub fn save_into(self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        let mut file = File::create(&path)?;
        self.write_to(&mut file)?;
        file.sync_all()?;
        Ok(path)
    }
}

impl Read for Download {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

struct TempFileBody {
    path: PathBuf,
    file: Option<File>,
}

impl Read for TempFileBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for TempFileBody {
    fn drop(&mut self) {
        // Windows refuses to delete a file that is still open.
        drop(self.file.take());
        if let Err(err) = fs::remove_file(&self.path) {
            log::warn!("failed to remove temporary file {}: {}", self.path.display(), err);
        }
    }
}
