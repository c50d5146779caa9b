// crates/vidtex-media/src/source.rs
//
// Source reader: a path in a host-owned namespace plus the sequential byte
// stream the demuxer consumes.
//
// The stream is single-use. A play session takes it; stop() closes whatever
// is left and opens a fresh one from the same path, bumping the epoch so
// anything keyed on the old stream can tell it is stale.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vidtex_core::PlaybackError;

/// Read-only view of the host's file namespace.
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;

    /// Open `path` for strictly sequential reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// A real on-disk path for `path`, when there is one. Backends that can
    /// only open files by name use it to skip spooling the stream.
    fn native_path(&self, _path: &Path) -> Option<PathBuf> {
        None
    }
}

/// Files under a root directory, like a game's internal asset folder.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let file = std::fs::File::open(self.resolve(path))?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn native_path(&self, path: &Path) -> Option<PathBuf> {
        Some(self.resolve(path))
    }
}

/// In-memory files. Cloning shares the underlying bytes.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: HashMap<PathBuf, Arc<[u8]>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), Arc::from(bytes.into()));
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let bytes = self.files.get(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not in memory fs", path.display()))
        })?;
        Ok(Box::new(Cursor::new(Arc::clone(bytes))))
    }
}

// ── SourceStream ──────────────────────────────────────────────────────────────

/// One opened byte stream over the source, handed to the demuxer.
pub struct SourceStream {
    path:   PathBuf,
    native: Option<PathBuf>,
    epoch:  u64,
    reader: Box<dyn Read>,
}

impl SourceStream {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn native_path(&self) -> Option<&Path> {
        self.native.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for SourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct Source {
    path:   PathBuf,
    fs:     Box<dyn FileSystem>,
    stream: Option<SourceStream>,
    epoch:  u64,
}

impl Source {
    /// Verify `path` exists in `fs` and open its first stream.
    pub fn open(fs: Box<dyn FileSystem>, path: impl Into<PathBuf>) -> Result<Self, PlaybackError> {
        let path = path.into();
        if !fs.exists(&path) {
            return Err(PlaybackError::NotFound { path });
        }
        let mut source = Self { path, fs, stream: None, epoch: 0 };
        source.stream = Some(source.open_stream()?);
        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Hand the current stream to a demuxer, opening one first if an earlier
    /// session already consumed it.
    pub fn take_stream(&mut self) -> Result<SourceStream, PlaybackError> {
        match self.stream.take() {
            Some(stream) => Ok(stream),
            None => {
                self.epoch += 1;
                self.open_stream()
            }
        }
    }

    /// Close whatever is open and start again from byte 0.
    pub fn reopen(&mut self) -> Result<(), PlaybackError> {
        self.stream = None;
        self.epoch += 1;
        self.stream = Some(self.open_stream()?);
        log::debug!("reopened {} (epoch {})", self.path.display(), self.epoch);
        Ok(())
    }

    /// Read another file from the same namespace (e.g. the placeholder asset).
    pub fn read_sibling(&self, path: &Path) -> Result<Vec<u8>, PlaybackError> {
        if !self.fs.exists(path) {
            return Err(PlaybackError::NotFound { path: path.to_path_buf() });
        }
        let mut buf = Vec::new();
        self.fs.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn open_stream(&self) -> Result<SourceStream, PlaybackError> {
        let reader = self.fs.open(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PlaybackError::NotFound { path: self.path.clone() },
            _ => PlaybackError::Io(e),
        })?;
        Ok(SourceStream {
            path:   self.path.clone(),
            native: self.fs.native_path(&self.path),
            epoch:  self.epoch,
            reader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memfs() -> MemoryFs {
        MemoryFs::new().with_file("clip.bin", b"abcdef".to_vec())
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = Source::open(Box::new(memfs()), "missing.ogg").err().unwrap();
        assert!(matches!(err, PlaybackError::NotFound { path } if path == Path::new("missing.ogg")));
    }

    #[test]
    fn reopen_rewinds_and_bumps_epoch() {
        let mut src = Source::open(Box::new(memfs()), "clip.bin").unwrap();
        let mut s = src.take_stream().unwrap();
        let mut two = [0u8; 2];
        s.read_exact(&mut two).unwrap();
        assert_eq!(&two, b"ab");
        drop(s);

        src.reopen().unwrap();
        assert_eq!(src.epoch(), 1);
        let s = src.take_stream().unwrap();
        assert_eq!(s.epoch(), 1);
        assert_eq!(s.read_all().unwrap(), b"abcdef");
    }

    #[test]
    fn take_after_take_opens_fresh_stream() {
        let mut src = Source::open(Box::new(memfs()), "clip.bin").unwrap();
        let _first = src.take_stream().unwrap();
        assert!(!src.is_open());
        let second = src.take_stream().unwrap();
        assert_eq!(second.epoch(), 1);
        assert_eq!(second.read_all().unwrap(), b"abcdef");
    }

    #[test]
    fn memory_fs_has_no_native_path() {
        let mut src = Source::open(Box::new(memfs()), "clip.bin").unwrap();
        assert!(src.take_stream().unwrap().native_path().is_none());
    }

    #[test]
    fn local_fs_resolves_under_root() {
        let fs = LocalFs::new("/assets");
        assert_eq!(fs.native_path(Path::new("data/a.ogg")), Some(PathBuf::from("/assets/data/a.ogg")));
        assert!(!fs.exists(Path::new("definitely/not/here.ogg")));
    }

    #[test]
    fn read_sibling_reads_other_files() {
        let fs = memfs().with_file("black.png", vec![9u8, 9]);
        let src = Source::open(Box::new(fs), "clip.bin").unwrap();
        assert_eq!(src.read_sibling(Path::new("black.png")).unwrap(), vec![9, 9]);
        assert!(src.read_sibling(Path::new("nope.png")).is_err());
    }
}
