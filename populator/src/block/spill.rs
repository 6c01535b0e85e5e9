//! Spill storage for sorted parts.
//!
//! Each part is one file inside a per-population [`SpillDirectory`]. Files
//! are deleted as soon as the part (or the cursor reading it) is dropped, and
//! the directory goes away with its last file.
//!
//! # Part File Format
//!
//! ```text
//! +----------+------------------------------------------+
//! | 0-3      | magic "IPRT"                             |
//! | 4-11     | entry_count (u64)                        |
//! | 12-N     | entries                                  |
//! | N-N+3    | CRC32 of all entry bytes (4 bytes)       |
//! +----------+------------------------------------------+
//!
//! entry: key_length (u32) | value_length (u32) | key | value
//! ```
//!
//! All integers are little-endian. The checksum is verified when a cursor
//! reaches the end of the part.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::block::part::{BoxCursor, PartCursor, PartSource};
use crate::error::PopulationError;
use crate::key::Layout;

const PART_MAGIC: [u8; 4] = *b"IPRT";
const HEADER_SIZE: usize = 12;
const ENTRY_HEADER_SIZE: usize = 8;

static NEXT_DIRECTORY: AtomicU64 = AtomicU64::new(0);

/// A private directory for the parts of one population.
#[derive(Debug)]
pub struct SpillDirectory {
    root: PathBuf,
    next_file: AtomicU64,
}

impl SpillDirectory {
    /// Creates a fresh directory under `parent`.
    pub fn create(parent: &Path) -> Result<Arc<Self>, PopulationError> {
        let n = NEXT_DIRECTORY.fetch_add(1, Ordering::Relaxed);
        let root = parent.join(format!("population-{}-{n}", std::process::id()));
        fs::create_dir_all(&root)?;
        tracing::debug!(path = %root.display(), "Created spill directory");
        Ok(Arc::new(Self {
            root,
            next_file: AtomicU64::new(0),
        }))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Number of part files currently on disk.
    pub fn file_count(&self) -> Result<usize, PopulationError> {
        Ok(fs::read_dir(&self.root)?.count())
    }

    fn allocate(self: &Arc<Self>, kind: &str) -> Result<(SpillFile, File), PopulationError> {
        let n = self.next_file.fetch_add(1, Ordering::Relaxed);
        let path = self.root.join(format!("{kind}-{n:06}.part"));
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok((
            SpillFile {
                path,
                _directory: Arc::clone(self),
            },
            file,
        ))
    }
}

impl Drop for SpillDirectory {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            tracing::warn!(path = %self.root.display(), "Failed to remove spill directory: {e}");
        }
    }
}

/// Owns one part file and deletes it on drop.
#[derive(Debug)]
struct SpillFile {
    path: PathBuf,
    _directory: Arc<SpillDirectory>,
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn corrupt(path: &Path, reason: impl Into<String>) -> PopulationError {
    PopulationError::CorruptPart {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Writes entries into a new part file.
///
/// A writer dropped without [`PartWriter::finish`] deletes its file, so an
/// aborted merge never leaves a readable part behind.
pub struct PartWriter<L: Layout> {
    layout: Arc<L>,
    file: SpillFile,
    out: BufWriter<File>,
    hasher: crc32fast::Hasher,
    entries: u64,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
}

impl<L: Layout> PartWriter<L> {
    pub fn create(
        directory: &Arc<SpillDirectory>,
        layout: Arc<L>,
        kind: &str,
    ) -> Result<Self, PopulationError> {
        let (file, handle) = directory.allocate(kind)?;
        let mut out = BufWriter::new(handle);
        out.write_all(&PART_MAGIC)?;
        out.write_all(&0_u64.to_le_bytes())?;
        Ok(Self {
            layout,
            file,
            out,
            hasher: crc32fast::Hasher::new(),
            entries: 0,
            key_buf: Vec::new(),
            value_buf: Vec::new(),
        })
    }

    /// Appends one entry.
    ///
    /// # Pre-conditions
    /// - for parts that are merged, `key` does not sort before the previously
    ///   appended key
    pub fn append(&mut self, key: &L::Key, value: &L::Value) -> Result<(), PopulationError> {
        self.key_buf.clear();
        self.value_buf.clear();
        self.layout.write_key(key, &mut self.key_buf)?;
        self.layout.write_value(value, &mut self.value_buf)?;

        let key_len = u32::try_from(self.key_buf.len())
            .map_err(|_| PopulationError::IllegalState("entry too large for a part file"))?;
        let value_len = u32::try_from(self.value_buf.len())
            .map_err(|_| PopulationError::IllegalState("entry too large for a part file"))?;
        let mut header = [0_u8; ENTRY_HEADER_SIZE];
        header[..4].copy_from_slice(&key_len.to_le_bytes());
        header[4..].copy_from_slice(&value_len.to_le_bytes());

        for chunk in [&header[..], &self.key_buf, &self.value_buf] {
            self.hasher.update(chunk);
            self.out.write_all(chunk)?;
        }
        self.entries += 1;
        Ok(())
    }

    #[must_use]
    pub const fn entries(&self) -> u64 {
        self.entries
    }

    /// Seals the file and returns it as a readable part.
    pub fn finish(self) -> Result<SpilledPart<L>, PopulationError> {
        let Self {
            layout,
            file,
            mut out,
            hasher,
            entries,
            ..
        } = self;
        out.write_all(&hasher.finalize().to_le_bytes())?;
        out.seek(SeekFrom::Start(PART_MAGIC.len() as u64))?;
        out.write_all(&entries.to_le_bytes())?;
        out.flush()?;
        drop(out);
        Ok(SpilledPart {
            layout,
            file,
            entries,
        })
    }
}

/// A sealed part file.
pub struct SpilledPart<L: Layout> {
    layout: Arc<L>,
    file: SpillFile,
    entries: u64,
}

impl<L: Layout> SpilledPart<L> {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

impl<L: Layout> PartSource<L::Key, L::Value> for SpilledPart<L> {
    fn entry_count(&self) -> u64 {
        self.entries
    }

    fn open(self: Box<Self>) -> Result<BoxCursor<L::Key, L::Value>, PopulationError> {
        let path = self.file.path.clone();
        let mut reader = BufReader::new(File::open(&path)?);
        let mut header = [0_u8; HEADER_SIZE];
        read_exact(&mut reader, &mut header, &path)?;
        if header[..4] != PART_MAGIC {
            return Err(corrupt(&path, "bad magic"));
        }
        let mut count = [0_u8; 8];
        count.copy_from_slice(&header[4..]);
        let stored = u64::from_le_bytes(count);
        if stored != self.entries {
            return Err(corrupt(
                &path,
                format!("header holds {stored} entries, expected {}", self.entries),
            ));
        }
        Ok(Box::new(SpilledCursor {
            layout: self.layout,
            path,
            file: Some(self.file),
            reader: Some(reader),
            remaining: self.entries,
            hasher: crc32fast::Hasher::new(),
            current: None,
            buf: Vec::new(),
        }))
    }
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8], path: &Path) -> Result<(), PopulationError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => corrupt(path, "truncated"),
        _ => PopulationError::Io(e),
    })
}

struct SpilledCursor<L: Layout> {
    layout: Arc<L>,
    path: PathBuf,
    file: Option<SpillFile>,
    reader: Option<BufReader<File>>,
    remaining: u64,
    hasher: crc32fast::Hasher,
    current: Option<(L::Key, L::Value)>,
    buf: Vec<u8>,
}

impl<L: Layout> SpilledCursor<L> {
    fn verify_trailer(&mut self) -> Result<(), PopulationError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };
        let mut trailer = [0_u8; 4];
        read_exact(reader, &mut trailer, &self.path)?;
        let expected = u32::from_le_bytes(trailer);
        let actual = std::mem::take(&mut self.hasher).finalize();
        if expected != actual {
            return Err(corrupt(
                &self.path,
                format!("checksum mismatch: stored {expected:#010x}, computed {actual:#010x}"),
            ));
        }
        Ok(())
    }
}

impl<L: Layout> PartCursor<L::Key, L::Value> for SpilledCursor<L> {
    fn next(&mut self) -> Result<bool, PopulationError> {
        self.current = None;
        if self.reader.is_none() {
            return Ok(false);
        }
        if self.remaining == 0 {
            let verified = self.verify_trailer();
            self.close();
            return verified.map(|()| false);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };

        let mut header = [0_u8; ENTRY_HEADER_SIZE];
        read_exact(reader, &mut header, &self.path)?;
        self.hasher.update(&header);
        let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let value_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

        self.buf.resize(key_len + value_len, 0);
        read_exact(reader, &mut self.buf, &self.path)?;
        self.hasher.update(&self.buf);

        let (key_bytes, value_bytes) = self.buf.split_at(key_len);
        let key = self
            .layout
            .read_key(key_bytes)
            .map_err(|e| corrupt(&self.path, format!("undecodable key: {e}")))?;
        let value = self
            .layout
            .read_value(value_bytes)
            .map_err(|e| corrupt(&self.path, format!("undecodable value: {e}")))?;
        self.remaining -= 1;
        self.current = Some((key, value));
        Ok(true)
    }

    fn key(&self) -> Option<&L::Key> {
        self.current.as_ref().map(|(k, _)| k)
    }

    fn value(&self) -> Option<&L::Value> {
        self.current.as_ref().map(|(_, v)| v)
    }

    fn take(&mut self) -> Option<(L::Key, L::Value)> {
        self.current.take()
    }

    fn close(&mut self) {
        self.current = None;
        self.reader = None;
        self.file = None;
    }
}

impl<L: Layout> Drop for SpilledCursor<L> {
    fn drop(&mut self) {
        self.close();
    }
}
