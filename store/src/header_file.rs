//! The flat, 80-byte-per-record header file (C3).
//!
//! The file at byte offset `height * 80` holds the canonical header at that
//! height. Its length is always a multiple of 80: the local tip height is
//! `file_size / 80 - 1`, and an empty file means no headers are known yet.
//! Callers are expected to serialize all writes themselves (the sync worker
//! is the single writer); this type does no internal locking.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use myriad_core::{Error, Header, Result, HEADER_SIZE};

/// Fetches a pre-baked header file to seed a brand-new store. The real HTTP
/// download is a collaborator outside this subsystem's scope (per the
/// specification's out-of-scope list); the default implementation always
/// declines, which is the documented recoverable fallback ("start empty").
pub trait HeaderFileSeed {
    /// Attempts to populate `path` with a pre-baked header file. Returns
    /// `true` on success. The default never succeeds.
    fn try_seed(&self, _path: &Path) -> bool {
        false
    }
}

/// A seed that never provides data — used when no bootstrap source is wired
/// up (e.g. in tests).
pub struct NoSeed;
impl HeaderFileSeed for NoSeed {}

/// The linear, random-access header file.
pub struct HeaderFile {
    path: PathBuf,
    file: File,
}

impl HeaderFile {
    /// Opens (creating if absent) the header file at `path`, first giving
    /// `seed` a chance to populate it from a pre-baked source.
    pub fn open(path: impl AsRef<Path>, seed: &impl HeaderFileSeed) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            if !seed.try_seed(&path) {
                log::warn!("header file seed unavailable, starting with an empty file");
                File::create(&path)?;
            }
        }
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Opens an existing header file read-only, for use by readers elsewhere
    /// in the wallet that don't need write access.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file_size / 80 - 1`, or `None` when the file is empty.
    pub fn tip_height(&self) -> Result<Option<u64>> {
        let len = self.file.metadata()?.len();
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(len / HEADER_SIZE as u64 - 1))
    }

    /// Reads the header at `height`, or `None` if the file is shorter than
    /// `height * 80 + 80` bytes.
    pub fn read(&mut self, height: u64) -> Result<Option<Header>> {
        let offset = height
            .checked_mul(HEADER_SIZE as u64)
            .ok_or(Error::ShortRead)?;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; HEADER_SIZE];
        let mut read_so_far = 0;
        loop {
            match self.file.read(&mut buf[read_so_far..])? {
                0 => break,
                n => read_so_far += n,
            }
        }
        if read_so_far < HEADER_SIZE {
            return Ok(None);
        }
        let mut header = Header::from_bytes(&buf);
        header.block_height = Some(height);
        Ok(Some(header))
    }

    /// Writes a single header at its `block_height`'s slot.
    pub fn write_header(&mut self, height: u64, header: &Header) -> Result<()> {
        let offset = height
            .checked_mul(HEADER_SIZE as u64)
            .ok_or(Error::ShortRead)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&header.to_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Writes a contiguous chunk at `index * chunk_size * 80`.
    pub fn write_chunk(&mut self, index: u64, chunk_size: u64, data: &[u8]) -> Result<()> {
        let offset = index
            .checked_mul(chunk_size)
            .and_then(|h| h.checked_mul(HEADER_SIZE as u64))
            .ok_or(Error::ShortRead)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }
}
