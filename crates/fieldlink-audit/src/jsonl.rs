//! Newline-delimited JSON files with whole-record appends.
//!
//! A record is serialized into a single buffer ending in `\n` and handed to
//! one `write_all` on a file opened in append mode, then flushed to disk with
//! `sync_data` before the call returns. Readers snapshot the file length when
//! they open it and never look past that offset; a trailing segment without a
//! newline is an append still in flight and is skipped.
//!
//! An append that finds the file ending mid-line, left by a writer that died,
//! starts its record on a fresh line. Readers skip such fragments with a
//! warning, so one lost record never hides the ones around it.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{AuditError, Result};

#[derive(Debug, Clone)]
pub struct JsonlFile {
    path: PathBuf,
}

impl JsonlFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Append one record, durable on return.
    pub fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(AuditError::Serialization)?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AuditError::io("create directory", parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuditError::io("open", &self.path, e))?;
        if ends_mid_line(&mut file).map_err(|e| AuditError::io("read", &self.path, e))? {
            warn!(path = %self.path.display(), "previous record is incomplete, starting a new line");
            line.insert(0, b'\n');
        }
        file.write_all(&line)
            .map_err(|e| AuditError::io("append to", &self.path, e))?;
        file.sync_data()
            .map_err(|e| AuditError::io("sync", &self.path, e))?;
        Ok(())
    }

    /// Every readable record in file order. A missing file reads as empty.
    pub fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AuditError::io("open", &self.path, e)),
        };
        let observed = file
            .metadata()
            .map_err(|e| AuditError::io("stat", &self.path, e))?
            .len();
        let mut reader = BufReader::new(file.take(observed));

        let mut records = Vec::new();
        let mut buf = String::new();
        let mut line_no = 0usize;
        loop {
            buf.clear();
            let read = reader
                .read_line(&mut buf)
                .map_err(|e| AuditError::io("read", &self.path, e))?;
            if read == 0 {
                break;
            }
            line_no += 1;
            if !buf.ends_with('\n') {
                debug!(path = %self.path.display(), line = line_no, "skipping incomplete trailing record");
                break;
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(path = %self.path.display(), line = line_no, %error, "skipping unreadable record");
                }
            }
        }
        Ok(records)
    }
}

fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
