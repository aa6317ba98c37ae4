use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;

use crate::domain::{Error, JournalSink, Record};

/// Keeps no copy outside the store's memory.
#[derive(Default, Debug)]
pub struct MemoryJournal;

impl JournalSink for MemoryJournal {
    fn append(&mut self, _batch: &[Record]) -> Result<(), Error> {
        Ok(())
    }
}

/// Appends committed rows as JSON lines and flushes after every batch.
#[derive(Debug)]
pub struct FileJournal<W: Write> {
    inner: W,
}

impl<W: Write> FileJournal<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl FileJournal<File> {
    /// Opens `path` for appending, creating it if needed.
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Storage(format!("opening ledger log {}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), "Opened ledger log");
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> JournalSink for FileJournal<W> {
    fn append(&mut self, batch: &[Record]) -> Result<(), Error> {
        // Encode the whole batch first so a failed encode writes nothing.
        let mut bytes = Vec::new();
        for record in batch {
            serde_json::to_writer(&mut bytes, record)?;
            bytes.push(b'\n');
        }

        self.inner
            .write_all(&bytes)
            .and_then(|_| self.inner.flush())
            .map_err(|e| Error::Storage(format!("ledger log write failed: {}", e)))
    }
}

/// Every record in the log at `path`, in commit order. A missing file is an
/// empty log; any unreadable line refuses the whole log.
pub fn read_log(path: impl AsRef<Path>) -> Result<Vec<Record>, Error> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Storage(format!("opening ledger log {}: {}", path.display(), e))),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::Storage(format!("reading ledger log {}: {}", path.display(), e)))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            Error::Storage(format!("ledger log {} line {}: {}", path.display(), index + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}
