use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Append-only log of store mutations, one JSON document per line.
///
/// Entries are flushed on every append; the store calls [`WriteAheadLog::sync`]
/// after each one before applying it.
/// The log is truncated after each successful dump.
pub struct WriteAheadLog {
    file: Arc<Mutex<BufWriter<File>>>,
    raw_file: Arc<Mutex<File>>, // fsync and truncate
    path: PathBuf,
}

impl WriteAheadLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening WAL {}", path.display()))?;

        let raw_file = file.try_clone()?;

        Ok(Self {
            file: Arc::new(Mutex::new(BufWriter::new(file))),
            raw_file: Arc::new(Mutex::new(raw_file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. `data` must not contain a newline.
    #[inline]
    pub fn append(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.file.lock();
        writer.write_all(data)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Flush and fdatasync
    #[inline]
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.file.lock();
        writer.flush()?;

        let raw = self.raw_file.lock();
        raw.sync_data()?;
        Ok(())
    }

    /// Drop every entry; called once the entries are covered by a dump
    pub fn truncate(&self) -> Result<()> {
        let mut writer = self.file.lock();
        writer.flush()?;

        let raw = self.raw_file.lock();
        raw.set_len(0)?;
        raw.sync_all()?;
        Ok(())
    }

    /// Every non-empty line, oldest first
    pub fn entries(&self) -> Result<Vec<String>> {
        self.file.lock().flush()?;
        let reader = BufReader::new(File::open(&self.path)?);
        let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;
        Ok(lines.into_iter().filter(|l| !l.trim().is_empty()).collect())
    }

    /// Decode entries with `parse`.
    ///
    /// A torn final line (crash mid-append) is skipped with a warning; any
    /// other unreadable line is an error.
    pub fn replay<T>(&self, mut parse: impl FnMut(&str) -> Result<T>) -> Result<Vec<T>> {
        let lines = self.entries()?;
        let last = lines.len().saturating_sub(1);
        let mut out = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match parse(line) {
                Ok(entry) => out.push(entry),
                Err(e) if i == last => {
                    warn!(path = %self.path.display(), error = %e, "skipping torn WAL tail");
                }
                Err(e) => return Err(e.context(format!("WAL entry {} unreadable", i + 1))),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let wal = WriteAheadLog::new(dir.path().join("wal.log")).unwrap();
        wal.append(br#"{"n":1}"#).unwrap();
        wal.append(br#"{"n":2}"#).unwrap();
        wal.sync().unwrap();

        let entries = wal.entries().unwrap();
        assert_eq!(entries, vec![r#"{"n":1}"#, r#"{"n":2}"#]);
    }

    #[test]
    fn test_truncate() {
        let dir = TempDir::new().unwrap();
        let wal = WriteAheadLog::new(dir.path().join("wal.log")).unwrap();
        wal.append(b"one").unwrap();
        wal.truncate().unwrap();
        assert!(wal.entries().unwrap().is_empty());

        wal.append(b"two").unwrap();
        assert_eq!(wal.entries().unwrap(), vec!["two"]);
    }

    #[test]
    fn test_replay_skips_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal.log");
        std::fs::write(&path, "{\"n\":1}\n{\"n\":2}\n{\"n\":").unwrap();
        let wal = WriteAheadLog::new(&path).unwrap();

        let parsed: Vec<serde_json::Value> = wal.replay(|l| Ok(serde_json::from_str(l)?)).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_replay_rejects_corrupt_middle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal.log");
        std::fs::write(&path, "{\"n\":1}\ngarbage\n{\"n\":3}\n").unwrap();
        let wal = WriteAheadLog::new(&path).unwrap();

        let result: Result<Vec<serde_json::Value>> = wal.replay(|l| Ok(serde_json::from_str(l)?));
        assert!(result.is_err());
    }
}
