//! JSON-file ledger store.
//!
//! Layout inside the data directory:
//! - `balances.json`: the full balance set, replaced atomically via a
//!   temporary file and rename
//! - `operations.jsonl`: append-only log, one JSON record per line
//! - `locks.json`: last mirrored lock snapshot
//!
//! An absent `balances.json` means first run.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tally_types::{BalanceSet, LockSnapshot, OperationRecord, Result, TallyError};

use crate::{chain, store::LedgerStore};

const BALANCES_FILE: &str = "balances.json";
const LOG_FILE: &str = "operations.jsonl";
const LOCKS_FILE: &str = "locks.json";

/// Ledger store backed by JSON files in one directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    /// Returns [`TallyError::StoreUnavailable`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| unavailable(&dir, &e))?;
        tracing::debug!(dir = %dir.display(), "Opened JSON file store");
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every record in the log, oldest first.
    ///
    /// # Errors
    /// Returns an error if the log cannot be read or a line does not parse.
    pub fn read_log(&self) -> Result<Vec<OperationRecord>> {
        let path = self.dir.join(LOG_FILE);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(&path, &e)),
        };
        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| unavailable(&path, &e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: OperationRecord = serde_json::from_str(&line).map_err(|e| {
                TallyError::Serialization(format!("{} line {}: {e}", path.display(), index + 1))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Verify the digest chain of the whole persisted log.
    ///
    /// # Errors
    /// Returns [`TallyError::LogChainBroken`] if the log was altered.
    pub fn verify_log(&self) -> Result<()> {
        chain::verify_chain(&self.read_log()?)
    }

    /// Last mirrored lock snapshot, if any.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_locks(&self) -> Result<Option<LockSnapshot>> {
        read_json(&self.dir.join(LOCKS_FILE))
    }

    fn write_atomic<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let bytes = serde_json::to_vec_pretty(value)?;
        let mut file = File::create(&tmp).map_err(|e| unavailable(&tmp, &e))?;
        file.write_all(&bytes).map_err(|e| unavailable(&tmp, &e))?;
        file.sync_all().map_err(|e| unavailable(&tmp, &e))?;
        fs::rename(&tmp, &path).map_err(|e| unavailable(&path, &e))?;
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn load_all(&self) -> Result<Option<BalanceSet>> {
        read_json(&self.dir.join(BALANCES_FILE))
    }

    fn write_all(&mut self, balances: &BalanceSet) -> Result<()> {
        self.write_atomic(BALANCES_FILE, balances)
    }

    fn append_log(&mut self, record: &OperationRecord) -> Result<()> {
        let path = self.dir.join(LOG_FILE);
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| unavailable(&path, &e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| unavailable(&path, &e))?;
        file.sync_data().map_err(|e| unavailable(&path, &e))?;
        Ok(())
    }

    fn recent_log(&self, limit: usize) -> Result<Vec<OperationRecord>> {
        let mut records = self.read_log()?;
        let start = records.len().saturating_sub(limit);
        Ok(records.split_off(start))
    }

    fn mirror_locks(&mut self, locks: &LockSnapshot) -> Result<()> {
        self.write_atomic(LOCKS_FILE, locks)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(unavailable(path, &e)),
    }
}

fn unavailable(path: &Path, err: &std::io::Error) -> TallyError {
    TallyError::StoreUnavailable {
        reason: format!("{}: {err}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tally_types::{ActorId, CounterId, LockHold, OperationKind};

    use super::*;
    use crate::chain::{LogChain, RecordDraft};

    fn draft(n: i64) -> RecordDraft {
        RecordDraft {
            actor: ActorId::from("operator_c1"),
            actor_name: "Operator C1".into(),
            kind: OperationKind::Add,
            counters: vec![CounterId::from("c1")],
            amount: Some(Decimal::new(n, 0)),
            percentage: None,
            description: format!("Added {n} to c1"),
        }
    }

    #[test]
    fn first_run_has_no_balances() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.load_all().unwrap().is_none());
        assert!(store.recent_log(10).unwrap().is_empty());
        assert!(store.load_locks().unwrap().is_none());
    }

    #[test]
    fn balances_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let set: BalanceSet = [
            (CounterId::from("bank"), Decimal::ZERO),
            (CounterId::from("c1"), Decimal::new(12_345, 2)),
        ]
        .into_iter()
        .collect();
        {
            let mut store = JsonFileStore::open(dir.path()).unwrap();
            store.write_all(&set).unwrap();
        }
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.load_all().unwrap(), Some(set));
        assert!(!dir.path().join("balances.json.tmp").exists());
    }

    #[test]
    fn log_appends_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(dir.path()).unwrap();
        let mut chain = LogChain::genesis();
        for n in 1..=4 {
            store.append_log(&chain.seal(draft(n))).unwrap();
        }
        let tail = store.recent_log(2).unwrap();
        assert_eq!(tail.iter().map(|r| r.sequence).collect::<Vec<_>>(), vec![3, 4]);
        assert!(store.verify_log().is_ok());
    }

    #[test]
    fn edited_log_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(dir.path()).unwrap();
        let mut chain = LogChain::genesis();
        for n in 1..=3 {
            store.append_log(&chain.seal(draft(n))).unwrap();
        }
        let path = dir.path().join("operations.jsonl");
        let edited = fs::read_to_string(&path)
            .unwrap()
            .replace("Added 2 to c1", "Added 200 to c1");
        fs::write(&path, edited).unwrap();

        let err = store.verify_log().unwrap_err();
        assert!(matches!(err, TallyError::LogChainBroken { sequence: 2, .. }));
    }

    #[test]
    fn locks_mirror_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(dir.path()).unwrap();
        let mut snapshot = LockSnapshot::default();
        snapshot.counters.insert(
            CounterId::from("c1"),
            Some(LockHold {
                holder: ActorId::from("operator_c1"),
                since: Utc::now(),
            }),
        );
        store.mirror_locks(&snapshot).unwrap();
        assert_eq!(store.load_locks().unwrap(), Some(snapshot));
    }

    #[test]
    fn corrupt_balances_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("balances.json"), b"{not json").unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let err = store.load_all().unwrap_err();
        assert!(matches!(err, TallyError::Serialization(_)));
    }
}
