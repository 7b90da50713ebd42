use std::{
    fmt::Display,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, time::Instant};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{LedgerError, SaveError},
    fs::operations::write_atomically,
    utils::{duration::TrackedDuration, time::date_to_ledger_key},
};

use super::table::LedgerTable;

pub const LEDGER_FILE_NAME: &str = "timelog.csv";
const LOCK_SUFFIX: &str = ".lock";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of a successful save, enough to confirm it to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub date: NaiveDate,
    pub title: String,
    /// What this session contributed.
    pub saved: TrackedDuration,
    /// Value of the cell after merging.
    pub day_total: TrackedDuration,
    pub path: PathBuf,
}

impl Display for SaveReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Saved {} to {} under '{}' for {} (day total {})",
            self.saved,
            self.path.display(),
            self.title,
            date_to_ledger_key(self.date),
            self.day_total
        )
    }
}

/// Interface for abstracting storage of the ledger.
pub trait LedgerStorage {
    /// Merges `total` into the (`date`, `title`) cell and persists the table.
    fn record_session(
        &self,
        date: NaiveDate,
        title: &str,
        total: TrackedDuration,
    ) -> impl Future<Output = Result<SaveReceipt, SaveError>>;

    fn load(&self) -> impl Future<Output = Result<LedgerTable, LedgerError>>;
}

/// The main realization of [LedgerStorage].
pub struct LedgerStorageImpl {
    ledger_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl LedgerStorageImpl {
    pub fn new(dir: &Path) -> Self {
        let ledger_path = dir.join(LEDGER_FILE_NAME);
        let lock_path = dir.join(format!("{LEDGER_FILE_NAME}{LOCK_SUFFIX}"));
        Self {
            ledger_path,
            lock_path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(self, lock_timeout: Duration) -> Self {
        Self {
            lock_timeout,
            ..self
        }
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Polls for the exclusive lock until the timeout runs out. The lock lives as long as the
    /// returned file.
    async fn acquire_lock(&self) -> Result<File, LedgerError> {
        let file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.lock_path)
            .await?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Acquired ledger lock {:?}", self.lock_path);
                    return Ok(file);
                }
                Err(e) if started.elapsed() >= self.lock_timeout => {
                    return Err(LedgerError::LockTimeout {
                        path: self.lock_path.clone(),
                        waited: started.elapsed(),
                        last_error: Some(e),
                    });
                }
                Err(e) => {
                    debug!("Ledger lock is busy, retrying: {e}");
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn read_table(&self) -> Result<LedgerTable, LedgerError> {
        match tokio::fs::read(&self.ledger_path).await {
            Ok(data) => LedgerTable::from_reader(data.as_slice()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No ledger at {:?} yet", self.ledger_path);
                Ok(LedgerTable::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_table(&self, table: &LedgerTable) -> Result<(), LedgerError> {
        let mut buffer = Vec::<u8>::new();
        table.to_writer(&mut buffer)?;
        write_atomically(&self.ledger_path, &buffer).await?;
        Ok(())
    }

    async fn record_locked(
        &self,
        date: NaiveDate,
        title: &str,
        total: TrackedDuration,
    ) -> Result<SaveReceipt, SaveError> {
        let mut table = self.read_table().await?;
        let day_total = table.record_session(&date_to_ledger_key(date), title, total)?;
        self.write_table(&table).await?;

        Ok(SaveReceipt {
            date,
            title: title.trim().to_string(),
            saved: total,
            day_total,
            path: self.ledger_path.clone(),
        })
    }
}

impl LedgerStorage for LedgerStorageImpl {
    #[instrument(skip(self))]
    async fn record_session(
        &self,
        date: NaiveDate,
        title: &str,
        total: TrackedDuration,
    ) -> Result<SaveReceipt, SaveError> {
        if title.trim().is_empty() {
            return Err(SaveError::MissingTitle);
        }

        // Semi-safe acquire-release for the ledger. Dropping the file releases the lock as well.
        let lock = self.acquire_lock().await?;
        let result = self.record_locked(date, title, total).await;
        if let Err(e) = lock.unlock_async().await {
            warn!("Failed to release ledger lock {:?}: {e}", self.lock_path);
        }

        if let Ok(receipt) = &result {
            info!("{receipt}");
        }
        result
    }

    async fn load(&self) -> Result<LedgerTable, LedgerError> {
        let lock = self.acquire_lock().await?;
        let result = self.read_table().await;
        if let Err(e) = lock.unlock_async().await {
            warn!("Failed to release ledger lock {:?}: {e}", self.lock_path);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use anyhow::Result;
    use chrono::NaiveDate;
    use fs4::tokio::AsyncFileExt;
    use tempfile::tempdir;

    use super::{LedgerStorage, LedgerStorageImpl, LEDGER_FILE_NAME};
    use crate::{
        error::{LedgerError, SaveError},
        utils::duration::TrackedDuration,
    };

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn lines(path: &std::path::Path) -> Result<Vec<String>> {
        Ok(fs::read_to_string(path)?
            .lines()
            .map(str::to_string)
            .collect())
    }

    #[tokio::test]
    async fn test_record_session_creates_ledger() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorageImpl::new(dir.path());

        let receipt = storage
            .record_session(june_first(), "Coding", TrackedDuration::from_seconds(3661))
            .await?;

        assert_eq!(receipt.day_total.to_string(), "1:01:01");
        assert_eq!(receipt.path, dir.path().join(LEDGER_FILE_NAME));
        assert_eq!(
            lines(storage.ledger_path())?,
            vec!["Date,Coding", "01.06.2024,1:01:01"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_record_session_accumulates_across_saves() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorageImpl::new(dir.path());
        fs::write(storage.ledger_path(), "Date,Coding\n01.06.2024,0:30:00\n")?;

        storage
            .record_session(june_first(), "Coding", TrackedDuration::from_seconds(1800))
            .await?;
        storage
            .record_session(june_first(), "Reading", TrackedDuration::from_seconds(5))
            .await?;

        let table = storage.load().await?;
        assert_eq!(table.cell("01.06.2024", "Coding"), Some("1:00:00"));
        assert_eq!(table.cell("01.06.2024", "Reading"), Some("0:00:05"));
        Ok(())
    }

    #[tokio::test]
    async fn test_record_session_requires_title() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorageImpl::new(dir.path());

        let result = storage
            .record_session(june_first(), " ", TrackedDuration::from_seconds(1))
            .await;

        assert!(matches!(result, Err(SaveError::MissingTitle)));
        assert!(!storage.ledger_path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_record_session_times_out_on_held_lock() -> Result<()> {
        let dir = tempdir()?;
        let storage =
            LedgerStorageImpl::new(dir.path()).with_lock_timeout(Duration::from_millis(200));
        let held = tokio::fs::File::create(dir.path().join("timelog.csv.lock")).await?;
        held.lock_exclusive()?;

        let result = storage
            .record_session(june_first(), "Coding", TrackedDuration::from_seconds(1))
            .await;

        assert!(matches!(
            result,
            Err(SaveError::Ledger(LedgerError::LockTimeout { .. }))
        ));
        assert!(!storage.ledger_path().exists());

        held.unlock_async().await?;
        storage
            .record_session(june_first(), "Coding", TrackedDuration::from_seconds(1))
            .await?;
        assert!(storage.ledger_path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_record_session_reports_unreadable_ledger() -> Result<()> {
        let dir = tempdir()?;
        let storage = LedgerStorageImpl::new(dir.path());
        // A directory in place of the file can be neither read nor replaced.
        fs::create_dir(storage.ledger_path())?;

        let result = storage
            .record_session(june_first(), "Coding", TrackedDuration::from_seconds(1))
            .await;

        assert!(matches!(result, Err(SaveError::Ledger(LedgerError::Io(_)))));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_saves_do_not_lose_time() -> Result<()> {
        let dir = tempdir()?;
        let first = LedgerStorageImpl::new(dir.path());
        let second = LedgerStorageImpl::new(dir.path());

        let (a, b) = tokio::join!(
            first.record_session(june_first(), "Coding", TrackedDuration::from_seconds(10)),
            second.record_session(june_first(), "Coding", TrackedDuration::from_seconds(20)),
        );
        a?;
        b?;

        let table = first.load().await?;
        assert_eq!(table.cell("01.06.2024", "Coding"), Some("0:00:30"));
        Ok(())
    }
}
