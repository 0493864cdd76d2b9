use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use fee_core::{
    storage::{ArrearSource, BalanceStore, FeeStructureSource, PaymentSource, SchoolDirectory},
    Clock, CoreError, SystemClock,
};
use fee_domain::{
    AcademicYearCarryForward, Arrear, BalanceBook, FeeStructureRecord, Payment, School,
    SchoolCalendar, SchoolDataset, Student, StudentYearlyBalance,
};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

const FILE_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";
const BALANCES_FILE: &str = "balances.json";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// Directory layout used by [`JsonSchoolStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub schools_root: PathBuf,
    pub backups_root: PathBuf,
    pub balances_file: PathBuf,
}

impl StoragePaths {
    pub fn under(root: &Path) -> Self {
        Self {
            schools_root: root.join("schools"),
            backups_root: root.join("backups"),
            balances_file: root.join(BALANCES_FILE),
        }
    }
}

/// Filesystem-backed JSON store: one dataset file per school plus a shared
/// balances file. Every read goes back to disk.
#[derive(Clone)]
pub struct JsonSchoolStore {
    paths: StoragePaths,
    retention: usize,
    clock: Arc<dyn Clock>,
    write_lock: Arc<Mutex<()>>,
}

impl JsonSchoolStore {
    pub fn new(paths: StoragePaths) -> Result<Self, CoreError> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, retention: usize) -> Result<Self, CoreError> {
        fs::create_dir_all(&paths.schools_root)?;
        fs::create_dir_all(&paths.backups_root)?;
        Ok(Self {
            paths,
            retention: retention.max(1),
            clock: Arc::new(SystemClock),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn dataset_path(&self, school_id: Uuid) -> PathBuf {
        self.paths
            .schools_root
            .join(format!("{}.{}", school_id, FILE_EXTENSION))
    }

    /// Writes a dataset, keeping a timestamped copy of the file it replaces.
    pub fn save_dataset(&self, dataset: &SchoolDataset) -> Result<(), CoreError> {
        let _guard = self.lock()?;
        self.write_dataset(dataset)
    }

    pub fn load_dataset(&self, school_id: Uuid) -> Result<Option<SchoolDataset>, CoreError> {
        let path = self.dataset_path(school_id);
        if !path.exists() {
            return Ok(None);
        }
        load_dataset_from_path(&path).map(Some)
    }

    pub fn list_datasets(&self) -> Result<Vec<Uuid>, CoreError> {
        if !self.paths.schools_root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.paths.schools_root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Appends a payment to the student's school dataset.
    pub fn record_payment(&self, payment: Payment) -> Result<Uuid, CoreError> {
        if payment.amount <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "payment amount must be positive, got {}",
                payment.amount
            )));
        }
        let _guard = self.lock()?;
        let mut dataset = self.require_dataset(payment.school_id)?;
        if dataset.find_student(payment.student_id).is_none() {
            return Err(CoreError::StudentNotFound(payment.student_id));
        }
        let id = dataset.add_payment(payment);
        self.write_dataset(&dataset)?;
        Ok(id)
    }

    pub fn load_balances(&self) -> Result<BalanceBook, CoreError> {
        let path = &self.paths.balances_file;
        if !path.exists() {
            return Ok(BalanceBook::default());
        }
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))
    }

    pub fn list_backups(&self, school_id: Uuid) -> Result<Vec<BackupInfo>, CoreError> {
        let dir = self.backup_dir(school_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                let stamp = parse_backup_name(file_name);
                entries.push((
                    stamp,
                    BackupInfo {
                        school_id,
                        id: file_name.to_string(),
                        created_at: stamp.map(|(created_at, _)| created_at),
                        path: path.clone(),
                    },
                ));
            }
        }
        entries.sort_by_key(|(stamp, _)| Reverse(*stamp));
        Ok(entries.into_iter().map(|(_, info)| info).collect())
    }

    pub fn restore_backup(&self, backup: &BackupInfo) -> Result<SchoolDataset, CoreError> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        let _guard = self.lock()?;
        let target = self.dataset_path(backup.school_id);
        fs::copy(&backup.path, &target)?;
        load_dataset_from_path(&target)
    }

    fn require_dataset(&self, school_id: Uuid) -> Result<SchoolDataset, CoreError> {
        self.load_dataset(school_id)?
            .ok_or(CoreError::SchoolNotFound(school_id))
    }

    fn write_dataset(&self, dataset: &SchoolDataset) -> Result<(), CoreError> {
        let path = self.dataset_path(dataset.school_id());
        if path.exists() {
            self.backup_existing_file(dataset.school_id(), &path)?;
        }
        let data = serde_json::to_string_pretty(dataset)
            .map_err(|err| CoreError::Serde(err.to_string()))?;
        replace_file(&path, &data)?;
        debug!("saved dataset for school {}", dataset.school.code);
        Ok(())
    }

    fn update_balances<F>(&self, apply: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut BalanceBook, DateTime<Utc>),
    {
        let write_failed = |err: CoreError| CoreError::PersistenceWrite(err.to_string());
        let _guard = self.lock().map_err(write_failed)?;
        let mut book = self.load_balances().map_err(write_failed)?;
        apply(&mut book, self.clock.now());
        let data = serde_json::to_string_pretty(&book)
            .map_err(|err| CoreError::PersistenceWrite(err.to_string()))?;
        replace_file(&self.paths.balances_file, &data).map_err(write_failed)
    }

    fn backup_dir(&self, school_id: Uuid) -> PathBuf {
        self.paths.backups_root.join(school_id.to_string())
    }

    fn backup_existing_file(&self, school_id: Uuid, path: &Path) -> Result<(), CoreError> {
        let dir = self.backup_dir(school_id);
        fs::create_dir_all(&dir)?;
        let timestamp = self.clock.now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut backup_path = dir.join(format!("{}_{}.{}", school_id, timestamp, FILE_EXTENSION));
        let mut sequence = 0u32;
        while backup_path.exists() {
            sequence += 1;
            backup_path = dir.join(format!(
                "{}_{}-{}.{}",
                school_id, timestamp, sequence, FILE_EXTENSION
            ));
        }
        fs::copy(path, &backup_path)?;
        self.prune_backups(school_id)
    }

    fn prune_backups(&self, school_id: Uuid) -> Result<(), CoreError> {
        for entry in self.list_backups(school_id)?.into_iter().skip(self.retention) {
            let _ = fs::remove_file(entry.path);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, CoreError> {
        self.write_lock
            .lock()
            .map_err(|_| CoreError::Storage("store lock poisoned".into()))
    }

    fn with_dataset<T, F>(&self, school_id: Uuid, read: F) -> Result<T, CoreError>
    where
        F: FnOnce(&SchoolDataset) -> Result<T, CoreError>,
    {
        read(&self.require_dataset(school_id)?)
    }
}

impl SchoolDirectory for JsonSchoolStore {
    fn schools(&self) -> Result<Vec<School>, CoreError> {
        let mut schools = Vec::new();
        for id in self.list_datasets()? {
            if let Some(dataset) = self.load_dataset(id)? {
                schools.push(dataset.school);
            }
        }
        schools.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(schools)
    }

    fn school(&self, school_id: Uuid) -> Result<Option<School>, CoreError> {
        Ok(self.load_dataset(school_id)?.map(|dataset| dataset.school))
    }

    fn students(&self, school_id: Uuid) -> Result<Vec<Student>, CoreError> {
        self.with_dataset(school_id, |dataset| dataset.students(school_id))
    }

    fn student(&self, school_id: Uuid, student_id: Uuid) -> Result<Option<Student>, CoreError> {
        match self.load_dataset(school_id)? {
            Some(dataset) => SchoolDirectory::student(&dataset, school_id, student_id),
            None => Ok(None),
        }
    }

    fn calendar(&self, school_id: Uuid) -> Result<SchoolCalendar, CoreError> {
        self.with_dataset(school_id, |dataset| dataset.calendar(school_id))
    }
}

impl FeeStructureSource for JsonSchoolStore {
    fn fee_structures(
        &self,
        school_id: Uuid,
        grade_id: Uuid,
        academic_year_id: Option<Uuid>,
    ) -> Result<Vec<FeeStructureRecord>, CoreError> {
        self.with_dataset(school_id, |dataset| {
            dataset.fee_structures(school_id, grade_id, academic_year_id)
        })
    }
}

impl PaymentSource for JsonSchoolStore {
    fn payments_for_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<Payment>, CoreError> {
        self.with_dataset(school_id, |dataset| {
            dataset.payments_for_student(school_id, student_id)
        })
    }
}

impl ArrearSource for JsonSchoolStore {
    fn arrears_for_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<Arrear>, CoreError> {
        self.with_dataset(school_id, |dataset| {
            dataset.arrears_for_student(school_id, student_id)
        })
    }
}

impl BalanceStore for JsonSchoolStore {
    fn yearly_balance(
        &self,
        student_id: Uuid,
        academic_year: i32,
    ) -> Result<Option<StudentYearlyBalance>, CoreError> {
        Ok(self
            .load_balances()?
            .get(student_id, academic_year)
            .cloned())
    }

    fn upsert_carry_forward(&self, carry: &AcademicYearCarryForward) -> Result<(), CoreError> {
        self.update_balances(|book, now| book.upsert_carry_forward(carry, now))
    }

    fn upsert_closing_balance(
        &self,
        student_id: Uuid,
        academic_year: i32,
        amount: Decimal,
    ) -> Result<(), CoreError> {
        self.update_balances(|book, now| {
            book.upsert_closing_balance(student_id, academic_year, amount, now)
        })
    }
}

/// A retained copy of a school dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub school_id: Uuid,
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// Loads a school dataset from the provided filesystem path.
pub fn load_dataset_from_path(path: &Path) -> Result<SchoolDataset, CoreError> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))
}

/// Saves a school dataset to an arbitrary path on disk.
pub fn save_dataset_to_path(dataset: &SchoolDataset, path: &Path) -> Result<(), CoreError> {
    let data =
        serde_json::to_string_pretty(dataset).map_err(|err| CoreError::Serde(err.to_string()))?;
    replace_file(path, &data)
}

/// Creation time and same-instant sequence of a backup file.
///
/// Accepts `<school>_<date>_<time>_<micros>[-<n>].json` and the older
/// `<school>_<date>_<time>.json`.
fn parse_backup_name(name: &str) -> Option<(DateTime<Utc>, u32)> {
    let trimmed = name.strip_suffix(&format!(".{}", FILE_EXTENSION))?;
    let (stem, sequence) = match trimmed.rsplit_once('-') {
        Some((stem, suffix)) if !suffix.is_empty() && is_digits(suffix, suffix.len()) => {
            (stem, suffix.parse().ok()?)
        }
        _ => (trimmed, 0),
    };
    let segments: Vec<&str> = stem.rsplit('_').take(3).collect();
    let (date, time, micros) = match segments.as_slice() {
        [micros, time, date]
            if is_digits(date, 8) && is_digits(time, 6) && is_digits(micros, 6) =>
        {
            (*date, *time, *micros)
        }
        [time, date, ..] if is_digits(date, 8) && is_digits(time, 6) => (*date, *time, "0"),
        _ => return None,
    };
    let naive =
        NaiveDateTime::parse_from_str(&format!("{}{}", date, time), "%Y%m%d%H%M%S").ok()?;
    let offset = Duration::microseconds(micros.parse().ok()?);
    Some((DateTime::from_naive_utc_and_offset(naive, Utc) + offset, sequence))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

fn replace_file(path: &Path, data: &str) -> Result<(), CoreError> {
    let tmp = tmp_path(path);
    write_atomic(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
