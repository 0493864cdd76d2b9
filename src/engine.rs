//! `FeeLedger` facade: configuration, JSON storage, and statement services.

use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

use fee_config::{Config, ConfigManager};
use fee_core::{
    storage::{PaymentSource, SchoolDirectory},
    Clock, CoreError, StatementRequest, StatementService, SystemClock,
};
use fee_domain::{
    FeeStatement, Payment, PaymentMethod, PaymentScope, School, SchoolDataset, Student, TermName,
    YearSelector,
};
use fee_storage_json::{load_dataset_from_path, JsonSchoolStore, StoragePaths};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{FeeLedgerError, Result};

/// Environment variable naming the base directory for config and data.
pub const HOME_ENV: &str = "FEE_LEDGER_HOME";

pub struct FeeLedger {
    base_dir: PathBuf,
    config_manager: ConfigManager,
    config: Config,
    store: JsonSchoolStore,
    clock: Arc<dyn Clock>,
}

impl FeeLedger {
    /// Opens the ledger under `FEE_LEDGER_HOME`, or `~/Documents/FeeLedger`.
    pub fn open_default() -> Result<Self> {
        let base_dir = env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Config::default().resolve_data_root());
        Self::open(base_dir)
    }

    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_clock(base_dir, Arc::new(SystemClock))
    }

    pub fn open_with_clock(base_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let base_dir = base_dir.into();
        let config_manager = ConfigManager::with_base_dir(base_dir.clone())?;
        let config = config_manager.load()?;
        let store = open_store(&data_root(&base_dir, &config), &clock)?;
        debug!("fee ledger opened at {}", base_dir.display());
        Ok(Self {
            base_dir,
            config_manager,
            config,
            store,
            clock,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn data_root(&self) -> PathBuf {
        data_root(&self.base_dir, &self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &JsonSchoolStore {
        &self.store
    }

    /// Updates and saves one configuration key. Moving `data_root` reopens the store.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.config.clone();
        updated.set(key, value)?;
        self.config_manager.save(&updated)?;
        if updated.data_root != self.config.data_root {
            self.store = open_store(&data_root(&self.base_dir, &updated), &self.clock)?;
        }
        self.config = updated;
        Ok(())
    }

    pub fn payment_scope(&self) -> PaymentScope {
        PaymentScope::parse(&self.config.payment_scope).unwrap_or_else(|| {
            warn!(
                "unknown payment scope `{}`, using academic_year",
                self.config.payment_scope
            );
            PaymentScope::default()
        })
    }

    /// Schools sorted by code.
    pub fn schools(&self) -> Result<Vec<School>> {
        let mut schools = self.store.schools()?;
        schools.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(schools)
    }

    /// Finds a school by code (case-insensitive) or id.
    pub fn find_school(&self, reference: &str) -> Result<School> {
        let needle = reference.trim();
        let id = Uuid::parse_str(needle).ok();
        self.store
            .schools()?
            .into_iter()
            .find(|school| Some(school.id) == id || school.code.eq_ignore_ascii_case(needle))
            .ok_or_else(|| FeeLedgerError::UnknownSchool(needle.to_string()))
    }

    /// Students of a school sorted by admission number.
    pub fn students(&self, school: &School) -> Result<Vec<Student>> {
        let mut students = self.store.students(school.id)?;
        students.sort_by(|a, b| a.admission_number.cmp(&b.admission_number));
        Ok(students)
    }

    /// Finds a student by admission number (case-insensitive) or id.
    pub fn find_student(&self, school: &School, reference: &str) -> Result<Student> {
        let needle = reference.trim();
        let id = Uuid::parse_str(needle).ok();
        self.store
            .students(school.id)?
            .into_iter()
            .find(|student| {
                Some(student.id) == id || student.admission_number.eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| FeeLedgerError::UnknownStudent {
                reference: needle.to_string(),
                school: school.code.clone(),
            })
    }

    /// Builds a statement request using the configured payment scope.
    pub fn request(
        &self,
        school: &School,
        student: &Student,
        year: Option<&str>,
    ) -> StatementRequest {
        StatementRequest::new(school.id, student.id)
            .for_year(year_selector(year))
            .with_scope(self.payment_scope())
    }

    /// Computes a statement, recording its year-end carry when configured to.
    pub fn statement(
        &self,
        school: &School,
        student: &Student,
        year: Option<&str>,
    ) -> Result<FeeStatement> {
        let request = self.request(school, student, year);
        let statement = if self.config.persist_carry_forward {
            StatementService::generate(&self.store, &request)?
        } else {
            StatementService::compute(&self.store, &request)?
        };
        debug!(
            "statement {} {} {}: outstanding {}",
            school.code, student.admission_number, statement.academic_year, statement.outstanding
        );
        Ok(statement)
    }

    /// Computes a statement without writing anything.
    pub fn preview(
        &self,
        school: &School,
        student: &Student,
        year: Option<&str>,
    ) -> Result<FeeStatement> {
        let request = self.request(school, student, year);
        Ok(StatementService::compute(&self.store, &request)?)
    }

    /// Records the year's closing balance so the next year opens with it.
    pub fn close_year(
        &self,
        school: &School,
        student: &Student,
        year: Option<&str>,
    ) -> Result<FeeStatement> {
        let request = self.request(school, student, year);
        Ok(StatementService::close_academic_year(&self.store, &request)?)
    }

    /// Copies a dataset file into the store, replacing any dataset for the same school.
    pub fn import_dataset(&self, path: &Path) -> Result<SchoolDataset> {
        let dataset = load_dataset_from_path(path)?;
        for warning in dataset.warnings() {
            warn!("{}: {}", dataset.school.code, warning);
        }
        self.store.save_dataset(&dataset)?;
        info!(
            "imported {} with {} student(s)",
            dataset.school.code,
            dataset.students.len()
        );
        Ok(dataset)
    }

    /// Records a payment dated now against a term of the selected academic year.
    pub fn record_payment(
        &self,
        school: &School,
        student: &Student,
        year: Option<&str>,
        term: &str,
        amount: Decimal,
        method: PaymentMethod,
    ) -> Result<Payment> {
        let selector = year_selector(year);
        let calendar = self.store.calendar(school.id)?;
        let academic_year = calendar
            .select(&selector)
            .ok_or_else(|| CoreError::AcademicYearNotFound(selector.to_string()))?;
        let term_name = TermName::parse(term);
        let term = calendar
            .term_by_name(academic_year.id, &term_name)
            .ok_or_else(|| {
                FeeLedgerError::InvalidInput(format!(
                    "{} is not listed for {}",
                    term_name, academic_year.name
                ))
            })?;

        let payment = Payment::new(
            school.id,
            student.id,
            academic_year.id,
            term.id,
            amount,
            self.clock.now(),
        )
        .with_method(method);
        self.store.record_payment(payment.clone())?;
        info!(
            "recorded {} {} for {} ({})",
            payment.receipt_number, amount, student.admission_number, term_name
        );
        Ok(payment)
    }

    pub fn payments(&self, school: &School, student: &Student) -> Result<Vec<Payment>> {
        Ok(self.store.payments_for_student(school.id, student.id)?)
    }
}

/// Parses a year argument: absent or `current`, a record id, or a year name.
pub fn year_selector(year: Option<&str>) -> YearSelector {
    match year.map(str::trim) {
        None | Some("") => YearSelector::Current,
        Some(value) if value.eq_ignore_ascii_case("current") => YearSelector::Current,
        Some(value) => match Uuid::parse_str(value) {
            Ok(id) => YearSelector::Id(id),
            Err(_) => YearSelector::Name(value.to_string()),
        },
    }
}

fn data_root(base_dir: &Path, config: &Config) -> PathBuf {
    config
        .data_root
        .clone()
        .unwrap_or_else(|| base_dir.to_path_buf())
}

fn open_store(root: &Path, clock: &Arc<dyn Clock>) -> Result<JsonSchoolStore> {
    Ok(JsonSchoolStore::new(StoragePaths::under(root))?.with_clock(Arc::clone(clock)))
}
