//! Thread-safe in-memory implementation of every source and the balance sink.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::warn;

use fee_domain::{
    AcademicYearCarryForward, Arrear, BalanceBook, FeeStructureRecord, Payment, School,
    SchoolCalendar, SchoolDataset, Student, StudentYearlyBalance,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    storage::{ArrearSource, BalanceStore, FeeStructureSource, PaymentSource, SchoolDirectory},
    time::{Clock, SystemClock},
    CoreError,
};

/// Holds school datasets and yearly balances behind `RwLock`s.
pub struct InMemoryStore {
    datasets: RwLock<HashMap<Uuid, SchoolDataset>>,
    balances: RwLock<BalanceBook>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            datasets: RwLock::new(HashMap::new()),
            balances: RwLock::new(BalanceBook::default()),
            clock,
        }
    }

    /// Adds a dataset while building the store. A poisoned lock is recovered, not skipped.
    pub fn with_dataset(mut self, dataset: SchoolDataset) -> Self {
        let datasets = self.datasets.get_mut().unwrap_or_else(|poisoned| {
            warn!(
                "dataset lock poisoned while adding school {}; keeping recovered datasets",
                dataset.school.code
            );
            poisoned.into_inner()
        });
        datasets.insert(dataset.school_id(), dataset);
        self
    }

    pub fn insert_dataset(&self, dataset: SchoolDataset) -> Result<(), CoreError> {
        self.write_datasets()?.insert(dataset.school_id(), dataset);
        Ok(())
    }

    pub fn dataset(&self, school_id: Uuid) -> Result<Option<SchoolDataset>, CoreError> {
        Ok(self.read_datasets()?.get(&school_id).cloned())
    }

    /// Applies `mutate` to a school's dataset.
    pub fn update_dataset<F>(&self, school_id: Uuid, mutate: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut SchoolDataset),
    {
        let mut datasets = self.write_datasets()?;
        let dataset = datasets
            .get_mut(&school_id)
            .ok_or(CoreError::SchoolNotFound(school_id))?;
        mutate(dataset);
        Ok(())
    }

    pub fn record_payment(&self, payment: Payment) -> Result<Uuid, CoreError> {
        if payment.amount <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "payment amount must be positive, got {}",
                payment.amount
            )));
        }
        let mut datasets = self.write_datasets()?;
        let dataset = datasets
            .get_mut(&payment.school_id)
            .ok_or(CoreError::SchoolNotFound(payment.school_id))?;
        if dataset.find_student(payment.student_id).is_none() {
            return Err(CoreError::StudentNotFound(payment.student_id));
        }
        Ok(dataset.add_payment(payment))
    }

    pub fn balance_book(&self) -> Result<BalanceBook, CoreError> {
        Ok(self.read_balances()?.clone())
    }

    fn read_datasets(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<Uuid, SchoolDataset>>, CoreError> {
        self.datasets
            .read()
            .map_err(|_| CoreError::Storage("dataset lock poisoned".into()))
    }

    fn write_datasets(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, SchoolDataset>>, CoreError> {
        self.datasets
            .write()
            .map_err(|_| CoreError::Storage("dataset lock poisoned".into()))
    }

    fn read_balances(&self) -> Result<RwLockReadGuard<'_, BalanceBook>, CoreError> {
        self.balances
            .read()
            .map_err(|_| CoreError::Storage("balance lock poisoned".into()))
    }

    fn write_balances(&self) -> Result<RwLockWriteGuard<'_, BalanceBook>, CoreError> {
        self.balances
            .write()
            .map_err(|_| CoreError::PersistenceWrite("balance lock poisoned".into()))
    }

    fn with_school<T, F>(&self, school_id: Uuid, read: F) -> Result<T, CoreError>
    where
        F: FnOnce(&SchoolDataset) -> Result<T, CoreError>,
    {
        let datasets = self.read_datasets()?;
        let dataset = datasets
            .get(&school_id)
            .ok_or(CoreError::SchoolNotFound(school_id))?;
        read(dataset)
    }
}

impl SchoolDirectory for InMemoryStore {
    fn schools(&self) -> Result<Vec<School>, CoreError> {
        let mut schools: Vec<School> = self
            .read_datasets()?
            .values()
            .map(|dataset| dataset.school.clone())
            .collect();
        schools.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(schools)
    }

    fn school(&self, school_id: Uuid) -> Result<Option<School>, CoreError> {
        Ok(self
            .read_datasets()?
            .get(&school_id)
            .map(|dataset| dataset.school.clone()))
    }

    fn students(&self, school_id: Uuid) -> Result<Vec<Student>, CoreError> {
        self.with_school(school_id, |dataset| dataset.students(school_id))
    }

    fn student(&self, school_id: Uuid, student_id: Uuid) -> Result<Option<Student>, CoreError> {
        let datasets = self.read_datasets()?;
        match datasets.get(&school_id) {
            Some(dataset) => SchoolDirectory::student(dataset, school_id, student_id),
            None => Ok(None),
        }
    }

    fn calendar(&self, school_id: Uuid) -> Result<SchoolCalendar, CoreError> {
        self.with_school(school_id, |dataset| dataset.calendar(school_id))
    }
}

impl FeeStructureSource for InMemoryStore {
    fn fee_structures(
        &self,
        school_id: Uuid,
        grade_id: Uuid,
        academic_year_id: Option<Uuid>,
    ) -> Result<Vec<FeeStructureRecord>, CoreError> {
        self.with_school(school_id, |dataset| {
            dataset.fee_structures(school_id, grade_id, academic_year_id)
        })
    }
}

impl PaymentSource for InMemoryStore {
    fn payments_for_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<Payment>, CoreError> {
        self.with_school(school_id, |dataset| {
            dataset.payments_for_student(school_id, student_id)
        })
    }
}

impl ArrearSource for InMemoryStore {
    fn arrears_for_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<Arrear>, CoreError> {
        self.with_school(school_id, |dataset| {
            dataset.arrears_for_student(school_id, student_id)
        })
    }
}

impl BalanceStore for InMemoryStore {
    fn yearly_balance(
        &self,
        student_id: Uuid,
        academic_year: i32,
    ) -> Result<Option<StudentYearlyBalance>, CoreError> {
        Ok(self
            .read_balances()?
            .get(student_id, academic_year)
            .cloned())
    }

    fn upsert_carry_forward(&self, carry: &AcademicYearCarryForward) -> Result<(), CoreError> {
        let now = self.clock.now();
        self.write_balances()?.upsert_carry_forward(carry, now);
        Ok(())
    }

    fn upsert_closing_balance(
        &self,
        student_id: Uuid,
        academic_year: i32,
        amount: Decimal,
    ) -> Result<(), CoreError> {
        let now = self.clock.now();
        self.write_balances()?
            .upsert_closing_balance(student_id, academic_year, amount, now);
        Ok(())
    }
}
