//! Read sources and the persistence sink the engine depends on.

use fee_domain::{
    AcademicYearCarryForward, Arrear, FeeStructureRecord, Payment, School, SchoolCalendar,
    SchoolDataset, Student, StudentYearlyBalance,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::CoreError;

/// Resolves schools, students, and school calendars.
pub trait SchoolDirectory: Send + Sync {
    fn schools(&self) -> Result<Vec<School>, CoreError>;
    fn school(&self, school_id: Uuid) -> Result<Option<School>, CoreError>;
    fn students(&self, school_id: Uuid) -> Result<Vec<Student>, CoreError>;
    fn student(&self, school_id: Uuid, student_id: Uuid) -> Result<Option<Student>, CoreError>;
    fn calendar(&self, school_id: Uuid) -> Result<SchoolCalendar, CoreError>;
}

/// Supplies fee-structure records for a grade, optionally narrowed to one academic year.
pub trait FeeStructureSource: Send + Sync {
    fn fee_structures(
        &self,
        school_id: Uuid,
        grade_id: Uuid,
        academic_year_id: Option<Uuid>,
    ) -> Result<Vec<FeeStructureRecord>, CoreError>;
}

/// Supplies a student's payments in recorded order.
pub trait PaymentSource: Send + Sync {
    fn payments_for_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<Payment>, CoreError>;
}

/// Supplies manually recorded arrear adjustments.
pub trait ArrearSource: Send + Sync {
    fn arrears_for_student(&self, school_id: Uuid, student_id: Uuid)
        -> Result<Vec<Arrear>, CoreError>;
}

/// Persistence sink for year boundary balances. Writes are idempotent upserts.
pub trait BalanceStore: Send + Sync {
    fn yearly_balance(
        &self,
        student_id: Uuid,
        academic_year: i32,
    ) -> Result<Option<StudentYearlyBalance>, CoreError>;

    fn upsert_carry_forward(&self, carry: &AcademicYearCarryForward) -> Result<(), CoreError>;

    fn upsert_closing_balance(
        &self,
        student_id: Uuid,
        academic_year: i32,
        amount: Decimal,
    ) -> Result<(), CoreError>;
}

/// Everything a statement computation reads and writes.
pub trait FeeDataStore:
    SchoolDirectory + FeeStructureSource + PaymentSource + ArrearSource + BalanceStore
{
}

impl<T> FeeDataStore for T where
    T: SchoolDirectory + FeeStructureSource + PaymentSource + ArrearSource + BalanceStore
{
}

impl SchoolDirectory for SchoolDataset {
    fn schools(&self) -> Result<Vec<School>, CoreError> {
        Ok(vec![self.school.clone()])
    }

    fn school(&self, school_id: Uuid) -> Result<Option<School>, CoreError> {
        Ok((self.school.id == school_id).then(|| self.school.clone()))
    }

    fn students(&self, school_id: Uuid) -> Result<Vec<Student>, CoreError> {
        Ok(self
            .students
            .iter()
            .filter(|student| student.school_id == school_id)
            .cloned()
            .collect())
    }

    fn student(&self, school_id: Uuid, student_id: Uuid) -> Result<Option<Student>, CoreError> {
        Ok(self
            .find_student(student_id)
            .filter(|student| student.school_id == school_id)
            .cloned())
    }

    fn calendar(&self, school_id: Uuid) -> Result<SchoolCalendar, CoreError> {
        if self.school.id != school_id {
            return Err(CoreError::SchoolNotFound(school_id));
        }
        Ok(self.calendar.clone())
    }
}

impl FeeStructureSource for SchoolDataset {
    fn fee_structures(
        &self,
        school_id: Uuid,
        grade_id: Uuid,
        academic_year_id: Option<Uuid>,
    ) -> Result<Vec<FeeStructureRecord>, CoreError> {
        Ok(self
            .fee_structures
            .iter()
            .filter(|record| record.school_id == school_id && record.grade_id == grade_id)
            .filter(|record| match academic_year_id {
                Some(year_id) => record.academic_year_id == Some(year_id),
                None => true,
            })
            .cloned()
            .collect())
    }
}

impl PaymentSource for SchoolDataset {
    fn payments_for_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<Payment>, CoreError> {
        Ok(self
            .payments
            .iter()
            .filter(|payment| payment.school_id == school_id && payment.student_id == student_id)
            .cloned()
            .collect())
    }
}

impl ArrearSource for SchoolDataset {
    fn arrears_for_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<Arrear>, CoreError> {
        Ok(self
            .arrears
            .iter()
            .filter(|arrear| arrear.school_id == school_id && arrear.student_id == student_id)
            .cloned()
            .collect())
    }
}
