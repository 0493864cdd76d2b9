//! Serializable snapshot of everything the fee engine reads for one school.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    calendar::SchoolCalendar,
    fee::FeeStructureRecord,
    payment::{Arrear, Payment},
    school::{School, Student},
};

const CURRENT_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchoolDataset {
    pub school: School,
    #[serde(default)]
    pub calendar: SchoolCalendar,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub fee_structures: Vec<FeeStructureRecord>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub arrears: Vec<Arrear>,
    #[serde(default = "SchoolDataset::schema_version_default")]
    pub schema_version: u8,
}

impl SchoolDataset {
    pub fn new(school: School) -> Self {
        Self {
            school,
            calendar: SchoolCalendar::new(),
            students: Vec::new(),
            fee_structures: Vec::new(),
            payments: Vec::new(),
            arrears: Vec::new(),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }

    pub fn school_id(&self) -> Uuid {
        self.school.id
    }

    pub fn find_student(&self, id: Uuid) -> Option<&Student> {
        self.students.iter().find(|student| student.id == id)
    }

    pub fn add_student(&mut self, student: Student) -> Uuid {
        let id = student.id;
        self.students.push(student);
        id
    }

    pub fn add_fee_structure(&mut self, record: FeeStructureRecord) -> Uuid {
        let id = record.id;
        self.fee_structures.push(record);
        id
    }

    pub fn add_payment(&mut self, payment: Payment) -> Uuid {
        let id = payment.id;
        self.payments.push(payment);
        id
    }

    pub fn add_arrear(&mut self, arrear: Arrear) -> Uuid {
        let id = arrear.id;
        self.arrears.push(arrear);
        id
    }

    /// Lists references that point outside this dataset.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for payment in &self.payments {
            if self.find_student(payment.student_id).is_none() {
                warnings.push(format!(
                    "payment {} references unknown student {}",
                    payment.receipt_number, payment.student_id
                ));
            }
            if self.calendar.term(payment.term_id).is_none() {
                warnings.push(format!(
                    "payment {} references unknown term {}",
                    payment.receipt_number, payment.term_id
                ));
            }
        }
        for record in &self.fee_structures {
            if record.term_id.is_none() || record.academic_year_id.is_none() {
                warnings.push(format!(
                    "fee structure {} is missing its term or academic year",
                    record.id
                ));
            }
        }
        for arrear in &self.arrears {
            if self.find_student(arrear.student_id).is_none() {
                warnings.push(format!(
                    "arrear {} references unknown student {}",
                    arrear.id, arrear.student_id
                ));
            }
        }
        warnings
    }
}
