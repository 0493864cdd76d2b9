#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, TimeZone, Utc};
use fee_core::{Clock, FixedClock};
use fee_domain::{
    AcademicYear, Arrear, FeeStructureRecord, GradeAssignment, Payment, School, SchoolDataset,
    Student, TermName,
};
use fee_ledger::FeeLedger;
use fee_storage_json::save_dataset_to_path;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

pub const SCHOOL_CODE: &str = "SCH-100";
/// Grade 4, billed 10,000 a term, pays 12,000 then 5,000, owes 1,300 in arrears.
pub const BILLED_STUDENT: &str = "ADM-001";
/// PP2 with no recorded fee structures.
pub const UNBILLED_STUDENT: &str = "ADM-002";
/// Grade 4, overpays Term 3 by 500.
pub const OVERPAYING_STUDENT: &str = "ADM-003";

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
}

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(at(2024, 6, 1)))
}

pub fn sample_dataset() -> SchoolDataset {
    let mut dataset = SchoolDataset::new(School::new(SCHOOL_CODE, "Lakeview Primary"));
    let school_id = dataset.school_id();
    let year_id = dataset
        .calendar
        .add_standard_year(AcademicYear::new(school_id, 2024).current());
    dataset
        .calendar
        .add_standard_year(AcademicYear::new(school_id, 2025));
    let term_id = |dataset: &SchoolDataset, name: TermName| {
        dataset
            .calendar
            .term_by_name(year_id, &name)
            .map(|term| term.id)
            .unwrap()
    };

    let grade_id = Uuid::new_v4();
    let enrol = |admission: &str, name: &str, grade: &str, grade_id: Uuid| {
        Student::new(school_id, admission, name)
            .with_grade(GradeAssignment::new(grade_id, grade))
            .joined(2024, TermName::Term1)
    };
    let billed = dataset.add_student(enrol(BILLED_STUDENT, "Wanjiku Kamau", "Grade 4", grade_id));
    dataset.add_student(enrol(UNBILLED_STUDENT, "Otieno Baraka", "PP2", Uuid::new_v4()));
    let overpaying =
        dataset.add_student(enrol(OVERPAYING_STUDENT, "Achieng Mwangi", "Grade 4", grade_id));

    for (name, month) in [(TermName::Term1, 1), (TermName::Term2, 5), (TermName::Term3, 9)] {
        let term = term_id(&dataset, name);
        dataset.add_fee_structure(FeeStructureRecord::new(
            school_id,
            grade_id,
            year_id,
            term,
            dec!(10000),
            at(2024, month, 8),
        ));
    }

    let pay = |dataset: &mut SchoolDataset,
               student: Uuid,
               name: TermName,
               amount: Decimal,
               date: DateTime<Utc>| {
        let term = term_id(&*dataset, name);
        dataset.add_payment(Payment::new(school_id, student, year_id, term, amount, date));
    };
    pay(&mut dataset, billed, TermName::Term1, dec!(12000), at(2024, 1, 15));
    pay(&mut dataset, billed, TermName::Term2, dec!(5000), at(2024, 5, 20));
    pay(&mut dataset, overpaying, TermName::Term1, dec!(10000), at(2024, 1, 10));
    pay(&mut dataset, overpaying, TermName::Term2, dec!(10000), at(2024, 5, 10));
    pay(&mut dataset, overpaying, TermName::Term3, dec!(10500), at(2024, 9, 10));

    dataset.add_arrear(
        Arrear::new(school_id, billed, year_id, 2024, dec!(1300)).with_reason("Bus fees 2023"),
    );
    dataset
}

/// Writes the sample dataset to `dir/lakeview.json` and returns the path.
pub fn write_sample_dataset(dir: &Path) -> PathBuf {
    let path = dir.join("lakeview.json");
    save_dataset_to_path(&sample_dataset(), &path).expect("write dataset file");
    path
}

/// A ledger rooted at `base` with the sample dataset imported.
pub fn seeded_ledger(base: &Path) -> FeeLedger {
    let ledger = FeeLedger::open_with_clock(base, clock()).expect("open ledger");
    let file = write_sample_dataset(base);
    ledger.import_dataset(&file).expect("import dataset");
    ledger
}
