use std::{fs, sync::Arc};

use chrono::{TimeZone, Utc};
use fee_core::{
    storage::{BalanceStore, PaymentSource, SchoolDirectory},
    CoreError, FixedClock, StatementRequest, StatementService,
};
use fee_domain::{
    AcademicYear, AcademicYearCarryForward, GradeAssignment, Payment, School, SchoolDataset,
    Student, TermName,
};
use fee_storage_json::{JsonSchoolStore, StoragePaths};
use rust_decimal_macros::dec;
use tempfile::tempdir;
use uuid::Uuid;

fn sample_dataset() -> (SchoolDataset, Uuid, Uuid, Uuid) {
    let mut dataset = SchoolDataset::new(School::new("SCH-7", "Green Hills School"));
    let school_id = dataset.school_id();
    let year_id = dataset
        .calendar
        .add_standard_year(AcademicYear::new(school_id, 2024).current());
    let student_id = dataset.add_student(
        Student::new(school_id, "ADM-77", "Kevin Ouma")
            .with_grade(GradeAssignment::new(Uuid::new_v4(), "PP2")),
    );
    (dataset, school_id, student_id, year_id)
}

fn store_in(root: &std::path::Path) -> JsonSchoolStore {
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    JsonSchoolStore::new(StoragePaths::under(root))
        .expect("create store")
        .with_clock(Arc::new(clock))
}

#[test]
fn datasets_round_trip_through_disk() {
    let dir = tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let (dataset, school_id, student_id, _) = sample_dataset();

    store.save_dataset(&dataset).expect("save dataset");
    assert!(store.dataset_path(school_id).exists());
    assert_eq!(store.list_datasets().expect("list"), vec![school_id]);

    let schools = store.schools().expect("schools");
    assert_eq!(schools.len(), 1);
    assert_eq!(schools[0].code, "SCH-7");
    let student = store
        .student(school_id, student_id)
        .expect("lookup")
        .expect("student exists");
    assert_eq!(student.admission_number, "ADM-77");
    assert!(store.student(Uuid::new_v4(), student_id).expect("lookup").is_none());
}

#[test]
fn payments_are_validated_and_persisted() {
    let dir = tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let (dataset, school_id, student_id, year_id) = sample_dataset();
    let term_id = dataset
        .calendar
        .term_by_name(year_id, &TermName::Term1)
        .map(|term| term.id)
        .expect("term 1");
    store.save_dataset(&dataset).expect("save dataset");

    let when = Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap();
    let rejected = store.record_payment(Payment::new(
        school_id,
        student_id,
        year_id,
        term_id,
        dec!(-10),
        when,
    ));
    assert!(matches!(rejected, Err(CoreError::Validation(_))));

    let stranger = store.record_payment(Payment::new(
        school_id,
        Uuid::new_v4(),
        year_id,
        term_id,
        dec!(100),
        when,
    ));
    assert!(matches!(stranger, Err(CoreError::StudentNotFound(_))));

    store
        .record_payment(Payment::new(school_id, student_id, year_id, term_id, dec!(4200), when))
        .expect("payment recorded");
    let reopened = store_in(dir.path());
    let payments = reopened
        .payments_for_student(school_id, student_id)
        .expect("payments");
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, dec!(4200));
}

#[test]
fn saving_over_a_dataset_keeps_backups() {
    let dir = tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let (mut dataset, school_id, _, _) = sample_dataset();

    store.save_dataset(&dataset).expect("first save");
    assert!(store.list_backups(school_id).expect("backups").is_empty());

    dataset.school.name = "Green Hills Academy".into();
    store.save_dataset(&dataset).expect("second save");
    let backups = store.list_backups(school_id).expect("backups");
    assert_eq!(backups.len(), 1);
    assert!(backups[0].created_at.is_some());

    let restored = store.restore_backup(&backups[0]).expect("restore");
    assert_eq!(restored.school.name, "Green Hills School");
}

#[test]
fn saves_within_the_same_instant_keep_separate_backups() {
    let dir = tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let (mut dataset, school_id, _, _) = sample_dataset();

    for name in ["Green Hills School", "Green Hills Academy", "Green Hills College"] {
        dataset.school.name = name.into();
        store.save_dataset(&dataset).expect("save");
    }
    dataset.school.name = "Green Hills University".into();
    store.save_dataset(&dataset).expect("final save");

    let backups = store.list_backups(school_id).expect("backups");
    assert_eq!(backups.len(), 3);
    let mut ids: Vec<&str> = backups.iter().map(|backup| backup.id.as_str()).collect();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert!(backups.iter().all(|backup| backup.created_at == backups[0].created_at));

    let newest = store.restore_backup(&backups[0]).expect("restore newest");
    assert_eq!(newest.school.name, "Green Hills College");
    let oldest = store.restore_backup(&backups[2]).expect("restore oldest");
    assert_eq!(oldest.school.name, "Green Hills School");
}

#[test]
fn balance_upserts_are_idempotent_on_disk() {
    let dir = tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let student = Uuid::new_v4();
    let carry = AcademicYearCarryForward {
        student_id: student,
        next_academic_year: 2025,
        amount: dec!(-900),
    };

    store.upsert_carry_forward(&carry).expect("first write");
    let first = fs::read_to_string(&store.paths().balances_file).expect("balances file");
    store.upsert_carry_forward(&carry).expect("second write");
    let second = fs::read_to_string(&store.paths().balances_file).expect("balances file");
    assert_eq!(first, second);

    store
        .upsert_closing_balance(student, 2024, dec!(1200))
        .expect("closing write");
    let entry = store
        .yearly_balance(student, 2024)
        .expect("lookup")
        .expect("entry");
    assert_eq!(entry.closing_balance, Some(dec!(1200)));
    assert_eq!(
        store
            .yearly_balance(student, 2025)
            .expect("lookup")
            .map(|entry| entry.carry_forward_amount),
        Some(dec!(-900))
    );
}

#[test]
fn statements_compute_against_the_json_store() {
    let dir = tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let (dataset, school_id, student_id, _) = sample_dataset();
    store.save_dataset(&dataset).expect("save dataset");

    let statement =
        StatementService::generate(&store, &StatementRequest::new(school_id, student_id))
            .expect("statement");
    // PP2 defaults: 7500 + 1200 + 2000 + 800 + 1000 + 4000 per term
    assert_eq!(statement.academic_year_outstanding, dec!(49500));
    assert!(statement.uses_default_fees());
    assert!(statement.year_end_carry_forward.is_none());
}

#[test]
fn missing_school_is_reported() {
    let dir = tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let missing = Uuid::new_v4();
    assert!(store.school(missing).expect("lookup").is_none());
    assert!(matches!(
        store.calendar(missing),
        Err(CoreError::SchoolNotFound(id)) if id == missing
    ));
}
