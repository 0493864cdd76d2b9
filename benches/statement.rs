use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fee_core::{FixedClock, InMemoryStore, StatementRequest, StatementService};
use fee_domain::{
    AcademicYear, FeeStructureRecord, GradeAssignment, Payment, School, SchoolDataset, Student,
    TermName,
};
use fee_storage_json::{load_dataset_from_path, save_dataset_to_path};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::tempdir;
use uuid::Uuid;

fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, 9, 0, 0).unwrap()
}

/// One billed grade, `students` enrolled, two payments per student per term.
fn build_dataset(students: usize) -> (SchoolDataset, Uuid) {
    let mut dataset = SchoolDataset::new(School::new("BENCH", "Benchmark Academy"));
    let school_id = dataset.school_id();
    let year_id = dataset
        .calendar
        .add_standard_year(AcademicYear::new(school_id, 2024).current());
    let grade_id = Uuid::new_v4();

    let schedule = [(TermName::Term1, 1), (TermName::Term2, 5), (TermName::Term3, 9)];
    let terms: Vec<(Uuid, u32)> = schedule
        .into_iter()
        .map(|(name, month)| {
            let term = dataset.calendar.term_by_name(year_id, &name).unwrap().id;
            (term, month)
        })
        .collect();
    for (term, month) in &terms {
        dataset.add_fee_structure(FeeStructureRecord::new(
            school_id,
            grade_id,
            year_id,
            *term,
            dec!(18500),
            at(*month, 3),
        ));
    }

    let mut first = None;
    for idx in 0..students {
        let admission = format!("ADM-{:05}", idx);
        let student = Student::new(school_id, admission, format!("Student {}", idx))
            .with_grade(GradeAssignment::new(grade_id, "Grade 6"))
            .joined(2024, TermName::Term1);
        let student_id = dataset.add_student(student);
        first.get_or_insert(student_id);
        for (term, month) in &terms {
            let amount = Decimal::from(7000 + (idx % 50) as i64 * 100);
            dataset.add_payment(Payment::new(
                school_id,
                student_id,
                year_id,
                *term,
                amount,
                at(*month, 10),
            ));
            dataset.add_payment(Payment::new(
                school_id,
                student_id,
                year_id,
                *term,
                dec!(4000),
                at(*month, 24),
            ));
        }
    }
    (dataset, first.unwrap())
}

fn bench_statement_compute(c: &mut Criterion) {
    let (dataset, student_id) = build_dataset(black_box(2_000));
    let request = StatementRequest::new(dataset.school_id(), student_id);
    let clock = FixedClock(at(6, 1));
    let store = InMemoryStore::with_clock(Arc::new(clock)).with_dataset(dataset);

    c.bench_function("statement_compute_2k_students", |b| {
        b.iter(|| {
            let statement = StatementService::compute(&store, &request).expect("statement");
            black_box(statement);
        })
    });
}

fn bench_dataset_io(c: &mut Criterion) {
    let (dataset, _) = build_dataset(black_box(2_000));
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("bench.json");

    c.bench_function("dataset_save_2k_students", |b| {
        b.iter(|| save_dataset_to_path(&dataset, &path).expect("save dataset"))
    });

    save_dataset_to_path(&dataset, &path).expect("seed");

    c.bench_function("dataset_load_2k_students", |b| {
        b.iter(|| {
            let loaded = load_dataset_from_path(&path).expect("load dataset");
            black_box(loaded);
        })
    });
}

criterion_group!(benches, bench_statement_compute, bench_dataset_io);
criterion_main!(benches);
