use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fee_domain::{
    AcademicYear, AcademicYearCarryForward, Arrear, EntryKind, FeeStatement, FeeStructureRecord,
    GradeAssignment, Payment, PaymentScope, School, SchoolCalendar, SchoolDataset, Student,
    StudentYearlyBalance, TermName, YearSelector,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::{
    balance_service::BalanceService,
    memory::InMemoryStore,
    statement_service::{StatementRequest, StatementService},
    storage::{ArrearSource, BalanceStore, FeeStructureSource, PaymentSource, SchoolDirectory},
    time::{FixedClock, SystemClock},
    CoreError,
};

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
}

fn dated_year(calendar: &mut SchoolCalendar, academic_year: AcademicYear) -> Uuid {
    let year = academic_year.year;
    let year_id = calendar.add_standard_year(academic_year);
    let dates = [
        (TermName::Term1, ymd(year, 1, 8), ymd(year, 4, 5)),
        (TermName::Term2, ymd(year, 5, 6), ymd(year, 8, 2)),
        (TermName::Term3, ymd(year, 9, 2), ymd(year, 11, 22)),
    ];
    for term in calendar.terms.iter_mut() {
        if term.academic_year_id != year_id {
            continue;
        }
        if let Some((_, start, end)) = dates.iter().find(|(name, _, _)| name == &term.name) {
            *term = term.clone().with_dates(*start, *end);
        }
    }
    year_id
}

struct Scenario {
    store: InMemoryStore,
    school_id: Uuid,
    student_id: Uuid,
    grade_id: Uuid,
    year_id: Uuid,
    next_year_id: Uuid,
}

impl Scenario {
    fn new() -> Self {
        Self::with_student(|student| student.joined(2024, TermName::Term1))
    }

    fn with_student<F>(configure: F) -> Self
    where
        F: FnOnce(Student) -> Student,
    {
        let clock = FixedClock(at(2024, 6, 1));
        let mut dataset = SchoolDataset::new(School::new("SCH-100", "Lakeview Primary"));
        let school_id = dataset.school_id();
        let year_id = dated_year(
            &mut dataset.calendar,
            AcademicYear::new(school_id, 2024).current(),
        );
        let next_year_id = dated_year(&mut dataset.calendar, AcademicYear::new(school_id, 2025));
        let grade_id = Uuid::new_v4();
        let student = configure(
            Student::new(school_id, "ADM-2024-001", "Wanjiku Kamau")
                .with_grade(GradeAssignment::new(grade_id, "Grade 4")),
        );
        let student_id = dataset.add_student(student);

        Self {
            store: InMemoryStore::with_clock(Arc::new(clock)).with_dataset(dataset),
            school_id,
            student_id,
            grade_id,
            year_id,
            next_year_id,
        }
    }

    fn term_id(&self, year_id: Uuid, name: TermName) -> Uuid {
        self.store
            .calendar(self.school_id)
            .expect("calendar")
            .term_by_name(year_id, &name)
            .map(|term| term.id)
            .expect("term exists")
    }

    fn term_start(&self, year_id: Uuid, name: TermName) -> DateTime<Utc> {
        let start = self
            .store
            .calendar(self.school_id)
            .expect("calendar")
            .term_by_name(year_id, &name)
            .and_then(|term| term.start_date)
            .expect("term has dates");
        start.and_hms_opt(0, 0, 0).unwrap().and_utc()
    }

    fn charge(&self, name: TermName, amount: Decimal) {
        self.charge_in(self.year_id, name, amount);
    }

    fn charge_in(&self, year_id: Uuid, name: TermName, amount: Decimal) {
        let record = FeeStructureRecord::new(
            self.school_id,
            self.grade_id,
            year_id,
            self.term_id(year_id, name.clone()),
            amount,
            self.term_start(year_id, name),
        );
        self.store
            .update_dataset(self.school_id, |dataset| {
                dataset.add_fee_structure(record);
            })
            .expect("charge stored");
    }

    fn pay(&self, name: TermName, amount: Decimal, date: DateTime<Utc>) -> Uuid {
        self.pay_in(self.year_id, name, amount, date)
    }

    fn pay_in(
        &self,
        year_id: Uuid,
        name: TermName,
        amount: Decimal,
        date: DateTime<Utc>,
    ) -> Uuid {
        let payment = Payment::new(
            self.school_id,
            self.student_id,
            year_id,
            self.term_id(year_id, name),
            amount,
            date,
        );
        self.store.record_payment(payment).expect("payment stored")
    }

    fn arrear(&self, year_id: Uuid, year: i32, amount: Decimal) {
        let arrear = Arrear::new(self.school_id, self.student_id, year_id, year, amount);
        self.store
            .update_dataset(self.school_id, |dataset| {
                dataset.add_arrear(arrear);
            })
            .expect("arrear stored");
    }

    fn request(&self) -> StatementRequest {
        StatementRequest::new(self.school_id, self.student_id)
    }

    fn statement(&self) -> FeeStatement {
        StatementService::compute(&self.store, &self.request()).expect("statement computes")
    }
}

fn worked_example() -> Scenario {
    let scenario = Scenario::new();
    for term in TermName::canonical() {
        scenario.charge(term, dec!(10000));
    }
    scenario.pay(TermName::Term1, dec!(12000), at(2024, 1, 15));
    scenario.pay(TermName::Term2, dec!(5000), at(2024, 5, 20));
    scenario
}

fn assert_statement_invariants(statement: &FeeStatement) {
    for term in &statement.term_balances {
        assert!(term.balance >= Decimal::ZERO, "negative balance in {}", term.term);
        assert_eq!(term.base_balance, term.total_amount - term.payments);
        assert_eq!(term.carry_to_next, term.unclamped_balance().min(Decimal::ZERO));
        assert_eq!(term.balance, term.unclamped_balance().max(Decimal::ZERO));
    }
    for pair in statement.term_balances.windows(2) {
        assert_eq!(pair[1].carry_forward, pair[0].carry_to_next);
    }
    assert_eq!(
        statement.outstanding,
        statement.academic_year_outstanding + statement.arrears
    );
}

#[test]
fn worked_example_produces_expected_term_figures() {
    let statement = worked_example().statement();
    assert_statement_invariants(&statement);

    let figures: Vec<(Decimal, Decimal, Decimal, Decimal)> = statement
        .term_balances
        .iter()
        .map(|term| (term.balance, term.carry_forward, term.carry_to_next, term.paid_amount))
        .collect();
    assert_eq!(
        figures,
        vec![
            (dec!(0), dec!(0), dec!(-2000), dec!(12000)),
            (dec!(3000), dec!(-2000), dec!(0), dec!(7000)),
            (dec!(10000), dec!(0), dec!(0), dec!(0)),
        ]
    );
    assert_eq!(statement.academic_year_outstanding, dec!(13000));
    assert_eq!(statement.outstanding, dec!(13000));
    let term_total: Decimal = statement.term_balances.iter().map(|term| term.balance).sum();
    assert_eq!(term_total, dec!(13000));
    assert_eq!(statement.total_charges(), dec!(30000));
    assert_eq!(statement.total_payments(), dec!(17000));
    assert!(statement.year_end_carry_forward.is_none());
    assert!(!statement.uses_default_fees());
}

#[test]
fn transactions_carry_running_balance_in_date_order() {
    let statement = worked_example().statement();
    let ledger: Vec<(EntryKind, Decimal)> = statement
        .transactions
        .iter()
        .map(|transaction| (transaction.kind, transaction.running_balance))
        .collect();
    assert_eq!(
        ledger,
        vec![
            (EntryKind::Debit, dec!(10000)),
            (EntryKind::Credit, dec!(-2000)),
            (EntryKind::Debit, dec!(8000)),
            (EntryKind::Credit, dec!(3000)),
            (EntryKind::Debit, dec!(13000)),
        ]
    );
    assert!(statement
        .transactions
        .windows(2)
        .all(|pair| pair[0].date <= pair[1].date));
}

#[test]
fn prior_overpayment_is_absorbed_by_next_term() {
    let scenario = Scenario::new();
    scenario.charge(TermName::Term1, dec!(1000));
    scenario.charge(TermName::Term2, dec!(2000));
    scenario.charge(TermName::Term3, dec!(1000));
    scenario.pay(TermName::Term1, dec!(1500), at(2024, 1, 20));

    let statement = scenario.statement();
    assert_statement_invariants(&statement);
    let term1 = statement.term(&TermName::Term1).expect("term 1");
    let term2 = statement.term(&TermName::Term2).expect("term 2");
    assert_eq!(term1.carry_to_next, dec!(-500));
    assert_eq!(term2.total_amount, dec!(2000));
    assert_eq!(term2.payments, Decimal::ZERO);
    assert_eq!(term2.balance, dec!(1500));
    assert_eq!(term2.paid_amount, dec!(500));
}

#[test]
fn term_balances_follow_canonical_order() {
    let scenario = Scenario::new();
    scenario.charge(TermName::Term3, dec!(3000));
    scenario.charge(TermName::Term1, dec!(1000));
    scenario.charge(TermName::Term2, dec!(2000));

    let statement = scenario.statement();
    let order: Vec<(TermName, Decimal)> = statement
        .term_balances
        .iter()
        .map(|term| (term.term.clone(), term.total_amount))
        .collect();
    assert_eq!(
        order,
        vec![
            (TermName::Term1, dec!(1000)),
            (TermName::Term2, dec!(2000)),
            (TermName::Term3, dec!(3000)),
        ]
    );
}

#[test]
fn payments_before_join_point_are_ignored() {
    let scenario = Scenario::with_student(|student| student.joined(2024, TermName::Term2));
    for term in TermName::canonical() {
        scenario.charge(term, dec!(5000));
    }
    let early = scenario.pay(TermName::Term1, dec!(5000), at(2024, 2, 1));
    scenario.pay(TermName::Term2, dec!(5000), at(2024, 5, 10));

    let statement = scenario.statement();
    assert!(statement
        .transactions
        .iter()
        .all(|transaction| transaction.source_id != Some(early)));
    assert!(statement.payment_history.iter().all(|payment| payment.id != early));
    let term1 = statement.term(&TermName::Term1).expect("term 1");
    assert_eq!(term1.payments, Decimal::ZERO);
    assert_eq!(term1.balance, dec!(5000));
    assert_eq!(statement.academic_year_outstanding, dec!(10000));
}

#[test]
fn arrears_from_join_year_onward_add_to_outstanding() {
    let scenario = worked_example();
    let prior_year_id = Uuid::new_v4();
    scenario.arrear(prior_year_id, 2023, dec!(9999));
    scenario.arrear(scenario.year_id, 2024, dec!(1500));
    scenario.arrear(scenario.next_year_id, 2025, dec!(-200));

    let statement = scenario.statement();
    assert_eq!(statement.arrears, dec!(1300));
    assert_eq!(statement.outstanding, dec!(14300));
    assert_eq!(statement.academic_year_outstanding, dec!(13000));
    let term_total: Decimal = statement.term_balances.iter().map(|term| term.balance).sum();
    assert_eq!(term_total, dec!(13000));
}

#[test]
fn repeated_computation_is_identical() {
    let scenario = worked_example();
    scenario.arrear(scenario.year_id, 2024, dec!(250));
    let first = scenario.statement();
    let second = scenario.statement();
    assert_eq!(first, second);
}

#[test]
fn missing_billing_data_falls_back_to_default_table() {
    let scenario = Scenario::new();
    scenario.charge(TermName::Term1, dec!(18000));

    let statement = scenario.statement();
    assert!(statement.uses_default_fees());
    assert_eq!(statement.fee_structures.len(), 3);
    assert!(statement.fee_structures[0].is_authoritative());
    // Grade 4 row: 11000 + 2000 + 2800 + 1200 + 2000 + 5000
    assert_eq!(statement.term_balances[1].total_amount, dec!(24000));
    assert_eq!(statement.academic_year_outstanding, dec!(66000));
}

#[test]
fn precondition_failures_are_distinct() {
    let scenario = Scenario::with_student(|mut student| {
        student.grade = None;
        student
    });

    let err = StatementService::compute(&scenario.store, &scenario.request())
        .expect_err("grade required");
    assert!(matches!(err, CoreError::MissingGradeAssignment(id) if id == scenario.student_id));

    let unknown_student = StatementRequest::new(scenario.school_id, Uuid::new_v4());
    let err = StatementService::compute(&scenario.store, &unknown_student)
        .expect_err("student required");
    assert!(matches!(err, CoreError::StudentNotFound(_)));

    let unknown_school = StatementRequest::new(Uuid::new_v4(), scenario.student_id);
    let err = StatementService::compute(&scenario.store, &unknown_school)
        .expect_err("school required");
    assert!(matches!(err, CoreError::SchoolNotFound(_)));
    assert!(err.is_precondition());
}

#[test]
fn overpaid_year_hands_carry_to_next_year() {
    let scenario = Scenario::new();
    for term in TermName::canonical() {
        scenario.charge(term, dec!(10000));
    }
    scenario.pay(TermName::Term1, dec!(10000), at(2024, 1, 10));
    scenario.pay(TermName::Term2, dec!(10000), at(2024, 5, 10));
    scenario.pay(TermName::Term3, dec!(10500), at(2024, 9, 10));

    let computed = scenario.statement();
    assert_eq!(
        computed.year_end_carry_forward,
        Some(AcademicYearCarryForward {
            student_id: scenario.student_id,
            next_academic_year: 2025,
            amount: dec!(-500),
        })
    );
    assert!(scenario
        .store
        .yearly_balance(scenario.student_id, 2025)
        .expect("lookup")
        .is_none());

    let generated = StatementService::generate(&scenario.store, &scenario.request())
        .expect("statement generates");
    assert_eq!(generated, computed);
    StatementService::generate(&scenario.store, &scenario.request())
        .expect("second generation");

    let book = scenario.store.balance_book().expect("balances");
    assert_eq!(book.balances.len(), 1);
    assert_eq!(
        book.get(scenario.student_id, 2025)
            .map(|entry| entry.carry_forward_amount),
        Some(dec!(-500))
    );
}

#[test]
fn closed_year_seeds_the_following_year() {
    let scenario = worked_example();
    let closed = StatementService::close_academic_year(&scenario.store, &scenario.request())
        .expect("year closes");
    assert_eq!(closed.academic_year_outstanding, dec!(13000));

    for term in TermName::canonical() {
        scenario.charge_in(scenario.next_year_id, term, dec!(11000));
    }
    scenario.pay_in(scenario.next_year_id, TermName::Term1, dec!(20000), at(2025, 1, 20));

    let request = scenario
        .request()
        .for_year(YearSelector::Name("2025".into()));
    let next = StatementService::compute(&scenario.store, &request).expect("next year computes");
    assert_statement_invariants(&next);
    let term1 = next.term(&TermName::Term1).expect("term 1");
    assert_eq!(term1.carry_forward, dec!(13000));
    assert_eq!(term1.balance, dec!(4000));
    assert_eq!(next.academic_year, 2025);
}

#[test]
fn closing_consecutive_years_keeps_seeded_debt() {
    let scenario = worked_example();
    StatementService::close_academic_year(&scenario.store, &scenario.request())
        .expect("2024 closes");

    for term in TermName::canonical() {
        scenario.charge_in(scenario.next_year_id, term, dec!(11000));
    }
    for (term, month) in [(TermName::Term1, 1), (TermName::Term2, 5), (TermName::Term3, 9)] {
        scenario.pay_in(scenario.next_year_id, term, dec!(11000), at(2025, month, 20));
    }

    let request = scenario
        .request()
        .for_year(YearSelector::Name("2025".into()));
    let closed =
        StatementService::close_academic_year(&scenario.store, &request).expect("2025 closes");
    assert_eq!(closed.academic_year_outstanding, Decimal::ZERO);
    assert_eq!(closed.year_end_balance(), dec!(13000));

    let recorded = scenario
        .store
        .yearly_balance(scenario.student_id, 2025)
        .expect("lookup")
        .and_then(|entry| entry.closing_balance);
    assert_eq!(recorded, Some(dec!(13000)));
    assert_eq!(
        BalanceService::carry_forward_seed(&scenario.store, scenario.student_id, 2026),
        dec!(13000)
    );
}

#[test]
fn undated_terms_give_identical_statements_on_any_clock() {
    let scenario = Scenario::new();
    let mut undated_year = None;
    scenario
        .store
        .update_dataset(scenario.school_id, |dataset| {
            let year = AcademicYear::new(dataset.school_id(), 2026);
            undated_year = Some(dataset.calendar.add_standard_year(year));
        })
        .expect("year added");
    let year_id = undated_year.expect("year id");
    scenario.pay_in(year_id, TermName::Term1, dec!(20000), at(2026, 2, 3));

    let request = scenario
        .request()
        .for_year(YearSelector::Name("2026".into()));
    let first = StatementService::compute(&scenario.store, &request).expect("first");
    let dataset = scenario
        .store
        .dataset(scenario.school_id)
        .expect("read")
        .expect("dataset");
    let wall_clock_store = InMemoryStore::with_clock(Arc::new(SystemClock)).with_dataset(dataset);
    let second = StatementService::compute(&wall_clock_store, &request).expect("second");
    assert_eq!(first, second);

    let opening = at(2026, 1, 1) - chrono::Duration::hours(10);
    assert!(first
        .fee_structures
        .iter()
        .all(|structure| structure.invoiced_at() == opening));
    let kinds: Vec<EntryKind> = first.transactions.iter().map(|entry| entry.kind).collect();
    assert_eq!(
        kinds,
        vec![EntryKind::Debit, EntryKind::Debit, EntryKind::Debit, EntryKind::Credit]
    );
    assert!(first
        .transactions
        .iter()
        .all(|entry| entry.running_balance >= Decimal::ZERO));
}

#[test]
fn all_years_scope_includes_other_year_payments() {
    let scenario = worked_example();
    scenario.pay_in(scenario.next_year_id, TermName::Term1, dec!(1000), at(2025, 1, 20));

    let narrow = scenario.statement();
    assert_eq!(narrow.payment_history.len(), 2);

    let request = scenario.request().with_scope(PaymentScope::AllYears);
    let wide = StatementService::compute(&scenario.store, &request)
        .expect("statement computes");
    assert_eq!(wide.payment_history.len(), 3);
    assert_eq!(wide.academic_year_outstanding, dec!(12000));
    assert_eq!(wide.term_balances, narrow.term_balances);
}

/// Reads from an in-memory store but rejects every write.
struct ReadOnlyStore(InMemoryStore);

impl SchoolDirectory for ReadOnlyStore {
    fn schools(&self) -> Result<Vec<School>, CoreError> {
        self.0.schools()
    }

    fn school(&self, school_id: Uuid) -> Result<Option<School>, CoreError> {
        self.0.school(school_id)
    }

    fn students(&self, school_id: Uuid) -> Result<Vec<Student>, CoreError> {
        self.0.students(school_id)
    }

    fn student(&self, school_id: Uuid, student_id: Uuid) -> Result<Option<Student>, CoreError> {
        self.0.student(school_id, student_id)
    }

    fn calendar(&self, school_id: Uuid) -> Result<SchoolCalendar, CoreError> {
        self.0.calendar(school_id)
    }
}

impl FeeStructureSource for ReadOnlyStore {
    fn fee_structures(
        &self,
        school_id: Uuid,
        grade_id: Uuid,
        academic_year_id: Option<Uuid>,
    ) -> Result<Vec<FeeStructureRecord>, CoreError> {
        self.0.fee_structures(school_id, grade_id, academic_year_id)
    }
}

impl PaymentSource for ReadOnlyStore {
    fn payments_for_student(
        &self,
        school_id: Uuid,
        student_id: Uuid,
    ) -> Result<Vec<Payment>, CoreError> {
        self.0.payments_for_student(school_id, student_id)
    }
}

impl ArrearSource for ReadOnlyStore {
    fn arrears_for_student(
        &self,
        _school_id: Uuid,
        _student_id: Uuid,
    ) -> Result<Vec<Arrear>, CoreError> {
        Err(CoreError::UpstreamLookup("arrears unavailable".into()))
    }
}

impl BalanceStore for ReadOnlyStore {
    fn yearly_balance(
        &self,
        _student_id: Uuid,
        _academic_year: i32,
    ) -> Result<Option<StudentYearlyBalance>, CoreError> {
        Err(CoreError::UpstreamLookup("balances unavailable".into()))
    }

    fn upsert_carry_forward(&self, _carry: &AcademicYearCarryForward) -> Result<(), CoreError> {
        Err(CoreError::PersistenceWrite("read-only store".into()))
    }

    fn upsert_closing_balance(
        &self,
        _student_id: Uuid,
        _academic_year: i32,
        _amount: Decimal,
    ) -> Result<(), CoreError> {
        Err(CoreError::PersistenceWrite("read-only store".into()))
    }
}

#[test]
fn failing_sink_and_lookups_do_not_change_the_statement() {
    let scenario = Scenario::new();
    for term in TermName::canonical() {
        scenario.charge(term, dec!(1000));
    }
    scenario.pay(TermName::Term3, dec!(4000), at(2024, 9, 5));
    let expected = scenario.statement();
    assert!(expected.year_end_carry_forward.is_some());

    let request = scenario.request();
    let broken = ReadOnlyStore(scenario.store);
    let statement =
        StatementService::generate(&broken, &request).expect("statement still returned");
    assert_eq!(statement, expected);
    assert!(!StatementService::persist_year_end(&broken, &statement));

    let err = StatementService::close_academic_year(&broken, &request)
        .expect_err("closing requires a writable store");
    assert!(matches!(err, CoreError::PersistenceWrite(_)));
}
