use fee_domain::{FeeStatement, PaymentScope, YearSelector};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    arrears_service::ArrearsService,
    balance_service::BalanceService,
    fee_structure_service::FeeStructureService,
    storage::{BalanceStore, FeeDataStore},
    transaction_service::TransactionService,
    CoreError,
};

/// Identifies the statement a caller wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRequest {
    pub school_id: Uuid,
    pub student_id: Uuid,
    pub year: YearSelector,
    pub payment_scope: PaymentScope,
}

impl StatementRequest {
    /// A request for the current academic year.
    pub fn new(school_id: Uuid, student_id: Uuid) -> Self {
        Self {
            school_id,
            student_id,
            year: YearSelector::Current,
            payment_scope: PaymentScope::default(),
        }
    }

    pub fn for_year(mut self, year: YearSelector) -> Self {
        self.year = year;
        self
    }

    pub fn with_scope(mut self, scope: PaymentScope) -> Self {
        self.payment_scope = scope;
        self
    }
}

pub struct StatementService;

impl StatementService {
    /// Computes a statement without writing anything.
    ///
    /// Missing schools, students, grades and academic years fail the call, as do
    /// errors from the fee-structure and payment sources. Arrears and the
    /// prior-year seed degrade to zero.
    pub fn compute<S: FeeDataStore>(
        store: &S,
        request: &StatementRequest,
    ) -> Result<FeeStatement, CoreError> {
        let school = store
            .school(request.school_id)?
            .ok_or(CoreError::SchoolNotFound(request.school_id))?;
        let student = store
            .student(school.id, request.student_id)?
            .ok_or(CoreError::StudentNotFound(request.student_id))?;
        let calendar = store.calendar(school.id)?;

        let resolved =
            FeeStructureService::resolve(store, &calendar, school.id, &student, &request.year)?;
        let academic_year = resolved.academic_year;

        let payments = store.payments_for_student(school.id, student.id)?;
        let mut eligible = TransactionService::eligible_payments(
            &payments,
            &student,
            &calendar,
            &academic_year,
            request.payment_scope,
        );
        let transactions =
            TransactionService::assemble(&resolved.structures, &eligible, &calendar);

        let seed = BalanceService::carry_forward_seed(store, student.id, academic_year.year);
        let ledger = BalanceService::term_balances(&resolved.structures, &transactions, seed);
        let year_end_carry_forward =
            BalanceService::year_end_carry_forward(&ledger, student.id, academic_year.year);

        let academic_year_outstanding =
            TransactionService::academic_year_outstanding(&transactions);
        let arrears = ArrearsService::load_total(store, &student);
        eligible.sort_by_key(|payment| payment.payment_date);

        debug!(
            "statement for {} in {}: {} term(s), {} transaction(s), outstanding {}",
            student.admission_number,
            academic_year.year,
            ledger.balances.len(),
            transactions.len(),
            academic_year_outstanding + arrears
        );

        Ok(FeeStatement {
            school_id: school.id,
            student: student.summary(),
            academic_year: academic_year.year,
            academic_year_id: academic_year.id,
            term_balances: ledger.balances,
            transactions,
            academic_year_outstanding,
            arrears,
            outstanding: academic_year_outstanding + arrears,
            payment_history: eligible,
            fee_structures: resolved.structures,
            year_end_carry_forward,
        })
    }

    /// Writes the statement's pending year-end carry, if any.
    ///
    /// Returns false when the write failed. The failure is logged and the
    /// statement itself is left untouched.
    pub fn persist_year_end(store: &dyn BalanceStore, statement: &FeeStatement) -> bool {
        let Some(carry) = statement.year_end_carry_forward.as_ref() else {
            return true;
        };
        match store.upsert_carry_forward(carry) {
            Ok(()) => {
                info!(
                    "carried {} into {} for student {}",
                    carry.amount, carry.next_academic_year, carry.student_id
                );
                true
            }
            Err(err) => {
                warn!(
                    "could not record year-end carry for student {}: {}",
                    carry.student_id, err
                );
                false
            }
        }
    }

    /// Computes a statement and then records its year-end carry.
    pub fn generate<S: FeeDataStore>(
        store: &S,
        request: &StatementRequest,
    ) -> Result<FeeStatement, CoreError> {
        let statement = Self::compute(store, request)?;
        Self::persist_year_end(store, &statement);
        Ok(statement)
    }

    /// Records the year-end balance as the year's closing balance, which seeds
    /// the following year's first term. Also writes the year-end carry.
    ///
    /// The closing balance is [`FeeStatement::year_end_balance`], opening seed included.
    pub fn close_academic_year<S: FeeDataStore>(
        store: &S,
        request: &StatementRequest,
    ) -> Result<FeeStatement, CoreError> {
        let statement = Self::compute(store, request)?;
        let closing = statement.year_end_balance();
        store.upsert_closing_balance(statement.student.id, statement.academic_year, closing)?;
        info!(
            "closed {} for student {} at {}",
            statement.academic_year, statement.student.admission_number, closing
        );
        Self::persist_year_end(store, &statement);
        Ok(statement)
    }
}
