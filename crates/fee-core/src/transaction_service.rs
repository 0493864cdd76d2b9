use chrono::{DateTime, Utc};
use fee_domain::{
    AcademicYear, EntryKind, FeeStructure, LedgerTransaction, Payment, PaymentScope, Period,
    SchoolCalendar, Student,
};
use rust_decimal::Decimal;
use tracing::{debug, warn};

pub struct TransactionService;

impl TransactionService {
    /// Payments that feed the ledger: positive, inside `scope`, and not before the
    /// student's join point. Returned in recorded order.
    pub fn eligible_payments(
        payments: &[Payment],
        student: &Student,
        calendar: &SchoolCalendar,
        academic_year: &AcademicYear,
        scope: PaymentScope,
    ) -> Vec<Payment> {
        payments
            .iter()
            .filter(|payment| {
                if payment.amount <= Decimal::ZERO {
                    warn!(
                        "ignoring payment {} with non-positive amount {}",
                        payment.receipt_number, payment.amount
                    );
                    return false;
                }
                scope == PaymentScope::AllYears || payment.academic_year_id == academic_year.id
            })
            .filter(|payment| {
                let period = Self::payment_period(calendar, payment);
                let excluded = Self::is_before_join(student, period.as_ref(), payment.payment_date);
                if excluded {
                    debug!(
                        "payment {} predates the join point of student {}",
                        payment.receipt_number, student.id
                    );
                }
                !excluded
            })
            .cloned()
            .collect()
    }

    /// True when a payment falls before the student joined.
    ///
    /// A recorded join year and term is compared against the payment's period.
    /// Without one, the admission date is compared against the payment date,
    /// then a bare join year against the period's year. With none of these
    /// nothing is excluded.
    pub fn is_before_join(student: &Student, period: Option<&Period>, date: DateTime<Utc>) -> bool {
        if let (Some((year, term)), Some(period)) = (student.join_point(), period) {
            return period.precedes(year, term);
        }
        if let Some(admitted) = student.admission_date {
            return date.date_naive() < admitted;
        }
        match (student.join_academic_year, period) {
            (Some(year), Some(period)) => period.year < year,
            _ => false,
        }
    }

    /// Builds the ledger for one academic year.
    ///
    /// Each fee structure becomes a debit dated at its invoice time and each
    /// eligible payment a credit dated at its payment time. Entries are sorted
    /// by date with debits ahead of credits at the same instant; remaining ties
    /// keep construction order.
    pub fn assemble(
        structures: &[FeeStructure],
        payments: &[Payment],
        calendar: &SchoolCalendar,
    ) -> Vec<LedgerTransaction> {
        let debits = structures.iter().map(|structure| LedgerTransaction {
            source_id: structure.record_id(),
            kind: EntryKind::Debit,
            amount: structure.total_amount(),
            date: structure.invoiced_at(),
            period: Some(structure.period().clone()),
            description: if structure.is_authoritative() {
                format!("Fees for {}", structure.period())
            } else {
                format!("Default fees for {}", structure.period())
            },
            reference: None,
            running_balance: Decimal::ZERO,
        });

        let credits = payments.iter().map(|payment| {
            let period = Self::payment_period(calendar, payment);
            if period.is_none() {
                warn!(
                    "payment {} references a term missing from the calendar",
                    payment.receipt_number
                );
            }
            LedgerTransaction {
                source_id: Some(payment.id),
                kind: EntryKind::Credit,
                amount: payment.amount,
                date: payment.payment_date,
                period,
                description: format!("Payment {} ({})", payment.receipt_number, payment.method),
                reference: payment.reference_number.clone(),
                running_balance: Decimal::ZERO,
            }
        });

        let mut transactions: Vec<LedgerTransaction> = debits.chain(credits).collect();
        transactions.sort_by(|a, b| a.date.cmp(&b.date).then(a.kind.cmp(&b.kind)));

        let mut running = Decimal::ZERO;
        for transaction in transactions.iter_mut() {
            running += transaction.signed_amount();
            transaction.running_balance = running;
        }
        transactions
    }

    /// Final running balance of the ledger, zero when it is empty.
    pub fn academic_year_outstanding(transactions: &[LedgerTransaction]) -> Decimal {
        transactions
            .last()
            .map(|transaction| transaction.running_balance)
            .unwrap_or(Decimal::ZERO)
    }

    fn payment_period(calendar: &SchoolCalendar, payment: &Payment) -> Option<Period> {
        calendar.resolve(Some(payment.academic_year_id), Some(payment.term_id))
    }
}
