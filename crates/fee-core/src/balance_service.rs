use fee_domain::{AcademicYearCarryForward, FeeStructure, LedgerTransaction, TermBalance};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::BalanceStore;

/// Outcome of applying one term's charges and payments to the incoming carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermStep {
    pub base_balance: Decimal,
    /// Carry consumed by the term.
    pub carry_forward: Decimal,
    pub balance: Decimal,
    pub carry_to_next: Decimal,
    pub paid_amount: Decimal,
}

impl TermStep {
    pub fn unclamped_balance(&self) -> Decimal {
        self.base_balance + self.carry_forward
    }
}

/// Term balances for one academic year and the carry left after the last term.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TermLedger {
    pub balances: Vec<TermBalance>,
    pub closing_carry: Decimal,
}

impl TermLedger {
    pub fn total_balance(&self) -> Decimal {
        self.balances.iter().map(|term| term.balance).sum()
    }
}

pub struct BalanceService;

impl BalanceService {
    /// Applies one term to the incoming carry.
    ///
    /// A positive carry is still owed, a negative one is a prior overpayment.
    /// The reported balance never drops below zero; any overpayment moves to
    /// `carry_to_next` instead.
    pub fn step(carry: Decimal, charges: Decimal, payments: Decimal) -> TermStep {
        let base_balance = charges - payments;
        let unclamped = base_balance + carry;
        let absorbed = if carry < Decimal::ZERO {
            carry.abs()
        } else {
            Decimal::ZERO
        };
        TermStep {
            base_balance,
            carry_forward: carry,
            balance: unclamped.max(Decimal::ZERO),
            carry_to_next: unclamped.min(Decimal::ZERO),
            paid_amount: payments + absorbed,
        }
    }

    /// Walks the fee structures in order, chaining each term's carry into the next.
    pub fn term_balances(
        structures: &[FeeStructure],
        transactions: &[LedgerTransaction],
        seed: Decimal,
    ) -> TermLedger {
        let (balances, _) = structures.iter().fold(
            (Vec::with_capacity(structures.len()), seed),
            |(mut balances, carry), structure| {
                let period = structure.period();
                let tagged = transactions
                    .iter()
                    .filter(|transaction| transaction.is_tagged_to(period));
                let (charges, payments) = tagged.fold(
                    (Decimal::ZERO, Decimal::ZERO),
                    |(charges, payments), transaction| {
                        (charges + transaction.debit(), payments + transaction.credit())
                    },
                );
                let step = Self::step(carry, charges, payments);
                balances.push(TermBalance {
                    term: period.term.clone(),
                    term_id: period.term_id,
                    academic_year: period.year,
                    total_amount: charges,
                    payments,
                    base_balance: step.base_balance,
                    carry_forward: step.carry_forward,
                    balance: step.balance,
                    carry_to_next: step.carry_to_next,
                    paid_amount: step.paid_amount,
                    fee_source: structure.source(),
                });
                (balances, step.carry_to_next)
            },
        );

        let closing_carry = balances
            .last()
            .map(|term: &TermBalance| term.carry_to_next)
            .unwrap_or(Decimal::ZERO);
        TermLedger {
            balances,
            closing_carry,
        }
    }

    /// Opening carry for `academic_year`: the previous year's closing balance when
    /// one is recorded and positive, otherwise zero. Lookup failures count as zero.
    pub fn carry_forward_seed(
        store: &dyn BalanceStore,
        student_id: Uuid,
        academic_year: i32,
    ) -> Decimal {
        let previous = academic_year - 1;
        match store.yearly_balance(student_id, previous) {
            Ok(Some(record)) => match record.closing_balance {
                Some(closing) if closing > Decimal::ZERO => {
                    debug!(
                        "seeding {} with {} closing balance {} for student {}",
                        academic_year, previous, closing, student_id
                    );
                    closing
                }
                _ => Decimal::ZERO,
            },
            Ok(None) => Decimal::ZERO,
            Err(err) => {
                warn!(
                    "prior-year balance lookup failed for student {}: {}",
                    student_id, err
                );
                Decimal::ZERO
            }
        }
    }

    /// The carry to hand to the next academic year, if the last term left one.
    pub fn year_end_carry_forward(
        ledger: &TermLedger,
        student_id: Uuid,
        academic_year: i32,
    ) -> Option<AcademicYearCarryForward> {
        (ledger.closing_carry != Decimal::ZERO).then(|| AcademicYearCarryForward {
            student_id,
            next_academic_year: academic_year + 1,
            amount: ledger.closing_carry,
        })
    }
}
