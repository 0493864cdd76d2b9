//! Derived ledger views: transactions, term balances, carry-forward records,
//! and the fee statement returned to callers.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    calendar::{Period, TermName},
    common::Amounted,
    fee::{FeeSource, FeeStructure},
    payment::Payment,
    school::StudentSummary,
};

/// Side of a ledger entry. Debits are charges, credits are payments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    Debit,
    Credit,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryKind::Debit => "Debit",
            EntryKind::Credit => "Credit",
        };
        f.write_str(label)
    }
}

/// One line of a student's ledger. Derived on every request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    pub source_id: Option<Uuid>,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub period: Option<Period>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Cumulative debits minus cumulative credits up to and including this entry.
    pub running_balance: Decimal,
}

impl LedgerTransaction {
    pub fn debit(&self) -> Decimal {
        match self.kind {
            EntryKind::Debit => self.amount,
            EntryKind::Credit => Decimal::ZERO,
        }
    }

    pub fn credit(&self) -> Decimal {
        match self.kind {
            EntryKind::Debit => Decimal::ZERO,
            EntryKind::Credit => self.amount,
        }
    }

    /// Debits count positive, credits negative.
    pub fn signed_amount(&self) -> Decimal {
        self.debit() - self.credit()
    }

    pub fn is_tagged_to(&self, period: &Period) -> bool {
        self.period
            .as_ref()
            .map(|own| own.same_term(period))
            .unwrap_or(false)
    }
}

impl Amounted for LedgerTransaction {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Per-term charges, payments, and carry-forward state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TermBalance {
    pub term: TermName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_id: Option<Uuid>,
    pub academic_year: i32,
    /// Charges tagged to the term.
    pub total_amount: Decimal,
    /// Payments tagged to the term, excluding absorbed overpayments.
    pub payments: Decimal,
    pub base_balance: Decimal,
    /// Carry consumed by this term (positive owed, negative prior overpayment).
    pub carry_forward: Decimal,
    /// Reported balance, never negative.
    pub balance: Decimal,
    /// Overpayment handed to the next term, zero or negative.
    pub carry_to_next: Decimal,
    /// Payments plus any absorbed prior overpayment.
    pub paid_amount: Decimal,
    pub fee_source: FeeSource,
}

impl TermBalance {
    /// `base_balance + carry_forward` before clamping.
    pub fn unclamped_balance(&self) -> Decimal {
        self.base_balance + self.carry_forward
    }
}

/// Signed carry handed from the last term of one academic year to the next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYearCarryForward {
    pub student_id: Uuid,
    pub next_academic_year: i32,
    pub amount: Decimal,
}

/// Persisted per-student, per-year balance record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentYearlyBalance {
    pub student_id: Uuid,
    pub academic_year: i32,
    /// Outstanding amount when the year was closed, if it has been closed.
    #[serde(default)]
    pub closing_balance: Option<Decimal>,
    /// Carry handed into this year by the previous year's computation.
    #[serde(default)]
    pub carry_forward_amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl StudentYearlyBalance {
    pub fn new(student_id: Uuid, academic_year: i32, at: DateTime<Utc>) -> Self {
        Self {
            student_id,
            academic_year,
            closing_balance: None,
            carry_forward_amount: Decimal::ZERO,
            updated_at: at,
        }
    }
}

/// Collection of yearly balances with upsert semantics keyed by (student, year).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceBook {
    #[serde(default)]
    pub balances: Vec<StudentYearlyBalance>,
}

impl BalanceBook {
    pub fn get(&self, student_id: Uuid, academic_year: i32) -> Option<&StudentYearlyBalance> {
        self.balances
            .iter()
            .find(|entry| entry.student_id == student_id && entry.academic_year == academic_year)
    }

    fn entry_mut(
        &mut self,
        student_id: Uuid,
        academic_year: i32,
        at: DateTime<Utc>,
    ) -> &mut StudentYearlyBalance {
        let position = self.balances.iter().position(|entry| {
            entry.student_id == student_id && entry.academic_year == academic_year
        });
        let index = match position {
            Some(index) => index,
            None => {
                self.balances
                    .push(StudentYearlyBalance::new(student_id, academic_year, at));
                self.balances.len() - 1
            }
        };
        &mut self.balances[index]
    }

    /// Records the carry into `next_academic_year`. Repeating a write is a no-op.
    pub fn upsert_carry_forward(&mut self, carry: &AcademicYearCarryForward, at: DateTime<Utc>) {
        let entry = self.entry_mut(carry.student_id, carry.next_academic_year, at);
        if entry.carry_forward_amount != carry.amount {
            entry.carry_forward_amount = carry.amount;
            entry.updated_at = at;
        }
    }

    /// Records the closing balance of `academic_year`. Repeating a write is a no-op.
    pub fn upsert_closing_balance(
        &mut self,
        student_id: Uuid,
        academic_year: i32,
        amount: Decimal,
        at: DateTime<Utc>,
    ) {
        let entry = self.entry_mut(student_id, academic_year, at);
        if entry.closing_balance != Some(amount) {
            entry.closing_balance = Some(amount);
            entry.updated_at = at;
        }
    }
}

/// Which payments feed a statement's transaction list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentScope {
    #[default]
    AcademicYear,
    AllYears,
}

impl PaymentScope {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "academic_year" | "year" => Some(PaymentScope::AcademicYear),
            "all_years" | "all" => Some(PaymentScope::AllYears),
            _ => None,
        }
    }
}

/// Complete balance view for one student and one academic year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeeStatement {
    pub school_id: Uuid,
    pub student: StudentSummary,
    pub academic_year: i32,
    pub academic_year_id: Uuid,
    pub term_balances: Vec<TermBalance>,
    pub transactions: Vec<LedgerTransaction>,
    /// Final running balance of the transaction list.
    pub academic_year_outstanding: Decimal,
    pub arrears: Decimal,
    /// `academic_year_outstanding + arrears`.
    pub outstanding: Decimal,
    pub payment_history: Vec<Payment>,
    pub fee_structures: Vec<FeeStructure>,
    /// Carry the caller may persist for the next academic year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_end_carry_forward: Option<AcademicYearCarryForward>,
}

impl FeeStatement {
    pub fn term(&self, term: &TermName) -> Option<&TermBalance> {
        self.term_balances.iter().find(|entry| &entry.term == term)
    }

    pub fn total_charges(&self) -> Decimal {
        self.transactions.iter().map(LedgerTransaction::debit).sum()
    }

    pub fn total_payments(&self) -> Decimal {
        self.transactions.iter().map(LedgerTransaction::credit).sum()
    }

    /// What the student still owes after the last term, opening seed included.
    ///
    /// Sum of the clamped term balances plus the overpayment left by the last term.
    pub fn year_end_balance(&self) -> Decimal {
        let owed: Decimal = self.term_balances.iter().map(|term| term.balance).sum();
        let leftover = self
            .term_balances
            .last()
            .map(|term| term.carry_to_next)
            .unwrap_or(Decimal::ZERO);
        owed + leftover
    }

    pub fn uses_default_fees(&self) -> bool {
        self.fee_structures
            .iter()
            .any(|structure| !structure.is_authoritative())
    }
}
