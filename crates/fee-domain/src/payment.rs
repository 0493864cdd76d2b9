//! Payments received from students and manually recorded arrears.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{Amounted, Displayable, Identifiable};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    MobileMoney,
    BankTransfer,
    Cheque,
    Other,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "mobile_money" | "mpesa" | "m_pesa" => Some(PaymentMethod::MobileMoney),
            "bank_transfer" | "bank" => Some(PaymentMethod::BankTransfer),
            "cheque" | "check" => Some(PaymentMethod::Cheque),
            "other" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::MobileMoney => "Mobile Money",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::Other => "Other",
        };
        f.write_str(label)
    }
}

/// A payment made by (or for) one student toward one term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub school_id: Uuid,
    pub student_id: Uuid,
    pub academic_year_id: Uuid,
    pub term_id: Uuid,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    #[serde(default)]
    pub method: PaymentMethod,
    pub receipt_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
}

impl Payment {
    pub fn new(
        school_id: Uuid,
        student_id: Uuid,
        academic_year_id: Uuid,
        term_id: Uuid,
        amount: Decimal,
        payment_date: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            school_id,
            student_id,
            academic_year_id,
            term_id,
            amount,
            payment_date,
            method: PaymentMethod::default(),
            receipt_number: format!("RCT-{}", &id.simple().to_string()[..8].to_uppercase()),
            reference_number: None,
        }
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference_number = Some(reference.into());
        self
    }
}

impl Identifiable for Payment {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Amounted for Payment {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

impl Displayable for Payment {
    fn display_label(&self) -> String {
        format!("{} [{}]", self.receipt_number, self.method)
    }
}

/// A manual arrear adjustment. Positive amounts are owed, negative amounts are credits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Arrear {
    pub id: Uuid,
    pub school_id: Uuid,
    pub student_id: Uuid,
    pub academic_year_id: Uuid,
    pub academic_year: i32,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Arrear {
    pub fn new(
        school_id: Uuid,
        student_id: Uuid,
        academic_year_id: Uuid,
        academic_year: i32,
        amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            school_id,
            student_id,
            academic_year_id,
            academic_year,
            amount,
            reason: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl Identifiable for Arrear {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Amounted for Arrear {
    fn amount(&self) -> Decimal {
        self.amount
    }
}
