//! Fee structures: persisted per-term invoices and synthesized placeholders.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    calendar::{Period, TermName},
    common::{Amounted, Identifiable},
};

/// Named sub-amounts of a fee (tuition, books, lunch, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FeeBreakdown(BTreeMap<String, Decimal>);

impl FeeBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, item: impl Into<String>, amount: Decimal) -> Self {
        self.insert(item, amount);
        self
    }

    pub fn insert(&mut self, item: impl Into<String>, amount: Decimal) {
        self.0.insert(item.into(), amount);
    }

    pub fn get(&self, item: &str) -> Option<Decimal> {
        self.0.get(item).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> + '_ {
        self.0.iter().map(|(item, amount)| (item.as_str(), *amount))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }
}

impl FromIterator<(String, Decimal)> for FeeBreakdown {
    fn from_iter<T: IntoIterator<Item = (String, Decimal)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn default_active() -> bool {
    true
}

/// A fee structure as stored by the school: one total charge for a
/// (grade, academic year, term).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructureRecord {
    pub id: Uuid,
    pub school_id: Uuid,
    pub grade_id: Uuid,
    #[serde(default)]
    pub academic_year_id: Option<Uuid>,
    #[serde(default)]
    pub term_id: Option<Uuid>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub breakdown: FeeBreakdown,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl FeeStructureRecord {
    pub fn new(
        school_id: Uuid,
        grade_id: Uuid,
        academic_year_id: Uuid,
        term_id: Uuid,
        total_amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            school_id,
            grade_id,
            academic_year_id: Some(academic_year_id),
            term_id: Some(term_id),
            total_amount,
            breakdown: FeeBreakdown::new(),
            is_active: true,
            created_at,
        }
    }

    pub fn with_breakdown(mut self, breakdown: FeeBreakdown) -> Self {
        self.breakdown = breakdown;
        self
    }
}

impl Identifiable for FeeStructureRecord {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Amounted for FeeStructureRecord {
    fn amount(&self) -> Decimal {
        self.total_amount
    }
}

/// The default-fee tier a grade name falls into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", tag = "tier", content = "level")]
pub enum GradeTier {
    Level(u8),
    PrePrimary1,
    PrePrimary2,
    Kindergarten,
    Nursery,
    General,
}

impl fmt::Display for GradeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeTier::Level(level) => write!(f, "Level {}", level),
            GradeTier::PrePrimary1 => f.write_str("Pre-Primary 1"),
            GradeTier::PrePrimary2 => f.write_str("Pre-Primary 2"),
            GradeTier::Kindergarten => f.write_str("Kindergarten"),
            GradeTier::Nursery => f.write_str("Nursery"),
            GradeTier::General => f.write_str("General"),
        }
    }
}

/// A persisted fee structure resolved against the school calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritativeFee {
    pub record_id: Uuid,
    pub period: Period,
    pub total_amount: Decimal,
    pub breakdown: FeeBreakdown,
    pub invoiced_at: DateTime<Utc>,
}

/// A placeholder fee built from the default table. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedFee {
    pub period: Period,
    pub tier: GradeTier,
    pub breakdown: FeeBreakdown,
    pub invoiced_at: DateTime<Utc>,
}

/// The effective charge for one term: real billing data or a default placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum FeeStructure {
    Authoritative(AuthoritativeFee),
    Synthesized(SynthesizedFee),
}

impl FeeStructure {
    pub fn period(&self) -> &Period {
        match self {
            FeeStructure::Authoritative(fee) => &fee.period,
            FeeStructure::Synthesized(fee) => &fee.period,
        }
    }

    pub fn term(&self) -> &TermName {
        &self.period().term
    }

    pub fn total_amount(&self) -> Decimal {
        match self {
            FeeStructure::Authoritative(fee) => fee.total_amount,
            FeeStructure::Synthesized(fee) => fee.breakdown.total(),
        }
    }

    pub fn breakdown(&self) -> &FeeBreakdown {
        match self {
            FeeStructure::Authoritative(fee) => &fee.breakdown,
            FeeStructure::Synthesized(fee) => &fee.breakdown,
        }
    }

    pub fn invoiced_at(&self) -> DateTime<Utc> {
        match self {
            FeeStructure::Authoritative(fee) => fee.invoiced_at,
            FeeStructure::Synthesized(fee) => fee.invoiced_at,
        }
    }

    pub fn record_id(&self) -> Option<Uuid> {
        match self {
            FeeStructure::Authoritative(fee) => Some(fee.record_id),
            FeeStructure::Synthesized(_) => None,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        matches!(self, FeeStructure::Authoritative(_))
    }

    pub fn source(&self) -> FeeSource {
        match self {
            FeeStructure::Authoritative(_) => FeeSource::Authoritative,
            FeeStructure::Synthesized(_) => FeeSource::Synthesized,
        }
    }
}

impl Amounted for FeeStructure {
    fn amount(&self) -> Decimal {
        self.total_amount()
    }
}

/// Where a term's charge came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FeeSource {
    Authoritative,
    Synthesized,
}
