//! Fixed fallback fees used when a grade has no billing data for a term.

use fee_domain::{FeeBreakdown, GradeTier};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

static GRADE_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:grade|class|form|standard|std\.?|year)?\s*(\d{1,2})")
        .unwrap_or_else(|err| panic!("grade level pattern is invalid: {err}"))
});

/// Highest numeric level with its own row in the table.
pub const TOP_PRIMARY_LEVEL: u8 = 8;

/// One row of the default table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeeRow {
    tuition: Decimal,
    books: Decimal,
    uniform: Decimal,
    activities: Decimal,
    development: Decimal,
    lunch: Decimal,
    exam: Option<Decimal>,
}

impl FeeRow {
    const fn new(
        tuition: Decimal,
        books: Decimal,
        uniform: Decimal,
        activities: Decimal,
        development: Decimal,
        lunch: Decimal,
    ) -> Self {
        Self {
            tuition,
            books,
            uniform,
            activities,
            development,
            lunch,
            exam: None,
        }
    }

    const fn with_exam(self, exam: Decimal) -> Self {
        Self {
            exam: Some(exam),
            ..self
        }
    }

    fn breakdown(&self) -> FeeBreakdown {
        let breakdown = FeeBreakdown::new()
            .with("tuition", self.tuition)
            .with("books", self.books)
            .with("uniform", self.uniform)
            .with("activities", self.activities)
            .with("development", self.development)
            .with("lunch", self.lunch);
        match self.exam {
            Some(exam) => breakdown.with("exam", exam),
            None => breakdown,
        }
    }
}

const LEVELS: [FeeRow; TOP_PRIMARY_LEVEL as usize] = [
    FeeRow::new(dec!(9000), dec!(1500), dec!(2500), dec!(1000), dec!(1500), dec!(4500)),
    FeeRow::new(dec!(9500), dec!(1600), dec!(2500), dec!(1000), dec!(1500), dec!(4500)),
    FeeRow::new(dec!(10000), dec!(1800), dec!(2500), dec!(1200), dec!(1500), dec!(4500)),
    FeeRow::new(dec!(11000), dec!(2000), dec!(2800), dec!(1200), dec!(2000), dec!(5000)),
    FeeRow::new(dec!(12000), dec!(2200), dec!(2800), dec!(1500), dec!(2000), dec!(5000)),
    FeeRow::new(dec!(13000), dec!(2400), dec!(3000), dec!(1500), dec!(2000), dec!(5000)),
    FeeRow::new(dec!(14000), dec!(2600), dec!(3000), dec!(1800), dec!(2500), dec!(5500)),
    FeeRow::new(dec!(15000), dec!(2800), dec!(3000), dec!(1800), dec!(2500), dec!(5500))
        .with_exam(dec!(3000)),
];

const PRE_PRIMARY_1: FeeRow =
    FeeRow::new(dec!(7000), dec!(1000), dec!(2000), dec!(800), dec!(1000), dec!(4000));
const PRE_PRIMARY_2: FeeRow =
    FeeRow::new(dec!(7500), dec!(1200), dec!(2000), dec!(800), dec!(1000), dec!(4000));
const KINDERGARTEN: FeeRow =
    FeeRow::new(dec!(6500), dec!(900), dec!(1800), dec!(700), dec!(1000), dec!(3500));
const NURSERY: FeeRow =
    FeeRow::new(dec!(6000), dec!(800), dec!(1800), dec!(600), dec!(1000), dec!(3500));
const GENERAL: FeeRow =
    FeeRow::new(dec!(10000), dec!(2000), dec!(2500), dec!(1500), dec!(2000), dec!(5000));

/// Tier, breakdown, and total the table yields for a grade name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultFee {
    pub tier: GradeTier,
    pub breakdown: FeeBreakdown,
}

impl DefaultFee {
    pub fn total_amount(&self) -> Decimal {
        self.breakdown.total()
    }
}

pub struct DefaultFeeTable;

impl DefaultFeeTable {
    /// Classifies a free-form grade name.
    ///
    /// A leading numeric level wins (`"Grade 3A"`, `"Form 1"`, `"7"`). Levels
    /// outside the table fall through to the early-years names, then to
    /// [`GradeTier::General`].
    pub fn tier_for(grade_name: &str) -> GradeTier {
        if let Some(level) = Self::numeric_level(grade_name) {
            if (1..=TOP_PRIMARY_LEVEL).contains(&level) {
                return GradeTier::Level(level);
            }
        }

        let compact: String = grade_name
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if compact.contains("pp1") || compact.contains("preprimary1") {
            GradeTier::PrePrimary1
        } else if compact.contains("pp2") || compact.contains("preprimary2") {
            GradeTier::PrePrimary2
        } else if compact.contains("kindergarten") || compact.contains("kg") {
            GradeTier::Kindergarten
        } else if compact.contains("nursery") {
            GradeTier::Nursery
        } else {
            GradeTier::General
        }
    }

    pub fn for_tier(tier: GradeTier) -> DefaultFee {
        let row = match tier {
            GradeTier::Level(level) if (1..=TOP_PRIMARY_LEVEL).contains(&level) => {
                LEVELS[usize::from(level - 1)]
            }
            GradeTier::Level(_) | GradeTier::General => GENERAL,
            GradeTier::PrePrimary1 => PRE_PRIMARY_1,
            GradeTier::PrePrimary2 => PRE_PRIMARY_2,
            GradeTier::Kindergarten => KINDERGARTEN,
            GradeTier::Nursery => NURSERY,
        };
        DefaultFee {
            tier,
            breakdown: row.breakdown(),
        }
    }

    pub fn for_grade(grade_name: &str) -> DefaultFee {
        Self::for_tier(Self::tier_for(grade_name))
    }

    fn numeric_level(grade_name: &str) -> Option<u8> {
        GRADE_LEVEL
            .captures(grade_name)
            .and_then(|captures| captures.get(1))
            .and_then(|digits| digits.as_str().parse::<u8>().ok())
    }
}
