use fee_domain::{Arrear, Student};
use rust_decimal::Decimal;
use tracing::warn;

use crate::storage::ArrearSource;

pub struct ArrearsService;

impl ArrearsService {
    /// Arrears recorded for the student's join year or later; all of them when no
    /// join year is known.
    pub fn applicable<'a>(
        arrears: &'a [Arrear],
        join_year: Option<i32>,
    ) -> impl Iterator<Item = &'a Arrear> + 'a {
        arrears.iter().filter(move |arrear| match join_year {
            Some(year) => arrear.academic_year >= year,
            None => true,
        })
    }

    /// Signed sum of the applicable arrears. Negative entries are credits.
    pub fn total(arrears: &[Arrear], join_year: Option<i32>) -> Decimal {
        Self::applicable(arrears, join_year)
            .map(|arrear| arrear.amount)
            .sum()
    }

    /// Loads and totals a student's arrears. A failed lookup counts as no arrears.
    pub fn load_total(source: &dyn ArrearSource, student: &Student) -> Decimal {
        match source.arrears_for_student(student.school_id, student.id) {
            Ok(arrears) => Self::total(&arrears, student.join_academic_year),
            Err(err) => {
                warn!("arrear lookup failed for student {}: {}", student.id, err);
                Decimal::ZERO
            }
        }
    }
}
