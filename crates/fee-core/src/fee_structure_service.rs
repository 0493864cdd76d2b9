use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fee_domain::{
    AcademicYear, AuthoritativeFee, FeeStructure, FeeStructureRecord, Period, SchoolCalendar,
    Student, SynthesizedFee, TermName, YearSelector,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{default_fee_table::DefaultFeeTable, storage::FeeStructureSource, CoreError};

/// The target academic year and its effective per-term charges, in term order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFees {
    pub academic_year: AcademicYear,
    pub structures: Vec<FeeStructure>,
}

impl ResolvedFees {
    pub fn synthesized_count(&self) -> usize {
        self.structures
            .iter()
            .filter(|structure| !structure.is_authoritative())
            .count()
    }
}

pub struct FeeStructureService;

impl FeeStructureService {
    /// Resolves one effective fee structure per term of the selected academic year.
    ///
    /// Persisted records win; the first active record seen for a term is kept
    /// and later duplicates are ignored. Terms with no usable record get a
    /// [`FeeStructure::Synthesized`] entry from the default table, invoiced at the
    /// term's start date, or at 1 January of the academic year when the term has none.
    pub fn resolve(
        source: &dyn FeeStructureSource,
        calendar: &SchoolCalendar,
        school_id: Uuid,
        student: &Student,
        year: &YearSelector,
    ) -> Result<ResolvedFees, CoreError> {
        let grade = student
            .grade
            .as_ref()
            .ok_or(CoreError::MissingGradeAssignment(student.id))?;
        let academic_year = calendar
            .select(year)
            .cloned()
            .ok_or_else(|| CoreError::AcademicYearNotFound(year.to_string()))?;

        let records = source.fee_structures(school_id, grade.grade_id, Some(academic_year.id))?;
        let mut structures = Self::authoritative(records, calendar, &academic_year);

        for period in Self::billing_periods(calendar, &academic_year) {
            if structures
                .iter()
                .any(|structure| structure.period().same_term(&period))
            {
                continue;
            }
            let fallback = DefaultFeeTable::for_grade(&grade.grade_name);
            info!(
                "no fee structure for grade `{}` in {}; using {} defaults",
                grade.grade_name, period, fallback.tier
            );
            let invoiced_at = calendar
                .terms_for(academic_year.id)
                .into_iter()
                .find(|term| term.name == period.term)
                .and_then(|term| term.start_date)
                .and_then(start_of_day)
                .unwrap_or_else(|| year_opening(academic_year.year));
            structures.push(FeeStructure::Synthesized(SynthesizedFee {
                period,
                tier: fallback.tier,
                breakdown: fallback.breakdown,
                invoiced_at,
            }));
        }

        structures.sort_by(|a, b| a.term().cmp(b.term()));
        Ok(ResolvedFees {
            academic_year,
            structures,
        })
    }

    fn authoritative(
        records: Vec<FeeStructureRecord>,
        calendar: &SchoolCalendar,
        academic_year: &AcademicYear,
    ) -> Vec<FeeStructure> {
        let mut structures: Vec<FeeStructure> = Vec::new();
        for record in records {
            if !record.is_active {
                continue;
            }
            if record.term_id.is_none() || record.academic_year_id.is_none() {
                debug!("skipping fee structure {} without term or academic year", record.id);
                continue;
            }
            let Some(period) = calendar.resolve(record.academic_year_id, record.term_id) else {
                warn!(
                    "fee structure {} points at a term missing from the calendar",
                    record.id
                );
                continue;
            };
            if period.academic_year_id != academic_year.id {
                continue;
            }
            if let Some(kept) = structures
                .iter()
                .find(|structure| structure.period().same_term(&period))
            {
                warn!(
                    "duplicate fee structure {} for {}; keeping {}",
                    record.id,
                    period,
                    kept.record_id().map(|id| id.to_string()).unwrap_or_default()
                );
                continue;
            }
            structures.push(FeeStructure::Authoritative(AuthoritativeFee {
                record_id: record.id,
                period,
                total_amount: record.total_amount,
                breakdown: record.breakdown,
                invoiced_at: record.created_at,
            }));
        }
        structures
    }

    /// The terms a year is billed for: the calendar's own, or the canonical three.
    pub fn billing_periods(calendar: &SchoolCalendar, academic_year: &AcademicYear) -> Vec<Period> {
        let terms = calendar.terms_for(academic_year.id);
        if terms.is_empty() {
            return TermName::canonical()
                .into_iter()
                .map(|name| Period::unlisted(academic_year, name))
                .collect();
        }
        terms
            .into_iter()
            .map(|term| Period::new(academic_year, term))
            .collect()
    }
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|moment| moment.and_utc())
}

fn year_opening(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}
