//! Academic calendar models: years, terms, and resolved billing periods.

use std::{cmp::Ordering, fmt};

use chrono::NaiveDate;
use serde::{de::Deserializer, ser::Serializer, Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{Identifiable, NamedEntity};

/// Identity of a school term.
///
/// Terms order by their canonical position. Labels that do not name one of the
/// three canonical terms are kept verbatim as [`TermName::Other`] and sort
/// before every canonical term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermName {
    Other(String),
    Term1,
    Term2,
    Term3,
}

impl TermName {
    /// Parses a term label. Matching ignores case and whitespace, so
    /// `"Term 1"`, `"term1"` and `" TERM 1 "` are all [`TermName::Term1`].
    pub fn parse(label: &str) -> Self {
        let compact: String = label
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match compact.as_str() {
            "term1" => TermName::Term1,
            "term2" => TermName::Term2,
            "term3" => TermName::Term3,
            _ => TermName::Other(label.trim().to_string()),
        }
    }

    /// The three canonical terms in billing order.
    pub fn canonical() -> [TermName; 3] {
        [TermName::Term1, TermName::Term2, TermName::Term3]
    }

    /// Sort key: 1..=3 for canonical terms, 0 for anything else.
    pub fn order_key(&self) -> u8 {
        match self {
            TermName::Other(_) => 0,
            TermName::Term1 => 1,
            TermName::Term2 => 2,
            TermName::Term3 => 3,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TermName::Other(label) => label.as_str(),
            TermName::Term1 => "Term 1",
            TermName::Term2 => "Term 2",
            TermName::Term3 => "Term 3",
        }
    }

    pub fn is_canonical(&self) -> bool {
        !matches!(self, TermName::Other(_))
    }
}

impl Ord for TermName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key()
            .cmp(&other.order_key())
            .then_with(|| self.label().cmp(other.label()))
    }
}

impl PartialOrd for TermName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TermName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for TermName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for TermName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(TermName::parse(&value))
    }
}

/// An academic year of a school, e.g. the 2024 school year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYear {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub is_current: bool,
}

impl AcademicYear {
    pub fn new(school_id: Uuid, year: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            school_id,
            name: year.to_string(),
            year,
            is_current: false,
        }
    }

    pub fn current(mut self) -> Self {
        self.is_current = true;
        self
    }
}

impl Identifiable for AcademicYear {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for AcademicYear {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A term within an academic year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: Uuid,
    pub academic_year_id: Uuid,
    pub name: TermName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl Term {
    pub fn new(academic_year_id: Uuid, name: TermName) -> Self {
        Self {
            id: Uuid::new_v4(),
            academic_year_id,
            name,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }
}

impl Identifiable for Term {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A resolved (academic year, term) tag carried by charges and payments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub academic_year_id: Uuid,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_id: Option<Uuid>,
    pub term: TermName,
}

impl Period {
    pub fn new(academic_year: &AcademicYear, term: &Term) -> Self {
        Self {
            academic_year_id: academic_year.id,
            year: academic_year.year,
            term_id: Some(term.id),
            term: term.name.clone(),
        }
    }

    /// A period for a term the calendar does not list.
    pub fn unlisted(academic_year: &AcademicYear, term: TermName) -> Self {
        Self {
            academic_year_id: academic_year.id,
            year: academic_year.year,
            term_id: None,
            term,
        }
    }

    /// True when both periods name the same term of the same year.
    pub fn same_term(&self, other: &Period) -> bool {
        self.year == other.year && self.term == other.term
    }

    /// Strict ordering against a join point: year first, then term order.
    pub fn precedes(&self, year: i32, term: &TermName) -> bool {
        (self.year, self.term.order_key()) < (year, term.order_key())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.term, self.year)
    }
}

/// How a caller names the academic year it wants a statement for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum YearSelector {
    Id(Uuid),
    Name(String),
    #[default]
    Current,
}

impl fmt::Display for YearSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearSelector::Id(id) => write!(f, "id {}", id),
            YearSelector::Name(name) => write!(f, "`{}`", name),
            YearSelector::Current => f.write_str("current"),
        }
    }
}

/// The academic years and terms of one school.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchoolCalendar {
    #[serde(default)]
    pub academic_years: Vec<AcademicYear>,
    #[serde(default)]
    pub terms: Vec<Term>,
}

impl SchoolCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an academic year with the three canonical terms and returns its id.
    pub fn add_standard_year(&mut self, academic_year: AcademicYear) -> Uuid {
        let year_id = academic_year.id;
        for name in TermName::canonical() {
            self.terms.push(Term::new(year_id, name));
        }
        self.academic_years.push(academic_year);
        year_id
    }

    pub fn academic_year(&self, id: Uuid) -> Option<&AcademicYear> {
        self.academic_years.iter().find(|year| year.id == id)
    }

    pub fn academic_year_for(&self, year: i32) -> Option<&AcademicYear> {
        self.academic_years.iter().find(|entry| entry.year == year)
    }

    /// Picks the academic year named by `selector`.
    ///
    /// Names match the year's name or its numeric year. `Current` picks the
    /// year flagged as current.
    pub fn select(&self, selector: &YearSelector) -> Option<&AcademicYear> {
        match selector {
            YearSelector::Id(id) => self.academic_year(*id),
            YearSelector::Name(name) => {
                let needle = name.trim();
                self.academic_years
                    .iter()
                    .find(|year| year.name.trim().eq_ignore_ascii_case(needle))
                    .or_else(|| {
                        needle
                            .parse::<i32>()
                            .ok()
                            .and_then(|number| self.academic_year_for(number))
                    })
            }
            YearSelector::Current => self.academic_years.iter().find(|year| year.is_current),
        }
    }

    pub fn term(&self, id: Uuid) -> Option<&Term> {
        self.terms.iter().find(|term| term.id == id)
    }

    /// Terms of an academic year in canonical order.
    pub fn terms_for(&self, academic_year_id: Uuid) -> Vec<&Term> {
        let mut terms: Vec<&Term> = self
            .terms
            .iter()
            .filter(|term| term.academic_year_id == academic_year_id)
            .collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name));
        terms
    }

    pub fn term_by_name(&self, academic_year_id: Uuid, name: &TermName) -> Option<&Term> {
        self.terms
            .iter()
            .find(|term| term.academic_year_id == academic_year_id && &term.name == name)
    }

    /// Resolves an (academic year, term) id pair into a [`Period`].
    ///
    /// The term must belong to the given academic year.
    pub fn resolve(&self, academic_year_id: Option<Uuid>, term_id: Option<Uuid>) -> Option<Period> {
        let academic_year = self.academic_year(academic_year_id?)?;
        let term = self.term(term_id?)?;
        if term.academic_year_id != academic_year.id {
            return None;
        }
        Some(Period::new(academic_year, term))
    }
}
