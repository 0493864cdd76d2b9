//! Schools, students, and grade assignments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    calendar::TermName,
    common::{Displayable, Identifiable, NamedEntity},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

impl School {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
        }
    }
}

impl Identifiable for School {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for School {
    fn name(&self) -> &str {
        &self.name
    }
}

/// The grade (and optionally class stream) a student is enrolled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GradeAssignment {
    pub grade_id: Uuid,
    pub grade_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl GradeAssignment {
    pub fn new(grade_id: Uuid, grade_name: impl Into<String>) -> Self {
        Self {
            grade_id,
            grade_name: grade_name.into(),
            class_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub school_id: Uuid,
    pub admission_number: String,
    pub name: String,
    #[serde(default)]
    pub grade: Option<GradeAssignment>,
    #[serde(default)]
    pub join_academic_year: Option<i32>,
    #[serde(default)]
    pub join_term: Option<TermName>,
    #[serde(default)]
    pub admission_date: Option<NaiveDate>,
}

impl Student {
    pub fn new(
        school_id: Uuid,
        admission_number: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            school_id,
            admission_number: admission_number.into(),
            name: name.into(),
            grade: None,
            join_academic_year: None,
            join_term: None,
            admission_date: None,
        }
    }

    pub fn with_grade(mut self, grade: GradeAssignment) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn joined(mut self, academic_year: i32, term: TermName) -> Self {
        self.join_academic_year = Some(academic_year);
        self.join_term = Some(term);
        self
    }

    pub fn admitted_on(mut self, date: NaiveDate) -> Self {
        self.admission_date = Some(date);
        self
    }

    /// The (year, term) from which charges and payments apply, when both are recorded.
    pub fn join_point(&self) -> Option<(i32, &TermName)> {
        match (self.join_academic_year, self.join_term.as_ref()) {
            (Some(year), Some(term)) => Some((year, term)),
            _ => None,
        }
    }

    pub fn summary(&self) -> StudentSummary {
        StudentSummary {
            id: self.id,
            admission_number: self.admission_number.clone(),
            name: self.name.clone(),
            grade_name: self.grade.as_ref().map(|grade| grade.grade_name.clone()),
            class_name: self
                .grade
                .as_ref()
                .and_then(|grade| grade.class_name.clone()),
            join_academic_year: self.join_academic_year,
            join_term: self.join_term.clone(),
        }
    }
}

impl Identifiable for Student {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Student {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Student {
    fn display_label(&self) -> String {
        format!("{} ({})", self.name, self.admission_number)
    }
}

/// Identity block returned at the top of a fee statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: Uuid,
    pub admission_number: String,
    pub name: String,
    pub grade_name: Option<String>,
    pub class_name: Option<String>,
    pub join_academic_year: Option<i32>,
    pub join_term: Option<TermName>,
}
