use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

/// Top of the grading scale every numeric grade is expressed in.
pub const MAX_SCALE: f64 = 5.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeValue {
    Numeric(f64),
    Missing,
    Unparsable(String),
}

impl GradeValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            GradeValue::Numeric(score) => Some(*score),
            _ => None,
        }
    }
}

impl fmt::Display for GradeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeValue::Numeric(score) => write!(f, "{score:.2}"),
            GradeValue::Missing => f.write_str("X"),
            GradeValue::Unparsable(raw) => f.write_str(raw),
        }
    }
}

/// A category weight, always a fraction in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Weight(f64);

impl Weight {
    pub fn new(fraction: f64) -> Option<Weight> {
        (fraction > 0.0 && fraction <= 1.0).then_some(Weight(fraction))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `0.6` renders as `60%`, `0.125` as `12.5%`.
    pub fn percent_label(self) -> String {
        percent_label(self.0)
    }
}

impl TryFrom<f64> for Weight {
    type Error = String;

    fn try_from(fraction: f64) -> Result<Self, Self::Error> {
        Weight::new(fraction).ok_or_else(|| format!("weight {fraction} is outside (0, 1]"))
    }
}

impl From<Weight> for f64 {
    fn from(weight: Weight) -> f64 {
        weight.0
    }
}

pub fn percent_label(fraction: f64) -> String {
    let percent = format!("{:.2}", fraction * 100.0);
    let trimmed = percent.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}%")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub course: String,
    pub period: String,
    pub category: String,
    pub category_weight: Option<Weight>,
    pub value: GradeValue,
    #[serde(default)]
    pub due_date: String,
    pub item: String,
    #[serde(default)]
    pub assignment_url: String,
}

impl GradeRecord {
    /// Reads the raw `MM/DD/YY` due date. Two-digit years are taken as 20YY and
    /// anything after the date (a time of day, usually) is ignored.
    pub fn due_date_parsed(&self) -> Option<NaiveDate> {
        let token = self.due_date.split_whitespace().next()?;
        let mut parts = token.split('/');
        let month: u32 = parts.next()?.trim().parse().ok()?;
        let day: u32 = parts.next()?.trim().parse().ok()?;
        let mut year: i32 = parts.next()?.trim().parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        if (0..=99).contains(&year) {
            year += 2000;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// One row as exported by the scraper, before any normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGradeRecord {
    pub course: String,
    pub period: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub category_weight: String,
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub rubric_score: Option<String>,
    #[serde(default)]
    pub max_score: Option<String>,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub assignment_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Average {
    Value(f64),
    NotAvailable,
}

impl Average {
    pub fn value(self) -> Option<f64> {
        match self {
            Average::Value(value) => Some(value),
            Average::NotAvailable => None,
        }
    }
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Average::Value(value) => write!(f, "{value:.2}"),
            Average::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for Average {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageResult {
    pub average: Average,
    pub steps: Vec<String>,
    pub total_weight_used: f64,
}

/// The course and period a projection runs against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub course: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeededGradeQuery {
    pub selection: Selection,
    pub target_average: String,
    pub category: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AffectAverageQuery {
    pub selection: Selection,
    pub new_grade: String,
    pub category: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionFlag {
    /// The needed grade is above the top of the scale.
    Unreachable,
    /// The target is already met; any grade keeps the average above it.
    AlreadyExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeededGrade {
    pub course: String,
    pub period: String,
    pub category: Option<String>,
    pub weight: f64,
    pub target_average: f64,
    pub needed: f64,
    pub flag: Option<ProjectionFlag>,
    pub current: AverageResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedAverage {
    pub course: String,
    pub period: String,
    pub hypothetical: GradeRecord,
    pub weight: f64,
    pub before: AverageResult,
    pub after: AverageResult,
}
