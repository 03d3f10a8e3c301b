use tracing::debug;

use crate::error::GradebookError;
use crate::models::{round2, GradeRecord, GradeValue, RawGradeRecord, Weight, MAX_SCALE};

pub const DAILY_GRADES: &str = "Daily Grades";
pub const APPRECIATION: &str = "Appreciation";
pub const EXAMS_AND_PROJECTS: &str = "Exams and Projects";
pub const UNCATEGORIZED: &str = "Uncategorized";

const MISSING_MARKERS: &[&str] = &["", "—", "–", "-", "X", "x", "N/A"];

/// Turns a raw grade cell into a value on the 0–5 scale.
///
/// Plain numbers are taken as-is, `"earned / possible"` is rescaled to the
/// scale, and "no grade yet" markers become [`GradeValue::Missing`]. Anything
/// that ends up off the scale is kept as [`GradeValue::Unparsable`].
pub fn normalize_value(raw: &str) -> GradeValue {
    let text = raw.trim();
    if MISSING_MARKERS.contains(&text) {
        return GradeValue::Missing;
    }

    if let Some(score) = parse_number(text) {
        return on_scale(score, text);
    }

    if let Some((earned, possible)) = text.split_once('/') {
        if let (Some(earned), Some(possible)) = (parse_number(earned), parse_number(possible)) {
            if possible > 0.0 {
                return on_scale(earned / possible * MAX_SCALE, text);
            }
        }
    }

    GradeValue::Unparsable(text.to_string())
}

/// Rubric grades carry their own maximum; without one the score is used unscaled.
pub fn normalize_rubric(score: &str, max: Option<&str>) -> GradeValue {
    let score_text = score.trim();
    let Some(rubric_score) = parse_number(score_text) else {
        return GradeValue::Unparsable(score_text.to_string());
    };

    let max_text = max
        .map(|text| text.trim().trim_start_matches('/').trim())
        .filter(|text| !text.is_empty());

    match max_text {
        None => on_scale(rubric_score, score_text),
        Some(max_text) => match parse_number(max_text) {
            Some(max_score) if max_score > 0.0 => {
                on_scale(rubric_score / max_score * MAX_SCALE, score_text)
            }
            _ => GradeValue::Unparsable(format!("{score_text} / {max_text}")),
        },
    }
}

/// Strict parse for numbers typed into a projection query.
pub fn parse_input(field: &'static str, raw: &str) -> Result<f64, GradebookError> {
    parse_number(raw.trim()).ok_or_else(|| GradebookError::Parse {
        field,
        raw: raw.to_string(),
    })
}

pub fn normalize_category(label: &str) -> String {
    let lower = label.to_lowercase();
    if lower.contains("daily grades") {
        DAILY_GRADES.to_string()
    } else if lower.contains("appreciation") {
        APPRECIATION.to_string()
    } else if lower.contains("exams and projects") {
        EXAMS_AND_PROJECTS.to_string()
    } else if label.trim().is_empty() || label.trim() == "N/A" {
        UNCATEGORIZED.to_string()
    } else {
        label.to_string()
    }
}

/// Pulls the weight out of a category header such as `"Quizzes (15%)"`.
pub fn parse_weight(text: &str) -> Option<Weight> {
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        if let Some(close) = after.find("%)") {
            if let Some(weight) = percent_to_weight(&after[..close]) {
                return Some(weight);
            }
        }
        rest = after;
    }

    text.trim().strip_suffix('%').and_then(percent_to_weight)
}

pub fn normalize_record(raw: RawGradeRecord) -> GradeRecord {
    let value = if !raw.value.trim().is_empty() {
        normalize_value(&raw.value)
    } else if let Some(score) = raw.rubric_score.as_deref().filter(|s| !s.trim().is_empty()) {
        normalize_rubric(score, raw.max_score.as_deref())
    } else {
        GradeValue::Missing
    };

    if let GradeValue::Unparsable(text) = &value {
        debug!(course = %raw.course, item = %raw.item, raw = %text, "grade cell is not numeric");
    }

    GradeRecord {
        course: label_or_placeholder(raw.course),
        period: label_or_placeholder(raw.period),
        category: normalize_category(&raw.category),
        category_weight: parse_weight(&raw.category_weight),
        value,
        due_date: raw.due_date.trim().to_string(),
        item: label_or_placeholder(raw.item),
        assignment_url: raw.assignment_url.trim().to_string(),
    }
}

pub fn normalize_all(raw: Vec<RawGradeRecord>) -> Vec<GradeRecord> {
    let records: Vec<GradeRecord> = raw.into_iter().map(normalize_record).collect();
    let numeric = records
        .iter()
        .filter(|record| record.value.as_numeric().is_some())
        .count();
    debug!(total = records.len(), numeric, "normalized scraped records");
    records
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn on_scale(score: f64, raw: &str) -> GradeValue {
    let score = round2(score);
    if (0.0..=MAX_SCALE).contains(&score) {
        GradeValue::Numeric(score)
    } else {
        GradeValue::Unparsable(raw.to_string())
    }
}

fn percent_to_weight(text: &str) -> Option<Weight> {
    parse_number(text).and_then(|percent| Weight::new(percent / 100.0))
}

fn label_or_placeholder(label: String) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        "N/A".to_string()
    } else {
        trimmed.to_string()
    }
}
