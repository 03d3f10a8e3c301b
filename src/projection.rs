use tracing::{debug, info};

use crate::average::{category_weight, in_context, weighted_average};
use crate::error::GradebookError;
use crate::models::{
    AffectAverageQuery, AffectedAverage, GradeRecord, GradeValue, NeededGrade, NeededGradeQuery,
    ProjectionFlag, Selection, Weight, MAX_SCALE,
};
use crate::normalize::{normalize_category, normalize_value, parse_input};

/// Weight assumed for a new activity whose category has none.
pub const DEFAULT_WEIGHT: f64 = 0.10;

const HYPOTHETICAL_CATEGORY: &str = "Hypothetical";
const HYPOTHETICAL_ITEM: &str = "Hypothetical Grade";

/// Grade a new activity needs so the course+period average lands on the target.
///
/// Solves `(score + needed * w) / (total + w) = target`, where `score` and
/// `total` come from the current weighted average. The result is reported even
/// when it falls off the scale; [`ProjectionFlag`] marks those cases.
pub fn needed_grade(
    records: &[GradeRecord],
    query: NeededGradeQuery,
) -> Result<NeededGrade, GradebookError> {
    let (course, period) = require_selection(&query.selection)?;
    let target_average = parse_input("target average", &query.target_average)?;
    let category = canonical_category(query.category.as_deref());

    let context = in_context(records, &course, &period);
    if context.is_empty() {
        return Err(GradebookError::NoData { course, period });
    }

    let weight = resolve_weight(&context, category.as_deref(), query.weight)?;
    let current = weighted_average(context.iter().copied());
    let current_total = current.total_weight_used;
    let current_score = current.average.value().unwrap_or(0.0) * current_total;

    let needed = (target_average * (current_total + weight) - current_score) / weight;
    let flag = if needed > MAX_SCALE {
        Some(ProjectionFlag::Unreachable)
    } else if needed < 0.0 {
        Some(ProjectionFlag::AlreadyExceeded)
    } else {
        None
    };

    info!(%course, %period, target_average, weight, needed, ?flag, "solved needed grade");

    Ok(NeededGrade {
        course,
        period,
        category,
        weight,
        target_average,
        needed,
        flag,
        current,
    })
}

/// Average the course+period would have with one more grade. The stored
/// records are only borrowed; the hypothetical grade exists for this call.
pub fn affect_average(
    records: &[GradeRecord],
    query: AffectAverageQuery,
) -> Result<AffectedAverage, GradebookError> {
    let (course, period) = require_selection(&query.selection)?;
    let score = match normalize_value(&query.new_grade) {
        GradeValue::Numeric(score) => score,
        _ => {
            return Err(GradebookError::Parse {
                field: "new grade",
                raw: query.new_grade,
            })
        }
    };

    let category = canonical_category(query.category.as_deref());
    let context = in_context(records, &course, &period);
    let weight = resolve_weight(&context, category.as_deref(), query.weight)?;

    let category = category.unwrap_or_else(|| HYPOTHETICAL_CATEGORY.to_string());
    if query.weight.is_some() {
        // An override only applies to a category with no weight of its own.
        if let Some(existing) = context_weight(&context, &category) {
            if (existing - weight).abs() > 1e-9 {
                return Err(GradebookError::WeightConflict {
                    category,
                    requested: weight,
                    existing,
                });
            }
        }
    }

    let hypothetical = GradeRecord {
        course: course.clone(),
        period: period.clone(),
        category,
        category_weight: Weight::new(weight),
        value: GradeValue::Numeric(score),
        due_date: String::new(),
        item: HYPOTHETICAL_ITEM.to_string(),
        assignment_url: String::new(),
    };

    let before = weighted_average(context.iter().copied());
    let with_hypothetical = context.iter().copied().chain(std::iter::once(&hypothetical));
    let after = weighted_average(with_hypothetical);
    debug!(
        %course,
        %period,
        score,
        weight,
        before = %before.average,
        after = %after.average,
        "projected new grade"
    );

    Ok(AffectedAverage {
        course,
        period,
        hypothetical,
        weight,
        before,
        after,
    })
}

/// Weight of the activity being projected: an explicit override, else the
/// category's weight in this course+period, else [`DEFAULT_WEIGHT`].
pub fn resolve_weight(
    context: &[&GradeRecord],
    category: Option<&str>,
    override_weight: Option<f64>,
) -> Result<f64, GradebookError> {
    let label = category.unwrap_or("new activity");

    let weight = match override_weight {
        Some(weight) => weight,
        None => category
            .and_then(|category| context_weight(context, category))
            .unwrap_or(DEFAULT_WEIGHT),
    };

    if weight.is_nan() || weight > 1.0 {
        return Err(GradebookError::InvalidWeight(weight));
    }
    if weight <= 0.0 {
        return Err(GradebookError::ZeroWeight {
            category: label.to_string(),
        });
    }
    Ok(weight)
}

fn context_weight(context: &[&GradeRecord], category: &str) -> Option<f64> {
    let group: Vec<&GradeRecord> = context
        .iter()
        .copied()
        .filter(|record| record.category == category)
        .collect();
    category_weight(category, &group)
}

fn canonical_category(category: Option<&str>) -> Option<String> {
    category
        .filter(|label| !label.trim().is_empty())
        .map(normalize_category)
}

fn require_selection(selection: &Selection) -> Result<(String, String), GradebookError> {
    let course = selected(selection.course.as_deref())
        .ok_or(GradebookError::MissingSelection("course"))?;
    let period = selected(selection.period.as_deref())
        .ok_or(GradebookError::MissingSelection("period"))?;
    Ok((course, period))
}

fn selected(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Average;
    use crate::normalize::{APPRECIATION, DAILY_GRADES, EXAMS_AND_PROJECTS};

    fn record(category: &str, value: GradeValue) -> GradeRecord {
        GradeRecord {
            course: "Math".to_string(),
            period: "Bimester 1".to_string(),
            category: category.to_string(),
            category_weight: None,
            value,
            due_date: String::new(),
            item: "Quiz".to_string(),
            assignment_url: String::new(),
        }
    }

    fn gradebook() -> Vec<GradeRecord> {
        vec![
            record(DAILY_GRADES, GradeValue::Numeric(4.0)),
            record(DAILY_GRADES, GradeValue::Numeric(5.0)),
        ]
    }

    fn selection() -> Selection {
        Selection {
            course: Some("Math".to_string()),
            period: Some("Bimester 1".to_string()),
        }
    }

    fn needed_query(target: &str, category: Option<&str>) -> NeededGradeQuery {
        NeededGradeQuery {
            selection: selection(),
            target_average: target.to_string(),
            category: category.map(str::to_string),
            weight: None,
        }
    }

    fn affect_query(grade: &str, category: Option<&str>) -> AffectAverageQuery {
        AffectAverageQuery {
            selection: selection(),
            new_grade: grade.to_string(),
            category: category.map(str::to_string),
            weight: None,
        }
    }

    #[test]
    fn needed_grade_solves_for_target() {
        let query = needed_query("4.00", Some(EXAMS_AND_PROJECTS));
        let result = needed_grade(&gradebook(), query).unwrap();
        // (4.00 * (0.60 + 0.30) - 2.70) / 0.30
        assert!((result.needed - 3.0).abs() < 1e-9);
        assert!((result.weight - 0.3).abs() < 1e-9);
        assert_eq!(result.flag, None);
        assert_eq!(result.current.average, Average::Value(4.5));
    }

    #[test]
    fn needed_grade_flags_unreachable_targets() {
        let result = needed_grade(&gradebook(), needed_query("5", Some(APPRECIATION))).unwrap();
        // (5 * 0.7 - 2.7) / 0.1 = 8
        assert!((result.needed - 8.0).abs() < 1e-9);
        assert_eq!(result.flag, Some(ProjectionFlag::Unreachable));
    }

    #[test]
    fn needed_grade_flags_targets_already_met() {
        let result = needed_grade(&gradebook(), needed_query("3", Some(APPRECIATION))).unwrap();
        assert!(result.needed < 0.0);
        assert_eq!(result.flag, Some(ProjectionFlag::AlreadyExceeded));
    }

    #[test]
    fn unknown_category_falls_back_to_default_weight() {
        let result = needed_grade(&gradebook(), needed_query("4.5", None)).unwrap();
        assert!((result.weight - DEFAULT_WEIGHT).abs() < 1e-9);
        let result = needed_grade(&gradebook(), needed_query("4.5", Some("Quizzes"))).unwrap();
        assert!((result.weight - DEFAULT_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn category_weight_attached_in_context_is_used() {
        let mut records = gradebook();
        let mut lab = record("Labs", GradeValue::Missing);
        lab.category_weight = Weight::new(0.25);
        records.push(lab);
        let result = needed_grade(&records, needed_query("4", Some("Labs"))).unwrap();
        assert!((result.weight - 0.25).abs() < 1e-9);
    }

    #[test]
    fn zero_weight_is_reported() {
        let mut query = needed_query("4", Some("Labs"));
        query.weight = Some(0.0);
        assert_eq!(
            needed_grade(&gradebook(), query),
            Err(GradebookError::ZeroWeight {
                category: "Labs".to_string()
            })
        );

        let mut query = affect_query("4", None);
        query.weight = Some(1.5);
        assert_eq!(
            affect_average(&gradebook(), query),
            Err(GradebookError::InvalidWeight(1.5))
        );
    }

    #[test]
    fn selection_and_input_are_validated() {
        let mut query = needed_query("4", None);
        query.selection.course = None;
        assert_eq!(
            needed_grade(&gradebook(), query),
            Err(GradebookError::MissingSelection("course"))
        );

        let mut query = affect_query("4", None);
        query.selection.period = Some("  ".to_string());
        assert_eq!(
            affect_average(&gradebook(), query),
            Err(GradebookError::MissingSelection("period"))
        );

        assert!(matches!(
            needed_grade(&gradebook(), needed_query("abc", None)),
            Err(GradebookError::Parse { .. })
        ));
        assert!(matches!(
            affect_average(&gradebook(), affect_query("—", None)),
            Err(GradebookError::Parse { .. })
        ));
    }

    #[test]
    fn needed_grade_requires_records_in_context() {
        let mut query = needed_query("4", None);
        query.selection.period = Some("Bimester 4".to_string());
        assert_eq!(
            needed_grade(&gradebook(), query),
            Err(GradebookError::NoData {
                course: "Math".to_string(),
                period: "Bimester 4".to_string(),
            })
        );
    }

    #[test]
    fn needed_grade_without_weighted_history_equals_target() {
        let records = vec![record("Quizzes", GradeValue::Numeric(2.0))];
        let result = needed_grade(&records, needed_query("4.2", None)).unwrap();
        assert_eq!(result.current.average, Average::NotAvailable);
        assert!((result.needed - 4.2).abs() < 1e-9);
    }

    #[test]
    fn affect_average_adds_hypothetical_grade_without_mutation() {
        let records = gradebook();
        let result = affect_average(&records, affect_query("5.0", Some(APPRECIATION))).unwrap();

        assert_eq!(records.len(), 2);
        assert!((result.before.total_weight_used - 0.6).abs() < 1e-9);
        assert!((result.after.total_weight_used - 0.7).abs() < 1e-9);
        // (2.70 + 0.50) / 0.70
        assert_eq!(result.after.average, Average::Value(4.57));
        assert_eq!(
            result.after.steps,
            vec![
                "Daily Grades: 4.50 * (60%) = 2.70",
                "Appreciation: 5.00 * (10%) = 0.50",
            ]
        );
        assert_eq!(result.hypothetical.item, HYPOTHETICAL_ITEM);

        let again = affect_average(&records, affect_query("5.0", Some(APPRECIATION))).unwrap();
        assert_eq!(again, result);
    }

    #[test]
    fn affect_average_without_category_uses_hypothetical_bucket() {
        let result = affect_average(&gradebook(), affect_query("41/45", None)).unwrap();
        assert_eq!(result.hypothetical.category, HYPOTHETICAL_CATEGORY);
        assert_eq!(result.hypothetical.value, GradeValue::Numeric(4.56));
        assert_eq!(result.after.steps[1], "Hypothetical: 4.56 * (10%) = 0.46");
    }

    #[test]
    fn projection_categories_are_canonicalized() {
        let result = needed_grade(&gradebook(), needed_query("4", Some("daily grades"))).unwrap();
        assert!((result.weight - 0.6).abs() < 1e-9);
        assert_eq!(result.category.as_deref(), Some(DAILY_GRADES));

        let query = needed_query("4", Some("Daily Grades (60%)"));
        let result = needed_grade(&gradebook(), query).unwrap();
        assert!((result.weight - 0.6).abs() < 1e-9);

        let result = affect_average(&gradebook(), affect_query("5", Some("daily grades"))).unwrap();
        assert_eq!(result.hypothetical.category, DAILY_GRADES);
        // (4 + 5 + 5) / 3 in the one Daily Grades group
        assert_eq!(result.after.steps, vec!["Daily Grades: 4.67 * (60%) = 2.80"]);
        assert_eq!(result.after.average, Average::Value(4.67));
    }

    #[test]
    fn weight_override_conflicting_with_category_weight_is_rejected() {
        let mut records = gradebook();
        let mut lab = record("Labs", GradeValue::Numeric(3.5));
        lab.category_weight = Weight::new(0.25);
        records.push(lab);

        let mut query = affect_query("4", Some("Labs"));
        query.weight = Some(0.5);
        assert_eq!(
            affect_average(&records, query),
            Err(GradebookError::WeightConflict {
                category: "Labs".to_string(),
                requested: 0.5,
                existing: 0.25,
            })
        );

        let mut query = affect_query("4", Some(DAILY_GRADES));
        query.weight = Some(0.9);
        assert!(matches!(
            affect_average(&records, query),
            Err(GradebookError::WeightConflict { .. })
        ));

        let mut query = affect_query("4", Some("Labs"));
        query.weight = Some(0.25);
        assert!(affect_average(&records, query).is_ok());
    }

    #[test]
    fn weight_override_applies_to_a_new_category() {
        let mut query = affect_query("4", Some("Oral presentation"));
        query.weight = Some(0.4);
        let result = affect_average(&gradebook(), query).unwrap();
        assert_eq!(result.after.steps[1], "Oral presentation: 4.00 * (40%) = 1.60");
        assert!((result.after.total_weight_used - 1.0).abs() < 1e-9);
        // (2.70 + 1.60) / 1.00
        assert_eq!(result.after.average, Average::Value(4.3));
    }

    #[test]
    fn affect_average_fills_a_gradeless_weighted_category() {
        let mut records = gradebook();
        records.push(record(APPRECIATION, GradeValue::Missing));

        let result = affect_average(&records, affect_query("5.0", Some(APPRECIATION))).unwrap();
        assert_eq!(records.len(), 3);
        assert!((result.before.total_weight_used - 0.7).abs() < 1e-9);
        assert!((result.after.total_weight_used - 0.7).abs() < 1e-9);
        // 2.70 / 0.70, then (2.70 + 0.50) / 0.70
        assert_eq!(result.before.average, Average::Value(3.86));
        assert_eq!(result.after.average, Average::Value(4.57));
        assert_eq!(result.after.steps[1], "Appreciation: 5.00 * (10%) = 0.50");
    }
}
