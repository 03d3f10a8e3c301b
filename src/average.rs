use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::models::{percent_label, round2, Average, AverageResult, GradeRecord, Weight};
use crate::normalize::{APPRECIATION, DAILY_GRADES, EXAMS_AND_PROJECTS, UNCATEGORIZED};

/// School-wide weights; these override whatever the gradebook page reports.
pub const FIXED_WEIGHTS: &[(&str, f64)] = &[
    (DAILY_GRADES, 0.60),
    (APPRECIATION, 0.10),
    (EXAMS_AND_PROJECTS, 0.30),
];

pub fn fixed_weight(category: &str) -> Option<f64> {
    FIXED_WEIGHTS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, weight)| *weight)
}

/// Weight for one category group: the fixed table first, then the first
/// weight the scraper attached to any record in the group.
pub fn category_weight(category: &str, group: &[&GradeRecord]) -> Option<f64> {
    fixed_weight(category).or_else(|| {
        group
            .iter()
            .find_map(|record| record.category_weight)
            .map(Weight::value)
    })
}

/// Category-weighted average of a set of records.
///
/// Each category contributes the mean of its numeric grades times its weight,
/// and the sum is divided by the weights actually used. A weighted category
/// with no numeric grades adds nothing to the sum but its weight still counts
/// in the divisor. Steps are listed in order of each category's first record.
pub fn weighted_average<'a, I>(records: I) -> AverageResult
where
    I: IntoIterator<Item = &'a GradeRecord>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&GradeRecord>> = HashMap::new();

    for record in records {
        let entry = groups.entry(record.category.as_str()).or_insert_with(|| {
            order.push(record.category.as_str());
            Vec::new()
        });
        entry.push(record);
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut steps = Vec::new();

    for category in order {
        let group = &groups[category];
        let weight = category_weight(category, group).unwrap_or(0.0);
        if weight <= 0.0 {
            continue;
        }

        let scores: Vec<f64> = group
            .iter()
            .filter_map(|record| record.value.as_numeric())
            .collect();
        total_weight += weight;

        if scores.is_empty() {
            steps.push(format!(
                "{category}: No valid grades * ({}) = 0.00",
                percent_label(weight)
            ));
            continue;
        }

        let category_average = scores.iter().sum::<f64>() / scores.len() as f64;
        let contribution = category_average * weight;
        weighted_sum += contribution;
        steps.push(format!(
            "{category}: {category_average:.2} * ({}) = {contribution:.2}",
            percent_label(weight)
        ));
    }

    let average = if total_weight > 0.0 {
        Average::Value(round2(weighted_sum / total_weight))
    } else {
        Average::NotAvailable
    };

    AverageResult {
        average,
        steps,
        total_weight_used: total_weight,
    }
}

pub fn in_context<'a>(
    records: &'a [GradeRecord],
    course: &str,
    period: &str,
) -> Vec<&'a GradeRecord> {
    records
        .iter()
        .filter(|record| record.course == course && record.period == period)
        .collect()
}

pub fn course_period_average(records: &[GradeRecord], course: &str, period: &str) -> AverageResult {
    weighted_average(in_context(records, course, period))
}

pub fn period_average(records: &[GradeRecord], period: &str) -> AverageResult {
    weighted_average(records.iter().filter(|record| record.period == period))
}

/// Unweighted mean of already computed averages. Unavailable averages are
/// left out; each included one carries a unit weight.
pub fn mean_of_averages<'a, I>(results: I) -> AverageResult
where
    I: IntoIterator<Item = (&'a str, &'a AverageResult)>,
{
    let mut total = 0.0;
    let mut count = 0usize;
    let mut steps = Vec::new();

    for (label, result) in results {
        if let Average::Value(value) = result.average {
            total += value;
            count += 1;
            steps.push(format!("{label}: {value:.2}"));
        }
    }

    let average = if count == 0 {
        Average::NotAvailable
    } else {
        Average::Value(round2(total / count as f64))
    };

    AverageResult {
        average,
        steps,
        total_weight_used: count as f64,
    }
}

/// A course across every period in the gradebook.
pub fn course_overall_average(records: &[GradeRecord], course: &str) -> AverageResult {
    let per_period: Vec<(String, AverageResult)> = periods(records)
        .into_iter()
        .map(|period| {
            let result = course_period_average(records, course, &period);
            (period, result)
        })
        .collect();
    debug!(course, periods = per_period.len(), "averaging course across periods");
    mean_of_averages(per_period.iter().map(|(period, result)| (period.as_str(), result)))
}

/// Mean of each period's all-course average.
pub fn grand_average(records: &[GradeRecord]) -> AverageResult {
    let per_period: Vec<(String, AverageResult)> = periods(records)
        .into_iter()
        .map(|period| {
            let result = period_average(records, &period);
            (period, result)
        })
        .collect();
    mean_of_averages(per_period.iter().map(|(period, result)| (period.as_str(), result)))
}

pub fn periods(records: &[GradeRecord]) -> Vec<String> {
    unique(records.iter().map(|record| record.period.as_str()))
}

pub fn courses(records: &[GradeRecord]) -> Vec<String> {
    unique(records.iter().map(|record| record.course.as_str()))
}

pub fn categories(records: &[GradeRecord]) -> Vec<String> {
    unique(records.iter().map(|record| record.category.as_str()))
}

/// Canonical categories first, in gradebook order, then the rest alphabetically.
pub fn ordered_categories<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a GradeRecord>,
{
    const ORDER: [&str; 4] = [DAILY_GRADES, APPRECIATION, EXAMS_AND_PROJECTS, UNCATEGORIZED];

    let mut names = unique(records.into_iter().map(|record| record.category.as_str()));
    names.sort_by_key(|name| {
        let rank = ORDER
            .iter()
            .position(|known| *known == name.as_str())
            .unwrap_or(ORDER.len());
        (rank, name.clone())
    });
    names
}

fn unique<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    labels
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
