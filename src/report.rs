use std::fmt::Write;

use chrono::NaiveDate;

use crate::average::{
    course_overall_average, course_period_average, courses, grand_average, in_context,
    ordered_categories, period_average, periods,
};
use crate::models::{AverageResult, GradeRecord, GradeValue};

pub fn build_report(
    records: &[GradeRecord],
    period: Option<&str>,
    generated_on: NaiveDate,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Gradebook Averages");
    let _ = writeln!(
        output,
        "Generated on {} for {}",
        generated_on,
        period.unwrap_or("all bimesters")
    );
    let _ = writeln!(output);

    if records.is_empty() {
        let _ = writeln!(output, "No grades found. Import a scrape first.");
        return output;
    }

    match period {
        Some(period) => write_period(&mut output, records, period),
        None => write_all_periods(&mut output, records),
    }

    output
}

fn write_all_periods(output: &mut String, records: &[GradeRecord]) {
    let periods = periods(records);

    let _ = writeln!(output, "## Course Averages");
    let _ = writeln!(output, "| Course | {} | Average |", periods.join(" | "));
    let _ = writeln!(output, "|---|{}---|", "---|".repeat(periods.len()));

    for course in courses(records) {
        let cells: Vec<String> = periods
            .iter()
            .map(|period| course_period_average(records, &course, period).average.to_string())
            .collect();
        let overall = course_overall_average(records, &course);
        let _ = writeln!(output, "| {} | {} | {} |", course, cells.join(" | "), overall.average);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Bimester Averages");
    for period in &periods {
        let result = period_average(records, period);
        if result.average.value().is_some() {
            let _ = writeln!(output, "- {}: {}", period, result.average);
        }
    }

    let grand = grand_average(records);
    let _ = writeln!(output);
    let _ = writeln!(output, "Grand overall average: {}", grand.average);
}

fn write_period(output: &mut String, records: &[GradeRecord], period: &str) {
    let in_period: Vec<&GradeRecord> = records
        .iter()
        .filter(|record| record.period == period)
        .collect();

    if in_period.is_empty() {
        let _ = writeln!(output, "No grades recorded for {period}.");
        return;
    }

    let categories = ordered_categories(in_period.iter().copied());
    let headers: Vec<String> = categories
        .iter()
        .map(|category| {
            match in_period
                .iter()
                .find(|record| &record.category == category)
                .and_then(|record| record.category_weight)
            {
                Some(weight) => format!("{category} ({})", weight.percent_label()),
                None => category.clone(),
            }
        })
        .collect();

    let _ = writeln!(output, "## Grades");
    let _ = writeln!(output, "| Course | {} | Average |", headers.join(" | "));
    let _ = writeln!(output, "|---|{}---|", "---|".repeat(categories.len()));

    let mut course_results: Vec<(String, AverageResult)> = Vec::new();
    for course in courses(records) {
        let context = in_context(records, &course, period);
        if context.is_empty() {
            continue;
        }

        let cells: Vec<String> = categories
            .iter()
            .map(|category| {
                let values: Vec<String> = context
                    .iter()
                    .filter(|record| &record.category == category)
                    .map(|record| record.value.to_string())
                    .collect();
                if values.is_empty() {
                    "X".to_string()
                } else {
                    values.join(", ")
                }
            })
            .collect();

        let result = course_period_average(records, &course, period);
        let _ = writeln!(output, "| {} | {} | {} |", course, cells.join(" | "), result.average);
        course_results.push((course, result));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Calculation Steps");
    for (course, result) in &course_results {
        let _ = writeln!(output, "### {course}: {}", result.average);
        write_steps(output, result);
    }

    let overall = period_average(records, period);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Total Bimester Average: {}", overall.average);
    write_steps(output, &overall);

    write_pending(output, &in_period);
}

/// Ungraded activities, soonest due first; undated ones go last.
fn write_pending(output: &mut String, in_period: &[&GradeRecord]) {
    let mut pending: Vec<&GradeRecord> = in_period
        .iter()
        .copied()
        .filter(|record| record.value == GradeValue::Missing)
        .collect();
    if pending.is_empty() {
        return;
    }
    pending.sort_by_key(|record| (record.due_date_parsed().is_none(), record.due_date_parsed()));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Pending Activities");
    for record in pending {
        let due = record
            .due_date_parsed()
            .map(|date| date.format("%A, %B %-d, %Y").to_string())
            .unwrap_or_else(|| "no due date".to_string());
        let _ = writeln!(
            output,
            "- {} ({}, {}): {}",
            record.item, record.course, record.category, due
        );
    }
}

fn write_steps(output: &mut String, result: &AverageResult) {
    if result.steps.is_empty() {
        let _ = writeln!(output, "- No weighted grades yet.");
    }
    for step in &result.steps {
        let _ = writeln!(output, "- {step}");
    }
}
