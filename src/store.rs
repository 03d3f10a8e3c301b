use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::models::{GradeRecord, RawGradeRecord};

/// Reads a scraper export. `.json` files hold an array of records; anything
/// else is read as CSV with the same column names.
pub fn import_raw(path: &Path) -> anyhow::Result<Vec<RawGradeRecord>> {
    let is_json = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));

    let rows = if is_json {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not a grade export", path.display()))?
    } else {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut rows = Vec::new();
        for result in reader.deserialize::<RawGradeRecord>() {
            rows.push(result?);
        }
        rows
    };

    info!(path = %path.display(), rows = rows.len(), "read scraped grades");
    Ok(rows)
}

pub fn save(path: &Path, records: &[GradeRecord]) -> anyhow::Result<()> {
    let blob = serde_json::to_string_pretty(records)?;
    std::fs::write(path, blob).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "stored gradebook");
    Ok(())
}

pub fn load(path: &Path) -> anyhow::Result<Vec<GradeRecord>> {
    let blob = std::fs::read_to_string(path).with_context(|| {
        format!(
            "failed to read {}; run `import` or `seed` first",
            path.display()
        )
    })?;
    let records: Vec<GradeRecord> = serde_json::from_str(&blob)
        .with_context(|| format!("{} is not a stored gradebook", path.display()))?;
    Ok(records)
}

/// A small but realistic scrape: two courses over two bimesters, with a
/// rubric grade, a fraction grade, an ungraded item and an off-table category.
pub fn seed() -> Vec<RawGradeRecord> {
    let mathematics = [
        ("Bimester 1", "Daily Grades (60%)", "Fractions worksheet", "4.5", "02/03/25"),
        ("Bimester 1", "Daily Grades (60%)", "Homework 2", "41 / 45", "02/10/25"),
        ("Bimester 1", "Appreciation (10%)", "Participation", "5", "03/28/25"),
        ("Bimester 1", "Exams and Projects (30%)", "Unit test", "3.8", "03/21/25"),
        ("Bimester 2", "Daily Grades (60%)", "Ratios worksheet", "4", "04/14/25"),
        ("Bimester 2", "Exams and Projects (30%)", "Geometry project", "—", "05/30/25"),
    ];
    let biology = [
        ("Bimester 1", "Daily Grades (60%)", "Cell diagram", "3.5", "02/05/25"),
        ("Bimester 1", "Lab Work (20%)", "Microscope lab", "4.2", "02/19/25"),
        ("Bimester 1", "Lab Work (20%)", "Osmosis lab", "Excused", "03/05/25"),
        ("Bimester 2", "Appreciation (10%)", "Field trip reflection", "4.8", "04/25/25"),
        ("Bimester 2", "", "Extra reading", "X", ""),
    ];

    let courses: [(&str, &[(&str, &str, &str, &str, &str)]); 2] =
        [("Mathematics", &mathematics), ("Biology", &biology)];

    let mut records: Vec<RawGradeRecord> = courses
        .into_iter()
        .flat_map(|(course, rows)| {
            rows.iter()
                .map(move |&(period, category, item, value, due_date)| RawGradeRecord {
                    course: course.to_string(),
                    period: period.to_string(),
                    category: category.to_string(),
                    category_weight: header_weight(category).to_string(),
                    item: item.to_string(),
                    value: value.to_string(),
                    due_date: due_date.to_string(),
                    ..RawGradeRecord::default()
                })
        })
        .collect();

    records.push(RawGradeRecord {
        course: "Biology".to_string(),
        period: "Bimester 2".to_string(),
        category: "Exams and Projects (30%)".to_string(),
        category_weight: "(30%)".to_string(),
        item: "Ecosystem poster".to_string(),
        rubric_score: Some("14".to_string()),
        max_score: Some("/ 16".to_string()),
        due_date: "05/16/25".to_string(),
        assignment_url: "https://school.example/assignment/ecosystem-poster".to_string(),
        ..RawGradeRecord::default()
    });

    records
}

/// The `(NN%)` part of a category header, as the page shows it in its own cell.
fn header_weight(category: &str) -> &str {
    category.find('(').map_or("", |open| &category[open..])
}
