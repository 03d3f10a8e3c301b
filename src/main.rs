use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod average;
mod error;
mod models;
mod normalize;
mod projection;
mod report;
mod store;

use crate::models::{AffectAverageQuery, NeededGradeQuery, ProjectionFlag, Selection};

const DEFAULT_STORE: &str = "gradebook.json";

#[derive(Parser)]
#[command(name = "gradebook-averages")]
#[command(
    about = "Weighted course averages and what-if projections for a scraped gradebook",
    long_about = None
)]
struct Cli {
    /// Gradebook blob to read and write (defaults to $GRADEBOOK_STORE, then gradebook.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a scraper export (JSON or CSV) into the gradebook store
    Import {
        #[arg(long)]
        input: PathBuf,
    },
    /// Store a sample gradebook
    Seed,
    /// Print averages for one course, one bimester, or everything
    Averages {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        period: Option<String>,
        /// Print the structured result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Grade needed on a new activity to reach a target average
    Needed {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        target: String,
        #[arg(long)]
        category: Option<String>,
        /// Weight of the new activity as a fraction, overriding the category's
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Average after adding a hypothetical grade
    Affect {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        grade: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        period: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store_path = cli
        .store
        .or_else(|| std::env::var_os("GRADEBOOK_STORE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE));

    match cli.command {
        Commands::Import { input } => {
            let raw = store::import_raw(&input)?;
            let records = normalize::normalize_all(raw);
            store::save(&store_path, &records)?;
            println!(
                "Stored {} grades from {} in {}.",
                records.len(),
                input.display(),
                store_path.display()
            );
        }
        Commands::Seed => {
            let records = normalize::normalize_all(store::seed());
            store::save(&store_path, &records)?;
            println!("Sample gradebook written to {}.", store_path.display());
        }
        Commands::Averages {
            course,
            period,
            json,
        } => {
            let records = store::load(&store_path)?;
            let result = match (course.as_deref(), period.as_deref()) {
                (Some(course), Some(period)) => {
                    average::course_period_average(&records, course, period)
                }
                (Some(course), None) => average::course_overall_average(&records, course),
                (None, Some(period)) => average::period_average(&records, period),
                (None, None) => average::grand_average(&records),
            };
            info!(?course, ?period, average = %result.average, "computed average");

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{} / {}: {}",
                    course.as_deref().unwrap_or("all courses"),
                    period.as_deref().unwrap_or("all bimesters"),
                    result.average
                );
                for step in &result.steps {
                    println!("  {step}");
                }
            }
        }
        Commands::Needed {
            course,
            period,
            target,
            category,
            weight,
            json,
        } => {
            let records = store::load(&store_path)?;
            warn_unknown_category(&records, category.as_deref());
            let query = NeededGradeQuery {
                selection: Selection { course, period },
                target_average: target,
                category,
                weight,
            };

            match projection::needed_grade(&records, query) {
                Ok(result) if json => println!("{}", serde_json::to_string_pretty(&result)?),
                Ok(result) => {
                    println!(
                        "To reach {:.2} in {} for {}, you need {:.2} on a {} activity worth {}.",
                        result.target_average,
                        result.course,
                        result.period,
                        result.needed,
                        result.category.as_deref().unwrap_or("new"),
                        models::percent_label(result.weight)
                    );
                    match result.flag {
                        Some(ProjectionFlag::Unreachable) => println!(
                            "That is above the maximum of {:.1}; the target may be out of reach.",
                            models::MAX_SCALE
                        ),
                        Some(ProjectionFlag::AlreadyExceeded) => println!(
                            "You are already above the target. Current average: {}.",
                            result.current.average
                        ),
                        None => {}
                    }
                }
                Err(err) => {
                    warn!(%err, "needed grade not computed");
                    println!("{err}");
                }
            }
        }
        Commands::Affect {
            course,
            period,
            grade,
            category,
            weight,
            json,
        } => {
            let records = store::load(&store_path)?;
            warn_unknown_category(&records, category.as_deref());
            let query = AffectAverageQuery {
                selection: Selection { course, period },
                new_grade: grade,
                category,
                weight,
            };

            match projection::affect_average(&records, query) {
                Ok(result) if json => println!("{}", serde_json::to_string_pretty(&result)?),
                Ok(result) => {
                    println!(
                        "A {} in {} worth {} moves {} for {} from {} to {}.",
                        result.hypothetical.value,
                        result.hypothetical.category,
                        models::percent_label(result.weight),
                        result.course,
                        result.period,
                        result.before.average,
                        result.after.average
                    );
                    for step in &result.after.steps {
                        println!("  {step}");
                    }
                }
                Err(err) => {
                    warn!(%err, "projection not computed");
                    println!("{err}");
                }
            }
        }
        Commands::Report { period, out } => {
            let records = store::load(&store_path)?;
            let today = chrono::Local::now().date_naive();
            let report = report::build_report(&records, period.as_deref(), today);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn warn_unknown_category(records: &[models::GradeRecord], category: Option<&str>) {
    if let Some(category) = category {
        let category = normalize::normalize_category(category);
        let known = average::categories(records);
        if !known.iter().any(|name| *name == category) {
            warn!(%category, ?known, "category is not in the gradebook");
        }
    }
}
