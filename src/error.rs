use thiserror::Error;

/// Failures reported by a single normalization or projection call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradebookError {
    #[error("could not read {field} from {raw:?}")]
    Parse { field: &'static str, raw: String },

    #[error("please select a {0}")]
    MissingSelection(&'static str),

    #[error(
        "cannot calculate with a 0% weight for {category}; select a category with a defined weight"
    )]
    ZeroWeight { category: String },

    #[error("no grades found for {course} in {period}")]
    NoData { course: String, period: String },

    #[error("weight {0} is outside (0, 1]")]
    InvalidWeight(f64),

    #[error("{category} already weighs {existing}; cannot project it at {requested}")]
    WeightConflict {
        category: String,
        requested: f64,
        existing: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failed_input() {
        let err = GradebookError::MissingSelection("course");
        assert_eq!(err.to_string(), "please select a course");

        let err = GradebookError::NoData {
            course: "Biology".to_string(),
            period: "Bimester 2".to_string(),
        };
        assert_eq!(err.to_string(), "no grades found for Biology in Bimester 2");
    }
}
