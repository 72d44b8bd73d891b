use crate::app::Visit;
use crate::cli::errors::{CliError, CliResult};

pub fn validate_title(title: &str) -> CliResult<()> {
    if title.trim().is_empty() {
        return Err(CliError::validation("title", "Title cannot be empty"));
    }
    Ok(())
}

/// Cosine similarity lives in [-1, 1]
pub fn validate_min_score(min_score: Option<f32>) -> CliResult<()> {
    if let Some(min_score) = min_score {
        if !(-1.0..=1.0).contains(&min_score) {
            return Err(CliError::validation(
                "min_score",
                "Minimum score must be between -1.0 and 1.0",
            ));
        }
    }
    Ok(())
}

pub fn validate_visit_time(time: f64) -> CliResult<()> {
    if !time.is_finite() || time < 0.0 {
        return Err(CliError::validation(
            "time",
            "Visit time must be a non-negative epoch millisecond value",
        ));
    }
    Ok(())
}

/// Comma separated list, blanks dropped.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Visits from an exported history file: a JSON array of
/// `{title, url, lastVisitTime}` objects.
pub fn parse_visits(content: &str) -> CliResult<Vec<Visit>> {
    let visits: Vec<Visit> = serde_json::from_str(content)?;
    Ok(visits)
}
