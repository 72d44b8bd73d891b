use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{ClassifyError, Classifier, LabelScores};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Zero-shot classification over HTTP.
///
/// Request: `{"inputs": text, "parameters": {"candidate_labels": [...]}}`
/// Response: `{"labels": [...], "scores": [...]}`, best label first.
pub struct RemoteClassifier {
    endpoint: String,
    token: Option<String>,
    top_n: usize,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f32>,
}

impl RemoteClassifier {
    pub fn new(endpoint: &str, token: Option<String>, top_n: usize) -> Result<Self, ClassifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            token,
            top_n,
            client,
        })
    }
}

fn parse_response(body: &str, top_n: usize) -> Result<LabelScores, ClassifyError> {
    let response: ZeroShotResponse = serde_json::from_str(body).map_err(|err| {
        log::error!("{err}. tried to parse: {body:?}");
        ClassifyError::InvalidResponse(err.to_string())
    })?;

    if response.labels.len() != response.scores.len() {
        return Err(ClassifyError::InvalidResponse(format!(
            "{} labels but {} scores",
            response.labels.len(),
            response.scores.len()
        )));
    }

    Ok(LabelScores {
        labels: response.labels,
        scores: response.scores,
    }
    .truncate(top_n))
}

impl Classifier for RemoteClassifier {
    fn classify(&self, text: &str, labels: &[String]) -> Result<LabelScores, ClassifyError> {
        if labels.is_empty() {
            return Err(ClassifyError::NoLabels);
        }

        log::debug!("classifying via {}", self.endpoint);
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "inputs": text,
            "parameters": { "candidate_labels": labels },
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?.error_for_status()?;
        let body = response.text()?;

        parse_response(&body, self.top_n)
    }
}
