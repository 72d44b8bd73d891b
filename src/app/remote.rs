use anyhow::bail;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::{
    classify::LabelScores, history::HistoryEntry, query::SimilarityHit, stats::Stats,
    tags::TagCountMap,
};

use super::{backend::*, errors::AppError};

/// Talks to a running daemon over its HTTP api.
pub struct AppRemote {
    remote_addr: String,
    client: reqwest::blocking::Client,
}

impl AppRemote {
    pub fn new(addr: &str) -> AppRemote {
        let remote_addr = addr.strip_suffix('/').unwrap_or(addr).to_string();

        AppRemote {
            remote_addr,
            // imports and first-time model loads can take a while
            client: reqwest::blocking::Client::builder()
                .timeout(None)
                .build()
                .unwrap_or_else(|err| {
                    log::warn!("falling back to default http client: {err}");
                    reqwest::blocking::Client::new()
                }),
        }
    }

    fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        log::info!("{}{}", self.remote_addr, url);
        self.client.get(format!("{}{}", self.remote_addr, url))
    }

    fn post(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        log::info!("{}{}", self.remote_addr, url);
        self.client.post(format!("{}{}", self.remote_addr, url))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum WebResponse<T> {
    Error { error: String },
    Data(T),
}

fn handle_response<T>(response: reqwest::blocking::Response) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let text = response.text()?;

    let web_response = serde_json::from_str::<WebResponse<T>>(&text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        err
    })?;

    match web_response {
        WebResponse::Data(data) => Ok(data),
        WebResponse::Error { error } => {
            bail!("{status}: {error}")
        }
    }
}

impl AppBackend for AppRemote {
    fn visit(&self, visit: Visit) -> anyhow::Result<VisitOutcome, AppError> {
        let resp = self.post("/api/visit").json(&visit).send()?;

        Ok(handle_response(resp)?)
    }

    fn classify(&self, title: &str, url: &str) -> anyhow::Result<LabelScores, AppError> {
        let resp = self
            .post("/api/classify")
            .json(&json!({
                "title": title,
                "url": url,
            }))
            .send()?;

        Ok(handle_response(resp)?)
    }

    fn simi_search(
        &self,
        query: &str,
        min_score: Option<f32>,
    ) -> anyhow::Result<Vec<SimilarityHit>, AppError> {
        let resp = self
            .post("/api/simi-search")
            .json(&json!({
                "query": query,
                "min_score": min_score,
            }))
            .send()?;

        Ok(handle_response(resp)?)
    }

    fn recommend(
        &self,
        query: Option<String>,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<HistoryEntry>, AppError> {
        let resp = self
            .post("/api/recommend")
            .json(&json!({
                "query": query,
                "limit": limit,
            }))
            .send()?;

        Ok(handle_response(resp)?)
    }

    fn history(&self, query: HistoryQuery) -> anyhow::Result<Vec<HistoryEntry>, AppError> {
        let resp = self.post("/api/history").json(&query).send()?;

        Ok(handle_response(resp)?)
    }

    fn entry(&self, id: u32) -> anyhow::Result<HistoryEntry, AppError> {
        let resp = self.get(&format!("/api/history/{id}")).send()?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound);
        }

        Ok(handle_response(resp)?)
    }

    fn tag_counts(&self) -> anyhow::Result<TagCountMap, AppError> {
        let resp = self.get("/api/tags").send()?;

        Ok(handle_response(resp)?)
    }

    fn stats(&self) -> anyhow::Result<Stats, AppError> {
        let resp = self.get("/api/stats").send()?;

        Ok(handle_response(resp)?)
    }

    fn labels(&self) -> anyhow::Result<Vec<String>, AppError> {
        let resp = self.get("/api/labels").send()?;

        Ok(handle_response(resp)?)
    }

    fn set_labels(&self, labels: Vec<String>) -> anyhow::Result<Vec<String>, AppError> {
        let resp = self
            .post("/api/labels")
            .json(&json!({ "labels": labels }))
            .send()?;

        Ok(handle_response(resp)?)
    }

    fn import(&self, visits: Vec<Visit>) -> anyhow::Result<ImportSummary, AppError> {
        let resp = self.post("/api/import").json(&visits).send()?;

        Ok(handle_response(resp)?)
    }
}
