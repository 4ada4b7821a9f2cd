use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{model::Meal, ClientError};

/// Every stored day, each decoded on its own so one day in a foreign shape
/// does not hide the rest.
pub type Week = BTreeMap<String, Result<Vec<Meal>, ClientError>>;

/// Remote operations the view-model needs from the day API.
#[async_trait]
pub trait DayApi: Send + Sync {
    async fn fetch_all(&self) -> Result<Week, ClientError>;
    async fn fetch_day(&self, day: &str) -> Result<Vec<Meal>, ClientError>;
    /// Full replace; returns the array the server stored.
    async fn replace_day(&self, day: &str, meals: &[Meal]) -> Result<Vec<Meal>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct DayBody {
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct HttpDayApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDayApi {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::BaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::BaseUrl(base_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    /// `base/meals[/day]`, with the day percent-encoded as one segment.
    fn meals_url(&self, day: Option<&str>) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::BaseUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("meals");
            if let Some(day) = day {
                segments.push(day);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl DayApi for HttpDayApi {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<Week, ClientError> {
        let res = self.client.get(self.meals_url(None)?).send().await?;
        let all: BTreeMap<String, Vec<Value>> = ensure_success(res).await?.json().await?;
        Ok(all
            .into_iter()
            .map(|(day, raw)| {
                let meals = decode_meals(&day, raw);
                (day, meals)
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn fetch_day(&self, day: &str) -> Result<Vec<Meal>, ClientError> {
        let res = self.client.get(self.meals_url(Some(day))?).send().await?;
        let body: DayBody = ensure_success(res).await?.json().await?;
        decode_meals(day, body.data)
    }

    #[instrument(skip(self, meals), fields(len = meals.len()))]
    async fn replace_day(&self, day: &str, meals: &[Meal]) -> Result<Vec<Meal>, ClientError> {
        let res = self
            .client
            .put(self.meals_url(Some(day))?)
            .json(meals)
            .send()
            .await?;
        let body: DayBody = ensure_success(res).await?.json().await?;
        debug!(%day, "day pushed");
        decode_meals(day, body.data)
    }
}

async fn ensure_success(res: Response) -> Result<Response, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

fn decode_meals(day: &str, raw: Vec<Value>) -> Result<Vec<Meal>, ClientError> {
    serde_json::from_value(Value::Array(raw)).map_err(|source| ClientError::Decode {
        day: day.to_string(),
        source,
    })
}
