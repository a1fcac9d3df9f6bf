//! Crop demand/supply forecasts from an LLM Messages API.
//!
//! The model is asked for a JSON array of `{ crop, demand, supply, unit }`
//! objects and, separately, a short market insight. Replies often wrap the
//! array in prose, so the first `[` to the last `]` is extracted before
//! parsing. Any failure falls back to a canned dataset with random jitter,
//! so callers always get something to show.

use std::fmt::Write;

use rand::Rng;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::ForecastConfig;

const API_VERSION: &str = "2023-06-01";
const FORECAST_MAX_TOKENS: u32 = 1024;
const INSIGHT_MAX_TOKENS: u32 = 400;

/// Largest relative change applied to canned figures.
const JITTER: f64 = 0.15;

/// Canned figures used when the model is unavailable: crop, demand, supply, unit.
const FALLBACK_CROPS: &[(&str, u32, u32, &str)] = &[
    ("Rice", 3800, 3500, "ton"),
    ("Potato", 1200, 1500, "ton"),
    ("Onion", 900, 650, "ton"),
    ("Tomato", 450, 520, "ton"),
    ("Lentil", 300, 210, "ton"),
    ("Jute", 700, 760, "ton"),
];

const FALLBACK_INSIGHT: &str = "Onion and lentil demand is running ahead of supply; \
     prices are likely to firm over the coming weeks. Potato and tomato supply is \
     comfortable, so farmers holding stock may see softer prices.";

/// Errors from the forecast API.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// No API key configured.
    #[error("forecast API not configured")]
    NotConfigured,

    /// The API key cannot be sent as a header.
    #[error("invalid API key: {0}")]
    InvalidKey(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response.
    #[error("forecast API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The reply held no usable forecast.
    #[error("could not parse forecast: {0}")]
    Parse(String),
}

/// One crop's forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropForecast {
    pub crop: String,
    pub demand: u32,
    pub supply: u32,
    pub unit: String,
}

impl CropForecast {
    /// Demand minus supply; positive means a shortage.
    #[must_use]
    pub fn gap(&self) -> i64 {
        i64::from(self.demand) - i64::from(self.supply)
    }
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSource {
    Model,
    Fallback,
}

/// A crop forecast and its origin.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub crops: Vec<CropForecast>,
    pub source: ForecastSource,
}

/// A market insight and its origin.
#[derive(Debug, Clone)]
pub struct Insight {
    pub text: String,
    pub source: ForecastSource,
}

/// Forecast API client.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    client: reqwest::Client,
    config: Option<ForecastConfig>,
}

impl ForecastClient {
    /// Create a client; `None` means every call falls back.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: Option<ForecastConfig>) -> Result<Self, ForecastError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        if let Some(config) = &config {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(config.api_key.expose_secret())
                    .map_err(|e| ForecastError::InvalidKey(e.to_string()))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Ask the model for a forecast.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured`, a transport or API error, or `Parse` when
    /// the reply has no JSON array of forecasts.
    #[instrument(skip(self))]
    pub async fn try_forecast(&self, region: &str) -> Result<Vec<CropForecast>, ForecastError> {
        let reply = self
            .complete(forecast_prompt(region), FORECAST_MAX_TOKENS)
            .await?;
        let crops = parse_forecast(&reply)?;
        debug!(crops = crops.len(), "Parsed model forecast");
        Ok(crops)
    }

    /// Forecast for `region`, falling back to canned data on any failure.
    pub async fn forecast(&self, region: &str) -> Forecast {
        match self.try_forecast(region).await {
            Ok(crops) => Forecast {
                crops,
                source: ForecastSource::Model,
            },
            Err(e) => {
                if !matches!(e, ForecastError::NotConfigured) {
                    warn!(error = %e, "Forecast failed, using fallback data");
                }
                Forecast {
                    crops: fallback_forecast(&mut rand::rng()),
                    source: ForecastSource::Fallback,
                }
            }
        }
    }

    /// Ask the model for a market insight.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured`, a transport or API error, or `Parse` for an
    /// empty reply.
    #[instrument(skip(self))]
    pub async fn try_insight(&self, region: &str) -> Result<String, ForecastError> {
        let reply = self
            .complete(insight_prompt(region), INSIGHT_MAX_TOKENS)
            .await?;
        let text = reply.trim();
        if text.is_empty() {
            return Err(ForecastError::Parse("empty insight".to_string()));
        }
        Ok(text.to_string())
    }

    /// Insight for `region`, falling back to fixed text on any failure.
    pub async fn insight(&self, region: &str) -> Insight {
        match self.try_insight(region).await {
            Ok(text) => Insight {
                text,
                source: ForecastSource::Model,
            },
            Err(e) => {
                if !matches!(e, ForecastError::NotConfigured) {
                    warn!(error = %e, "Insight failed, using fallback text");
                }
                Insight {
                    text: FALLBACK_INSIGHT.to_string(),
                    source: ForecastSource::Fallback,
                }
            }
        }
    }

    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String, ForecastError> {
        let config = self.config.as_ref().ok_or(ForecastError::NotConfigured)?;

        let request = MessagesRequest {
            model: config.model.clone(),
            max_tokens,
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(config.api_url.as_str())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ForecastError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ForecastError::Parse(e.to_string()))?;

        Ok(response
            .content
            .into_iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text,
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

const SYSTEM_PROMPT: &str = "You are an agricultural market analyst for Bangladesh. \
     You answer with concise, practical figures for smallholder farmers and buyers.";

fn forecast_prompt(region: &str) -> String {
    let mut prompt = format!(
        "Forecast next month's demand and supply for the main crops traded in {region}, Bangladesh.\n\n"
    );
    prompt.push_str("Crops to cover:\n");
    for (crop, ..) in FALLBACK_CROPS {
        let _ = writeln!(prompt, "- {crop}");
    }
    prompt.push_str(
        "\nRespond with ONLY a JSON array. Each element must be an object with:\n\
         - \"crop\": crop name\n\
         - \"demand\": expected demand as a whole number\n\
         - \"supply\": expected supply as a whole number\n\
         - \"unit\": the unit of both figures (e.g. \"ton\")",
    );
    prompt
}

fn insight_prompt(region: &str) -> String {
    format!(
        "In three sentences or fewer, describe the crop market outlook for {region}, \
         Bangladesh, for the coming month. Name the crops where farmers should expect \
         prices to rise or fall."
    )
}

/// Slice from the first `[` to the last `]`, if both exist in that order.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    text.get(start..=end)
}

fn parse_forecast(reply: &str) -> Result<Vec<CropForecast>, ForecastError> {
    let json = extract_json_array(reply)
        .ok_or_else(|| ForecastError::Parse("no JSON array in reply".to_string()))?;
    let crops: Vec<CropForecast> =
        serde_json::from_str(json).map_err(|e| ForecastError::Parse(e.to_string()))?;
    if crops.is_empty() {
        return Err(ForecastError::Parse("empty forecast".to_string()));
    }
    Ok(crops)
}

/// Canned figures, each moved by up to ±15 %.
fn fallback_forecast(rng: &mut impl Rng) -> Vec<CropForecast> {
    FALLBACK_CROPS
        .iter()
        .map(|&(crop, demand, supply, unit)| CropForecast {
            crop: crop.to_string(),
            demand: jitter(rng, demand),
            supply: jitter(rng, supply),
            unit: unit.to_string(),
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Result stays within 0..=1.15 * u32 base
fn jitter(rng: &mut impl Rng, base: u32) -> u32 {
    let factor = 1.0 + rng.random_range(-JITTER..=JITTER);
    (f64::from(base) * factor).round() as u32
}

/// Request body for the Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::routing::post;
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::test_support::spawn;

    async fn client_replying(text: &'static str) -> ForecastClient {
        let app = Router::new().route(
            "/v1/messages",
            post(move || async move {
                axum::Json(json!({ "content": [{ "type": "text", "text": text }] }))
            }),
        );
        let base = spawn(app).await;

        ForecastClient::new(Some(ForecastConfig {
            api_key: SecretString::from("sk-ant-9fQ2xL7mZ4pV8rT1"),
            model: "claude-3-5-haiku-latest".to_string(),
            api_url: Url::parse(&format!("{base}v1/messages")).unwrap(),
        }))
        .unwrap()
    }

    #[test]
    fn test_extract_json_array() {
        assert_eq!(
            extract_json_array("Here you go:\n[{\"a\":1}]\nHope it helps"),
            Some("[{\"a\":1}]")
        );
        assert_eq!(extract_json_array("no array"), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn test_parse_forecast() {
        let crops = parse_forecast(
            r#"Sure. [{"crop":"Rice","demand":4000,"supply":3600,"unit":"ton"}]"#,
        )
        .unwrap();
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].gap(), 400);

        assert!(parse_forecast("[]").is_err());
        assert!(parse_forecast("[{\"crop\":\"Rice\"}]").is_err());
    }

    #[test]
    fn test_fallback_within_jitter() {
        let mut rng = rand::rng();
        for _ in 0..20 {
            let crops = fallback_forecast(&mut rng);
            assert_eq!(crops.len(), FALLBACK_CROPS.len());
            for (crop, &(name, demand, supply, _)) in crops.iter().zip(FALLBACK_CROPS) {
                assert_eq!(crop.crop, name);
                assert!(f64::from(crop.demand) >= f64::from(demand) * 0.85 - 1.0);
                assert!(f64::from(crop.demand) <= f64::from(demand) * 1.15 + 1.0);
                assert!(f64::from(crop.supply) >= f64::from(supply) * 0.85 - 1.0);
                assert!(f64::from(crop.supply) <= f64::from(supply) * 1.15 + 1.0);
            }
        }
    }

    #[test]
    fn test_prompt_lists_crops() {
        let prompt = forecast_prompt("Rajshahi");
        assert!(prompt.contains("Rajshahi"));
        for (crop, ..) in FALLBACK_CROPS {
            assert!(prompt.contains(crop));
        }
    }

    #[tokio::test]
    async fn test_unconfigured_uses_fallback() {
        let client = ForecastClient::new(None).unwrap();

        let forecast = client.forecast("Bogura").await;
        let insight = client.insight("Bogura").await;

        assert_eq!(forecast.source, ForecastSource::Fallback);
        assert!(!forecast.crops.is_empty());
        assert_eq!(insight.source, ForecastSource::Fallback);
        assert_eq!(insight.text, FALLBACK_INSIGHT);
    }

    #[tokio::test]
    async fn test_model_reply_parsed() {
        let client = client_replying(
            r#"[{"crop":"Onion","demand":950,"supply":600,"unit":"ton"}]"#,
        )
        .await;

        let forecast = client.forecast("Pabna").await;

        assert_eq!(forecast.source, ForecastSource::Model);
        assert_eq!(forecast.crops[0].crop, "Onion");
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let client = client_replying("I cannot forecast that.").await;

        let forecast = client.forecast("Pabna").await;

        assert_eq!(forecast.source, ForecastSource::Fallback);
    }
}
