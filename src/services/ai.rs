use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::recommendation::ItineraryDay;
use crate::services::retry::with_retry;

const PPLX_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.1-sonar-small-128k-online";
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

const CITIES_SYSTEM_PROMPT: &str = r#"you are a travel agent. the user will give you his/her trip preferences. you should suggest 6 Major Cities that would fit the user's preferences. return the result in json format such as follows.
[{"city": "Jakarta","country": "Indonesia","countryCode": "ID"}]
return only the JSON inside a ```json fenced block"#;

const ITINERARY_SYSTEM_PROMPT: &str = r#"you are a travel agent. the user will give you his/her trip preferences. you should create itineraries for the requested length of stay that would fit the user's preferences. Each day, I would like to visit 2 famous places in morning, 2 famous places in afternoon. Please try to group the locations by distance, so I can minimize the travel distance each day. Please provide real information about the location coordinates from google maps. return the result in json format such as follows.
{"city": "Jakarta","country": "Indonesia","countryCode": "ID","itineraries":[{"day": "Day 1", "locations":[{"slug": "monas","name": "Monas", "category": "Architectural Buildings", "coordinates": [-6.1753924, 106.8271528]},{"slug": "cafe-batavia","name": "Cafe Batavia", "category": "Cafe", "coordinates": [-6.1351, 106.8133]}]}]}
return only the JSON inside a ```json fenced block"#;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CityProposal {
    pub city: String,
    pub country: String,
    pub country_code: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryProposal {
    pub city: String,
    pub country: String,
    pub country_code: String,
    #[serde(default)]
    pub itineraries: Vec<ItineraryDay>,
}

/// Language-model collaborator. Replies are nondeterministic per call; the
/// store relies on its own persisted state, never on replaying the model.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn propose_cities(&self, transcript: &str) -> Result<Vec<CityProposal>, ServiceError>;

    async fn propose_itinerary(
        &self,
        transcript: &str,
        city: &str,
        country: &str,
    ) -> Result<ItineraryProposal, ServiceError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn<'a>>,
}

#[derive(Serialize)]
struct ChatTurn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Perplexity chat-completions client. The model is instructed to answer with
/// a single fenced ```json block; anything else counts as a transient failure
/// and is retried with linear backoff.
#[derive(Clone)]
pub struct PerplexityClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl PerplexityClient {
    pub fn from_env() -> Result<Self, ServiceError> {
        let api_key = env::var("PPLX_API_KEY")
            .map_err(|_| ServiceError::Upstream("PPLX_API_KEY not set".to_string()))?;
        let model = env::var("PPLX_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        })
    }

    async fn chat_completion(&self, system: &str, user: &str) -> Result<String, ServiceError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatTurn {
                    role: "system",
                    content: system,
                },
                ChatTurn {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .http
            .post(PPLX_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("AI request failed: {}", e)))?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("AI response unreadable: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::Upstream("AI reply had no choices".to_string()))
    }
}

#[async_trait]
impl AiClient for PerplexityClient {
    async fn propose_cities(&self, transcript: &str) -> Result<Vec<CityProposal>, ServiceError> {
        with_retry(MAX_ATTEMPTS, RETRY_BASE_DELAY, || async move {
            let reply = self.chat_completion(CITIES_SYSTEM_PROMPT, transcript).await?;
            parse_fenced_json::<Vec<CityProposal>>(&reply)
        })
        .await
        .map_err(generation_failed)
    }

    async fn propose_itinerary(
        &self,
        transcript: &str,
        city: &str,
        country: &str,
    ) -> Result<ItineraryProposal, ServiceError> {
        let prompt = format!(
            "{}. Please create the detail itineraries for {},{}.",
            transcript, city, country
        );
        let prompt: &str = &prompt;

        with_retry(MAX_ATTEMPTS, RETRY_BASE_DELAY, || async move {
            let reply = self
                .chat_completion(ITINERARY_SYSTEM_PROMPT, prompt)
                .await?;
            parse_itinerary_reply(&reply)
        })
        .await
        .map_err(generation_failed)
    }
}

fn generation_failed(last: ServiceError) -> ServiceError {
    log::error!("AI generation exhausted retries: {}", last);
    ServiceError::Upstream("Failed to get response after maximum retries".to_string())
}

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("fenced json pattern"))
}

/// Pulls the single ```json block out of a model reply. A missing block is a
/// transient failure as far as the retry loop is concerned.
pub fn extract_fenced_json(reply: &str) -> Option<&str> {
    fenced_json_re()
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn parse_fenced_json<T: DeserializeOwned>(reply: &str) -> Result<T, ServiceError> {
    let block = extract_fenced_json(reply)
        .ok_or_else(|| ServiceError::Upstream("No fenced JSON block in AI reply".to_string()))?;
    serde_json::from_str(block)
        .map_err(|e| ServiceError::Upstream(format!("Malformed JSON in AI reply: {}", e)))
}

/// Models sometimes wrap the itinerary object in a one-element array despite
/// the prompt; accept both shapes.
fn parse_itinerary_reply(reply: &str) -> Result<ItineraryProposal, ServiceError> {
    let value: serde_json::Value = parse_fenced_json(reply)?;
    let object = match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    };
    serde_json::from_value(object)
        .map_err(|e| ServiceError::Upstream(format!("Unexpected itinerary shape: {}", e)))
}
