//! AI text-generation flows. Two independent operations — client-profile
//! insights and Instagram post drafting — each calling an OpenAI-style
//! chat-completion API with a fixed prompt template and requiring the reply
//! to be a JSON object matching a one-field schema. Any failure along the
//! pipeline (missing config, HTTP, provider error, JSON parse, schema) aborts
//! the operation; nothing partial is ever returned.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::AiConfig;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI generation is not configured; set AI_API_KEY")]
    Disabled,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    Api(String),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("model output is not valid JSON: {0}")]
    MalformedOutput(String),
    #[error("model output does not match the expected schema: {0}")]
    Schema(String),
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientInsightsInput {
    pub client_name: String,
    pub visit_summary: String,
    pub favorite_services: String,
    pub stamps_earned: String,
}

#[derive(Debug, Deserialize)]
struct ClientInsightsOutput {
    insights: String,
}

#[derive(Debug, Clone)]
pub struct InstagramPostInput {
    pub salon_name: String,
    pub service_name: String,
    pub promo_details: String,
    pub tone: String,
}

#[derive(Debug, Deserialize)]
struct InstagramPostOutput {
    #[serde(rename = "instagramPost")]
    instagram_post: String,
}

/// Generate care/retention insights for one client profile.
pub async fn generate_client_insights(
    config: &AiConfig,
    input: &ClientInsightsInput,
) -> Result<String, AiError> {
    let prompt = insights_prompt(input)?;
    let content = chat_completion(
        config,
        "You are an assistant for a Brazilian beauty salon. Reply only with a \
         JSON object of the form {\"insights\": string}. Write the insights in \
         Brazilian Portuguese.",
        &prompt,
    )
    .await?;
    let output: ClientInsightsOutput = decode_structured_output(&content)?;
    Ok(output.insights)
}

/// Draft an Instagram post promoting a service.
pub async fn generate_instagram_post(
    config: &AiConfig,
    input: &InstagramPostInput,
) -> Result<String, AiError> {
    let prompt = instagram_prompt(input)?;
    let content = chat_completion(
        config,
        "You are a social-media copywriter for a Brazilian beauty salon. Reply \
         only with a JSON object of the form {\"instagramPost\": string}. Write \
         the post in Brazilian Portuguese with tasteful emoji and hashtags.",
        &prompt,
    )
    .await?;
    let output: InstagramPostOutput = decode_structured_output(&content)?;
    Ok(output.instagram_post)
}

fn insights_prompt(input: &ClientInsightsInput) -> Result<String, AiError> {
    let client_name = require(&input.client_name, "client name")?;
    let visit_summary = require(&input.visit_summary, "visit summary")?;
    let favorite_services = require(&input.favorite_services, "favorite services")?;
    let stamps_earned = require(&input.stamps_earned, "stamps earned")?;

    Ok(format!(
        "Analyze this salon client profile and suggest how to delight and retain her.\n\
         Client: {client_name}\n\
         Visit history: {visit_summary}\n\
         Favorite services: {favorite_services}\n\
         Loyalty stamps collected: {stamps_earned}\n\
         Suggest two or three concrete, personal touches for the next visits."
    ))
}

fn instagram_prompt(input: &InstagramPostInput) -> Result<String, AiError> {
    let salon_name = require(&input.salon_name, "salon name")?;
    let service_name = require(&input.service_name, "service name")?;
    let promo_details = require(&input.promo_details, "promo details")?;
    let tone = require(&input.tone, "tone")?;

    Ok(format!(
        "Write an Instagram post for the salon {salon_name} promoting the \
         service \"{service_name}\".\n\
         Promotion details: {promo_details}\n\
         Tone: {tone}\n\
         Keep it short enough for a caption and end with a call to book."
    ))
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, AiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AiError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

async fn chat_completion(
    config: &AiConfig,
    system: &str,
    user: &str,
) -> Result<String, AiError> {
    if !config.enabled() {
        return Err(AiError::Disabled);
    }

    let client = reqwest::Client::builder().build()?;
    let request = ChatCompletionRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        temperature: Some(0.7),
        response_format: Some(ResponseFormat {
            format_type: "json_object".to_string(),
        }),
    };

    let url = format!("{}/chat/completions", config.api_url.trim_end_matches('/'));
    let response = client
        .post(url)
        .bearer_auth(&config.api_key)
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AiError::Api(format!("{status}: {body}")));
    }

    let completion: ChatCompletionResponse = response.json().await?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(AiError::EmptyResponse)
}

/// Validation pipeline for model output. A raw string must parse as JSON; a
/// value that is itself a JSON-encoded string is unwrapped once; the result
/// must be an object matching the target schema. Everything else is a hard
/// failure with a descriptive error.
fn decode_structured_output<T: DeserializeOwned>(raw: &str) -> Result<T, AiError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|err| AiError::MalformedOutput(err.to_string()))?;

    let value = match value {
        serde_json::Value::String(inner) => serde_json::from_str(&inner)
            .map_err(|err| AiError::MalformedOutput(err.to_string()))?,
        other => other,
    };

    if !value.is_object() {
        return Err(AiError::Schema("expected a JSON object".to_string()));
    }

    serde_json::from_value(value).map_err(|err| AiError::Schema(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_plain_object() {
        let output: ClientInsightsOutput =
            decode_structured_output(r#"{"insights": "Ofereça um café."}"#).unwrap();
        assert_eq!(output.insights, "Ofereça um café.");
    }

    #[test]
    fn decodes_a_json_encoded_string() {
        let raw = r#""{\"instagramPost\": \"Venha se cuidar!\"}""#;
        let output: InstagramPostOutput = decode_structured_output(raw).unwrap();
        assert_eq!(output.instagram_post, "Venha se cuidar!");
    }

    #[test]
    fn non_json_output_is_a_malformed_error() {
        let result: Result<ClientInsightsOutput, _> =
            decode_structured_output("Here are some thoughts about the client...");
        assert!(matches!(result, Err(AiError::MalformedOutput(_))));
    }

    #[test]
    fn non_object_json_is_a_schema_error() {
        let result: Result<ClientInsightsOutput, _> = decode_structured_output("[1, 2, 3]");
        assert!(matches!(result, Err(AiError::Schema(_))));

        let result: Result<ClientInsightsOutput, _> = decode_structured_output("42");
        assert!(matches!(result, Err(AiError::Schema(_))));
    }

    #[test]
    fn wrong_field_is_a_schema_error() {
        let result: Result<ClientInsightsOutput, _> =
            decode_structured_output(r#"{"instagramPost": "errado"}"#);
        assert!(matches!(result, Err(AiError::Schema(_))));
    }

    #[test]
    fn blank_inputs_fail_before_any_call() {
        let input = ClientInsightsInput {
            client_name: "  ".to_string(),
            visit_summary: "3 visitas".to_string(),
            favorite_services: "Corte".to_string(),
            stamps_earned: "4".to_string(),
        };
        assert!(matches!(
            insights_prompt(&input),
            Err(AiError::MissingField("client name"))
        ));
    }

    #[test]
    fn prompts_interpolate_every_field() {
        let input = InstagramPostInput {
            salon_name: "SalonFlow Studio".to_string(),
            service_name: "Coloração".to_string(),
            promo_details: "20% off em maio".to_string(),
            tone: "alegre".to_string(),
        };
        let prompt = instagram_prompt(&input).unwrap();
        for needle in ["SalonFlow Studio", "Coloração", "20% off em maio", "alegre"] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
    }
}
