use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;

use crate::models::assessment::DimensionScores;
use crate::utils::error::{AppError, AppResult};

/// A completed provider assessment: the four dimensions, what the
/// recognizer heard, and the untouched provider response.
#[derive(Debug, Clone)]
pub struct AssessmentResult {
    pub scores: DimensionScores,
    pub recognized_text: String,
    pub raw: serde_json::Value,
}

/// The provider seam: token exchange for browser-side assessment and
/// server-side assessment for batch grading. The production implementation
/// talks to Azure Speech with the long-lived subscription key; tests
/// substitute a scripted provider.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn region(&self) -> &str;

    /// Exchange the subscription key for a short-lived scoped credential.
    async fn issue_token(&self) -> AppResult<String>;

    async fn assess(&self, reference_text: &str, audio: Vec<u8>) -> AppResult<AssessmentResult>;
}

#[derive(Clone)]
pub struct AzureSpeechClient {
    http: reqwest::Client,
    subscription_key: String,
    region: String,
}

impl AzureSpeechClient {
    pub fn new(http: reqwest::Client, subscription_key: String, region: String) -> Self {
        Self {
            http,
            subscription_key,
            region,
        }
    }

    fn assessment_header(reference_text: &str) -> String {
        let config = json!({
            "ReferenceText": reference_text,
            "GradingSystem": "HundredMark",
            "Granularity": "Word",
            "EnableMiscue": true,
        });
        BASE64.encode(config.to_string())
    }
}

#[async_trait]
impl SpeechProvider for AzureSpeechClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn issue_token(&self) -> AppResult<String> {
        let url = format!(
            "https://{}.api.cognitive.microsoft.com/sts/v1.0/issueToken",
            self.region
        );

        let response = self
            .http
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "token exchange returned {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::Provider(format!("token exchange failed: {}", e)))
    }

    async fn assess(&self, reference_text: &str, audio: Vec<u8>) -> AppResult<AssessmentResult> {
        let url = format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
            self.region
        );

        let response = self
            .http
            .post(&url)
            .query(&[("language", "en-US")])
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .header(
                "Pronunciation-Assessment",
                Self::assessment_header(reference_text),
            )
            .header("Content-Type", "audio/wav; codecs=audio/pcm; samplerate=16000")
            .body(audio)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("assessment request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "assessment returned {}",
                response.status()
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("assessment response unreadable: {}", e)))?;

        parse_assessment(&raw).ok_or_else(|| {
            AppError::Provider("assessment response missing pronunciation scores".to_string())
        })
    }
}

/// Pull the four dimensions and recognized text out of a provider
/// response. Returns None when the blob does not carry a usable
/// NBest[0].PronunciationAssessment.
pub fn parse_assessment(raw: &serde_json::Value) -> Option<AssessmentResult> {
    let best = raw.get("NBest")?.as_array()?.first()?;
    let pa = best.get("PronunciationAssessment")?;

    let scores = DimensionScores {
        accuracy: pa.get("AccuracyScore")?.as_f64()?,
        fluency: pa.get("FluencyScore")?.as_f64()?,
        pronunciation: pa.get("PronScore")?.as_f64()?,
        completeness: pa.get("CompletenessScore")?.as_f64()?,
    };
    if !scores.is_valid() {
        return None;
    }

    let recognized_text = best
        .get("Display")
        .or_else(|| raw.get("DisplayText"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Some(AssessmentResult {
        scores,
        recognized_text,
        raw: raw.clone(),
    })
}
