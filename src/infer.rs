//! Skill inference: guess the skills a task needs from its title.
//!
//! Inference never fails from the caller's point of view. Any problem talking
//! to the model degrades to [`FAILURE_MARKER`] as the single skill name.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, error, warn};

/// Used when the model answers but the answer holds no bracketed list.
pub const FALLBACK_SKILL: &str = "Backend";
/// Returned as the only skill when the model could not be consulted at all.
pub const FAILURE_MARKER: &str = "Error identifying skills with LLM";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub trait SkillInference: Send + Sync {
    fn identify(&self, title: &str) -> Vec<String>;
}

/// Always answers with the same list.
#[derive(Debug, Clone)]
pub struct FixedInference(pub Vec<String>);

impl SkillInference for FixedInference {
    fn identify(&self, _title: &str) -> Vec<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone)]
pub struct GeminiInference {
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    endpoint: String,
}

impl GeminiInference {
    pub fn new(api_key: Option<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            timeout,
            endpoint: GEMINI_ENDPOINT.to_string(),
        }
    }

    /// Point at a different base URL, e.g. a local stub.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn ask(&self, title: &str) -> Result<String> {
        let Some(key) = self.api_key.as_deref() else {
            bail!("no Gemini API key configured");
        };
        // Built per call: the blocking client owns a runtime and must not be
        // dropped from async context.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("failed to build HTTP client")?;
        let url = format!(
            "{}/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );
        let resp = client
            .post(&url)
            .query(&[("key", key)])
            .json(&serde_json::json!({
                "contents": [{ "parts": [{ "text": prompt(title) }] }]
            }))
            .send()
            .context("API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("Gemini API error ({}): {body}", status.as_u16());
        }

        let body: serde_json::Value = resp.json().context("failed to parse response JSON")?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .filter(|t| !t.is_empty())
            .context("no text in model response")?;
        Ok(text.to_string())
    }
}

impl SkillInference for GeminiInference {
    fn identify(&self, title: &str) -> Vec<String> {
        let answer = self.ask(title).and_then(|text| {
            debug!("model response for '{title}': {text}");
            parse_skill_list(&text)
        });
        match answer {
            Ok(Some(skills)) => skills,
            Ok(None) => {
                warn!("model gave no skill list for '{title}', using {FALLBACK_SKILL}");
                vec![FALLBACK_SKILL.to_string()]
            }
            Err(e) => {
                error!("identifying skills for '{title}' failed: {e:#}");
                vec![FAILURE_MARKER.to_string()]
            }
        }
    }
}

fn prompt(title: &str) -> String {
    format!(
        "Given the following task title, identify the required technical skills from this list: [Frontend, Backend or Both].\n\n\
         Task title: \"{title}\"\n\n\
         Return only the skill names as a JSON array, for example: [\"Frontend\", \"Backend\"]\n\
         Do not include any explanation, only the JSON array."
    )
}

/// Pull the first `[...]` span on a single line out of `text` and parse it as
/// a JSON array of strings. `Ok(None)` when there is no such span.
pub fn parse_skill_list(text: &str) -> Result<Option<Vec<String>>> {
    for line in text.lines() {
        let Some(start) = line.find('[') else {
            continue;
        };
        let Some(len) = line[start..].find(']') else {
            continue;
        };
        let span = &line[start..=start + len];
        let skills: Vec<String> = serde_json::from_str(span)
            .with_context(|| format!("model returned a malformed skill list: {span}"))?;
        return Ok(Some(skills));
    }
    Ok(None)
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::SkillInference;

    /// Answers from a fixed list and records every title it was asked about.
    pub struct RecordingInference {
        answer: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingInference {
        pub fn new(answer: &[&str]) -> Self {
            Self {
                answer: answer.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SkillInference for RecordingInference {
        fn identify(&self, title: &str) -> Vec<String> {
            self.calls.lock().unwrap().push(title.to_string());
            self.answer.clone()
        }
    }
}
