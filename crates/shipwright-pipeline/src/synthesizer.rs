//! Artifact synthesis: brief in, file bundle out.
//!
//! The generative backend is optional. Any failure on the generative path
//! (no backend, backend error, unusable response) degrades to the
//! deterministic fallback bundle, so [`Synthesizer::synthesize`] never fails.

use std::sync::Arc;

use shipwright_llm::{OpenAiAdapter, ProviderAdapter, Request};
use shipwright_types::{Attachment, Config, FileBundle};

const URL_PREVIEW_CHARS: usize = 100;
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 4000;

const SYSTEM_PREAMBLE: &str = "You are an expert web developer. Generate a complete web application based on the provided brief.

Requirements:
- Create a single-page application (SPA)
- Use modern HTML5, CSS3, and JavaScript
- Include all necessary dependencies via CDN
- Ensure the app is fully functional
- Follow best practices for accessibility and performance
- Include proper error handling
";

const SYSTEM_FILES: &str = "Generate the following files:
1. index.html - Main HTML file
2. style.css - CSS styles
3. script.js - JavaScript functionality
4. README.md - Professional documentation
5. LICENSE - MIT license

Return your response as a JSON object with file paths as keys and file contents as values.";

const UPDATE_MODE: &str =
    "This is an update request - modify the existing functionality as specified.";
const CREATE_MODE: &str = "This is a new application request.";

/// Result of a synthesis, recording whether the fallback was used.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub bundle: FileBundle,
    /// Why the generative path was abandoned, if it was.
    pub degraded: Option<String>,
}

pub struct Synthesizer {
    provider: Option<Arc<dyn ProviderAdapter>>,
    model: Option<String>,
}

impl Synthesizer {
    pub fn new(provider: Option<Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            provider,
            model: None,
        }
    }

    /// Synthesizer that never calls a backend.
    pub fn fallback_only() -> Self {
        Self::new(None)
    }

    /// Override the provider's default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// OpenAI-backed when an API key is configured, fallback-only otherwise.
    pub fn from_config(config: &Config) -> Self {
        match config.openai_api_key.as_ref().filter(|k| !k.is_empty()) {
            Some(key) => {
                let adapter = OpenAiAdapter::new(key.clone())
                    .with_base_url(config.openai_base_url.clone())
                    .with_model(config.openai_model.clone())
                    .with_timeout(config.http_timeout);
                Self::new(Some(Arc::new(adapter)))
            }
            None => Self::fallback_only(),
        }
    }

    pub async fn synthesize(
        &self,
        brief: &str,
        attachments: &[Attachment],
        checks: &[String],
        is_update: bool,
    ) -> FileBundle {
        self.synthesize_detailed(brief, attachments, checks, is_update)
            .await
            .bundle
    }

    pub async fn synthesize_detailed(
        &self,
        brief: &str,
        attachments: &[Attachment],
        checks: &[String],
        is_update: bool,
    ) -> Synthesis {
        match self.generate(brief, attachments, checks, is_update).await {
            Ok(bundle) => {
                tracing::info!(files = bundle.len(), "Generated bundle from backend");
                Synthesis {
                    bundle,
                    degraded: None,
                }
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "Falling back to template bundle");
                Synthesis {
                    bundle: FileBundle::fallback(brief, attachments),
                    degraded: Some(reason),
                }
            }
        }
    }

    async fn generate(
        &self,
        brief: &str,
        attachments: &[Attachment],
        checks: &[String],
        is_update: bool,
    ) -> Result<FileBundle, String> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| "no generative backend configured".to_string())?;

        let model = self
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let request = Request::instructions(
            model,
            system_instructions(is_update),
            user_instructions(brief, attachments, checks),
        )
        .with_temperature(TEMPERATURE)
        .with_max_tokens(MAX_TOKENS);

        let response = provider
            .complete(&request)
            .await
            .map_err(|e| format!("{} request failed: {e}", provider.name()))?;

        FileBundle::parse(&response.text)
            .map_err(|e| format!("{} returned an unusable bundle: {e}", provider.name()))
    }
}

/// System instructions; only the mode line differs between create and update.
pub fn system_instructions(is_update: bool) -> String {
    let mode = if is_update { UPDATE_MODE } else { CREATE_MODE };
    format!("{SYSTEM_PREAMBLE}\n{mode}\n\n{SYSTEM_FILES}")
}

/// User instructions embedding the brief, one bullet per check and per attachment.
pub fn user_instructions(brief: &str, attachments: &[Attachment], checks: &[String]) -> String {
    let checks = checks
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    let attachments = attachments
        .iter()
        .map(|a| format!("- {}: {}...", a.name, url_preview(&a.url)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Brief: {brief}\n\nChecks to pass:\n{checks}\n\nAttachments:\n{attachments}\n\n\
         Please generate a complete web application that fulfills the brief and passes all checks."
    )
}

fn url_preview(url: &str) -> &str {
    match url.char_indices().nth(URL_PREVIEW_CHARS) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}
