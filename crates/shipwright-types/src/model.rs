//! Request, bundle, publish, activation, and evaluation data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// A named reference to material the requester supplied alongside the brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// An already-authorized request to build (round 1) or update (round 2) an app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub email: String,
    pub task: String,
    pub round: u8,
    /// Opaque correlation token, echoed back to the evaluator.
    pub nonce: String,
    pub brief: String,
    #[serde(default)]
    pub checks: Vec<String>,
    pub evaluation_url: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl GenerationRequest {
    pub fn is_update(&self) -> bool {
        self.round == 2
    }
}

// ---------------------------------------------------------------------------
// FileBundle
// ---------------------------------------------------------------------------

/// Reasons a generated response could not be accepted as a bundle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidBundle {
    #[error("response is not valid JSON: {0}")]
    NotJson(String),
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("response contains no files")]
    Empty,
    #[error("file '{0}' does not have string content")]
    NonStringContent(String),
    #[error("response contains an empty file path")]
    EmptyPath,
}

/// Mapping of relative file path to text content making up a generated app.
///
/// Only constructible through [`FileBundle::parse`] or [`FileBundle::fallback`],
/// so a bundle is always non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBundle {
    files: BTreeMap<String, String>,
}

impl FileBundle {
    /// Parse backend output as a flat `path -> content` JSON object.
    ///
    /// A single surrounding markdown code fence is tolerated.
    pub fn parse(text: &str) -> Result<Self, InvalidBundle> {
        let body = strip_code_fence(text);
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| InvalidBundle::NotJson(e.to_string()))?;
        let object = value.as_object().ok_or(InvalidBundle::NotAnObject)?;
        if object.is_empty() {
            return Err(InvalidBundle::Empty);
        }

        let mut files = BTreeMap::new();
        for (path, content) in object {
            if path.trim().is_empty() {
                return Err(InvalidBundle::EmptyPath);
            }
            let content = content
                .as_str()
                .ok_or_else(|| InvalidBundle::NonStringContent(path.clone()))?;
            files.insert(path.clone(), content.to_string());
        }
        Ok(Self { files })
    }

    /// Deterministic five-file bundle used whenever generation is unavailable.
    pub fn fallback(brief: &str, attachments: &[Attachment]) -> Self {
        let attachment_lines = attachments
            .iter()
            .map(|a| format!("<p>Attachment: {}</p>", escape_html(&a.name)))
            .collect::<Vec<_>>()
            .join("\n            ");

        let index_html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Generated App</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <div class="container">
        <h1>Generated Application</h1>
        <div id="app-content">
            <p>This is a fallback application generated when the LLM service is unavailable.</p>
            <p>Brief: {brief}</p>
            {attachment_lines}
        </div>
    </div>
    <script src="script.js"></script>
</body>
</html>"#,
            brief = escape_html(brief),
        );

        let readme = format!(
            "# Generated Application\n\n\
             This application was generated based on the provided brief.\n\n\
             ## Brief\n{brief}\n\n\
             ## Setup\n\
             1. Open index.html in a web browser\n\
             2. The application should work immediately\n\n\
             ## License\n\
             MIT License - see LICENSE file for details."
        );

        let mut files = BTreeMap::new();
        files.insert("index.html".to_string(), index_html);
        files.insert("style.css".to_string(), FALLBACK_CSS.to_string());
        files.insert("script.js".to_string(), FALLBACK_JS.to_string());
        files.insert("README.md".to_string(), readme);
        files.insert("LICENSE".to_string(), MIT_LICENSE.to_string());
        Self { files }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn paths(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

const FALLBACK_CSS: &str = r#"body {
    font-family: Arial, sans-serif;
    margin: 0;
    padding: 20px;
    background-color: #f5f5f5;
}

.container {
    max-width: 800px;
    margin: 0 auto;
    background: white;
    padding: 20px;
    border-radius: 8px;
    box-shadow: 0 2px 10px rgba(0,0,0,0.1);
}

h1 {
    color: #333;
    text-align: center;
}

#app-content {
    margin-top: 20px;
}"#;

const FALLBACK_JS: &str = r#"// Generated JavaScript
console.log('App loaded successfully');

document.addEventListener('DOMContentLoaded', function() {
    console.log('DOM loaded');
});"#;

const MIT_LICENSE: &str = r#"MIT License

Copyright (c) The generated application authors

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE."#;

// ---------------------------------------------------------------------------
// Stage results
// ---------------------------------------------------------------------------

/// Outcome of publishing a bundle as a fresh remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub repo_url: String,
    pub commit_sha: String,
    pub branch: String,
    pub owner_login: String,
    pub repo_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivationStatus {
    AlreadyEnabled,
    NewlyEnabled,
    /// The enable call was rejected or never answered; the URL is speculative.
    FailedNonFatally { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteActivation {
    pub pages_url: String,
    pub status: ActivationStatus,
}

impl SiteActivation {
    pub fn is_confirmed(&self) -> bool {
        !matches!(self.status, ActivationStatus::FailedNonFatally { .. })
    }
}

/// Completion payload posted to the evaluator callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationPayload {
    pub email: String,
    pub task: String,
    pub round: u8,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

#[derive(Debug, Clone)]
pub struct NotifyResult {
    pub attempts: usize,
    /// Parsed acknowledgement body, when the evaluator returned JSON.
    pub response: Option<serde_json::Value>,
}

/// What a completed pipeline run reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
    pub evaluation_submitted: bool,
}
