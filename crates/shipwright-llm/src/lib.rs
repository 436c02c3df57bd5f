//! Generative backend client used by the artifact synthesizer.
//!
//! Provides the `ProviderAdapter` trait and the OpenAI chat-completions adapter.

mod openai;
mod provider;
mod types;

pub use openai::OpenAiAdapter;
pub use provider::*;
pub use types::*;
