//! Provider identifiers and their wire families.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// AI service the client talks to.
///
/// Parsing never fails: any tag other than `gemini` or `ollama` is treated as
/// an OpenAI-compatible server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
    #[default]
    OpenAi,
    Ollama,
    Gemini,
}

/// Request/response shape spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `POST {base}/chat/completions` with `data:` framed SSE responses.
    OpenAiCompatible,
    /// `POST {base}/models/{model}:streamGenerateContent` with one JSON object per line.
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
            Provider::Gemini => "gemini",
        }
    }

    pub fn wire_format(&self) -> WireFormat {
        match self {
            Provider::Gemini => WireFormat::Gemini,
            Provider::OpenAi | Provider::Ollama => WireFormat::OpenAiCompatible,
        }
    }

    /// Base URL used when none is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Ollama => "llama3.1",
            Provider::Gemini => "gemini-2.5-flash",
        }
    }

    /// Conventional environment variable holding the provider's API key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Ollama => None,
        }
    }
}

impl From<&str> for Provider {
    fn from(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "ollama" => Provider::Ollama,
            _ => Provider::OpenAi,
        }
    }
}

impl From<String> for Provider {
    fn from(tag: String) -> Self {
        Provider::from(tag.as_str())
    }
}

impl From<Provider> for String {
    fn from(provider: Provider) -> Self {
        provider.as_str().to_string()
    }
}

impl FromStr for Provider {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Provider::from(s))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
