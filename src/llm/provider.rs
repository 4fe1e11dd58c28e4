//! Provider metadata: which vision models PlantSnap can talk to.
//!
//! Each provider has a client implementing `PlantIdentifier`. Settings
//! decide which one is constructed at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Gemini, Provider::Anthropic];

    pub fn id(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn env_key(self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => super::gemini::GEMINI_MODEL,
            Provider::Anthropic => super::anthropic::ANTHROPIC_MODEL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Provider metadata shown by `plantsnap settings show`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub env_key: String,
    pub default_model: String,
    pub cost_per_identification: String,
}

/// All known providers and their display info.
pub fn all_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            id: Provider::Gemini.id().to_string(),
            name: "Gemini Flash - default, free tier available".to_string(),
            env_key: Provider::Gemini.env_key().to_string(),
            default_model: Provider::Gemini.default_model().to_string(),
            cost_per_identification: "Free tier / ~$0.0002".to_string(),
        },
        ProviderInfo {
            id: Provider::Anthropic.id().to_string(),
            name: "Claude Haiku - vision, ~$0.003/photo".to_string(),
            env_key: Provider::Anthropic.env_key().to_string(),
            default_model: Provider::Anthropic.default_model().to_string(),
            cost_per_identification: "~$0.003".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_aliases() {
        assert_eq!("Gemini".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("local".parse::<Provider>().is_err());
    }

    #[test]
    fn every_provider_is_listed() {
        let listed: Vec<String> = all_providers().into_iter().map(|p| p.id).collect();
        for provider in Provider::ALL {
            assert!(listed.contains(&provider.id().to_string()));
        }
    }
}
