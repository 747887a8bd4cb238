//! Provider definitions and the immutable provider registry.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Highest zoom level any provider may declare.
///
/// Keeps `2^zoom` comfortably inside `u32` tile coordinates.
pub const MAX_SUPPORTED_ZOOM: u32 = 30;

/// Placeholder substituted with a random shard character.
pub(crate) const SHARD_PLACEHOLDER: &str = "{s}";

// =============================================================================
// Provider
// =============================================================================

/// A validated tile provider.
///
/// This is also the snapshot stored inside every job's parameters, so it
/// serializes with all of its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Unique provider name
    pub name: String,

    /// Lowest zoom level served
    pub min_zoom: u32,

    /// Highest zoom level served
    pub max_zoom: u32,

    /// Native tile size in pixels
    pub scale: u32,

    /// URL template with `{x}`, `{y}`, `{z}` and optional `{s}` placeholders
    pub url_template: String,

    /// Attribution text shown next to rendered maps
    pub attribution: String,

    /// Characters substituted for `{s}`; empty when the template has no shard
    pub shard_alphabet: String,
}

impl Provider {
    /// Whether tile URLs of this provider are spread over shard hosts.
    pub fn is_sharded(&self) -> bool {
        !self.shard_alphabet.is_empty() && self.url_template.contains(SHARD_PLACEHOLDER)
    }

    /// Build a provider from its on-disk definition, validating every field.
    pub fn from_definition(def: ProviderDefinition) -> Result<Self, ProviderError> {
        let invalid = |reason: &str| ProviderError::Invalid {
            name: def.name.clone(),
            reason: reason.to_string(),
        };

        if def.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if def.min_zoom > def.max_zoom {
            return Err(invalid("min_zoom must not exceed max_zoom"));
        }
        if def.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(invalid(&format!(
                "max_zoom must not exceed {}",
                MAX_SUPPORTED_ZOOM
            )));
        }
        if def.scale == 0 {
            return Err(invalid("scale must be greater than 0"));
        }

        let (url_template, shard_alphabet) = match extract_shard_alphabet(&def.url) {
            Some((template, alphabet)) => (template, alphabet),
            None => (def.url.clone(), def.shards.clone().unwrap_or_default()),
        };

        for placeholder in ["{x}", "{y}", "{z}"] {
            if !url_template.contains(placeholder) {
                return Err(invalid(&format!("url is missing {}", placeholder)));
            }
        }
        if url_template.contains(SHARD_PLACEHOLDER) && shard_alphabet.is_empty() {
            return Err(invalid("url uses {s} but no shard alphabet is defined"));
        }

        let sample = url_template
            .replace("{x}", "0")
            .replace("{y}", "0")
            .replace("{z}", "0")
            .replace(SHARD_PLACEHOLDER, &shard_alphabet.chars().take(1).collect::<String>());
        if let Err(e) = url::Url::parse(&sample) {
            return Err(invalid(&format!("url is not a valid absolute URL: {}", e)));
        }

        Ok(Self {
            name: def.name,
            min_zoom: def.min_zoom,
            max_zoom: def.max_zoom,
            scale: def.scale,
            url_template,
            attribution: def.attribution,
            shard_alphabet,
        })
    }
}

/// Provider entry as written in the provider file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDefinition {
    pub name: String,
    pub min_zoom: u32,
    pub max_zoom: u32,
    pub scale: u32,
    pub url: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default)]
    pub shards: Option<String>,
}

/// Rewrite a `[abc]` load-balancing token to `{s}`.
///
/// Returns the rewritten template and the alphabet, or `None` if the URL has
/// no bracketed lowercase-alphanumeric token.
fn extract_shard_alphabet(url: &str) -> Option<(String, String)> {
    let start = url.find('[')?;
    let len = url[start + 1..].find(']')?;
    let alphabet = &url[start + 1..start + 1 + len];

    if alphabet.is_empty()
        || !alphabet
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return None;
    }

    let token = &url[start..start + len + 2];
    Some((url.replace(token, SHARD_PLACEHOLDER), alphabet.to_string()))
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable mapping from provider name to provider.
///
/// Built once before the queue starts and shared read-only afterwards.
/// Iteration order is by name, which also defines the default provider.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Provider>,
    default: Provider,
}

impl ProviderRegistry {
    /// Build a registry from validated providers.
    ///
    /// Fails on duplicate names or an empty list.
    pub fn new(providers: Vec<Provider>) -> Result<Self, ProviderError> {
        let mut map = BTreeMap::new();
        for provider in providers {
            if map.contains_key(&provider.name) {
                return Err(ProviderError::Duplicate(provider.name));
            }
            map.insert(provider.name.clone(), provider);
        }

        let default = match map.values().next() {
            Some(provider) => provider.clone(),
            None => return Err(ProviderError::Empty),
        };

        Ok(Self {
            providers: map,
            default,
        })
    }

    /// Parse and validate a JSON provider list.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let definitions: Vec<ProviderDefinition> =
            serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))?;

        let providers = definitions
            .into_iter()
            .map(Provider::from_definition)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(providers)
    }

    /// Load providers from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ProviderError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// The provider used when a request names none (first by name).
    pub fn default_provider(&self) -> &Provider {
        &self.default
    }

    /// Iterate providers in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry has no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
