//! Model configuration resolution
//!
//! Builds the identifier → backend-configuration table for one request by
//! layering three sources in increasing priority: the built-in model table,
//! caller-supplied credential overrides, and operator-defined entries from
//! the models file. Resolution happens fresh on every call so that edits to
//! the models file take effect on the very next request.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Wire protocol spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// Provider-native generate-content streaming
    Native,

    /// OpenAI-compatible streaming chat completions
    ChatCompletions,

    /// Raw HTTP POST with an SSE response body
    PlainSse,

    /// Raw HTTP POST + SSE against a history-less upstream
    StatelessSse,

    /// Raw HTTP POST + SSE authorized by a locally signed token
    SignedSse,

    /// Unrecognized tag read from the models file.
    ///
    /// Kept through resolution so that a file written by a newer version
    /// still resolves; the dispatcher reports it per request instead.
    #[serde(other)]
    Unknown,
}

/// One backend's resolved configuration.
///
/// Immutable once resolved for a request; a re-resolution replaces the
/// whole value, never patches fields. Which optional fields are meaningful
/// is determined by `protocol`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Wire protocol the adapter layer must speak
    pub protocol: Protocol,

    /// Resolved secret (may be empty if no source provided one)
    pub credential: String,

    /// Provider-side model string
    pub model: String,

    /// Endpoint base URL (native, chat-completions, signed-sse)
    pub base_url: Option<String>,

    /// Full endpoint URL (plain-sse, stateless-sse)
    pub url: Option<String>,

    /// System prompt injected ahead of the conversation where supported
    pub system_prompt: Option<String>,
}

/// Identifier → configuration table, built fresh per resolution call
#[derive(Debug, Default)]
pub struct ModelTable {
    entries: BTreeMap<String, ModelConfig>,
}

impl ModelTable {
    /// Look up a model configuration by identifier
    pub fn get(&self, id: &str) -> Option<&ModelConfig> {
        self.entries.get(id)
    }

    /// Check whether an identifier is present
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All known identifiers, in sorted order
    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ModelConfig)> for ModelTable {
    fn from_iter<I: IntoIterator<Item = (String, ModelConfig)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// On-disk models document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsFile {
    /// Document format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Operator-defined model entries
    #[serde(default)]
    pub models: Vec<ModelEntry>,

    /// Display metadata for the protocol tags (opaque to resolution)
    #[serde(default)]
    pub api_types: serde_json::Map<String, serde_json::Value>,
}

impl Default for ModelsFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            models: Vec::new(),
            api_types: serde_json::Map::new(),
        }
    }
}

/// One operator-defined model entry as stored in the models file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Unique model identifier
    pub id: String,

    /// Display name (not used by resolution)
    #[serde(default)]
    pub name: String,

    /// Protocol tag
    #[serde(rename = "type")]
    pub protocol: Protocol,

    /// Provider-side model string
    pub model: String,

    /// Name of the credential slot this entry reads
    pub api_key_name: String,

    /// Disabled entries are excluded from resolution
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Display icon (not used by resolution)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Endpoint base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Full endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Resolves model identifiers against the built-in table and the models file
#[derive(Debug, Clone)]
pub struct Resolver {
    models_path: PathBuf,
}

impl Resolver {
    /// Create a resolver reading operator-defined models from `models_path`
    pub fn new(models_path: impl Into<PathBuf>) -> Self {
        Self {
            models_path: models_path.into(),
        }
    }

    /// Path of the models file this resolver reads
    pub fn models_path(&self) -> &Path {
        &self.models_path
    }

    /// Build the model table for one request.
    ///
    /// `overrides` are caller-supplied credentials for this resolution only;
    /// they take priority over process environment variables but are never
    /// persisted. Entries from the models file shadow built-in identifiers
    /// wholesale. A malformed or unreadable models file degrades to "no
    /// custom models" — built-ins are always served.
    pub fn resolve(&self, overrides: &HashMap<String, String>) -> ModelTable {
        let mut entries = builtin_models(overrides);
        for entry in self.file_entries() {
            if !entry.enabled {
                continue;
            }
            let credential = credential(&entry.api_key_name, overrides);
            entries.insert(
                entry.id,
                ModelConfig {
                    protocol: entry.protocol,
                    credential,
                    model: entry.model,
                    base_url: entry.base_url,
                    url: entry.url,
                    system_prompt: entry.system,
                },
            );
        }
        ModelTable { entries }
    }

    /// Identifiers of a fresh resolution, without caller credentials
    pub fn model_ids(&self) -> Vec<String> {
        self.resolve(&HashMap::new()).ids()
    }

    fn file_entries(&self) -> Vec<ModelEntry> {
        let raw = match std::fs::read_to_string(&self.models_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.models_path.display(), "failed to read models file: {e}");
                return Vec::new();
            }
        };
        match serde_json::from_str::<ModelsFile>(&raw) {
            Ok(file) => file.models,
            Err(e) => {
                warn!(path = %self.models_path.display(), "malformed models file, serving built-ins only: {e}");
                Vec::new()
            }
        }
    }
}

/// Built-in model table, always available
fn builtin_models(overrides: &HashMap<String, String>) -> BTreeMap<String, ModelConfig> {
    let mut entries = BTreeMap::new();
    entries.insert(
        "google".to_string(),
        ModelConfig {
            protocol: Protocol::Native,
            credential: credential("GOOGLE_API_KEY", overrides),
            model: "gemini-2.5-flash".to_string(),
            base_url: Some(env_or(
                "GOOGLE_BASE_URL",
                "https://generativelanguage.googleapis.com",
            )),
            url: None,
            system_prompt: None,
        },
    );
    entries.insert(
        "deepseek".to_string(),
        ModelConfig {
            protocol: Protocol::ChatCompletions,
            credential: credential("DEEPSEEK_API_KEY", overrides),
            model: "deepseek-chat".to_string(),
            base_url: Some(env_or("DEEPSEEK_BASE_URL", "https://api.deepseek.com/v1")),
            url: None,
            system_prompt: Some("You are a helpful assistant".to_string()),
        },
    );
    entries.insert(
        "moonshot".to_string(),
        ModelConfig {
            protocol: Protocol::ChatCompletions,
            credential: credential("MOONSHOT_API_KEY", overrides),
            model: "kimi-k2-turbo-preview".to_string(),
            base_url: Some(env_or("MOONSHOT_BASE_URL", "https://api.moonshot.cn/v1")),
            url: None,
            system_prompt: Some("你是一只猫娘，你每回答一次问题都会在最后面加一个：,喵~".to_string()),
        },
    );
    entries.insert(
        "qwen".to_string(),
        ModelConfig {
            protocol: Protocol::PlainSse,
            credential: credential("QWEN_API_KEY", overrides),
            model: "Qwen/Qwen2.5-VL-72B-Instruct".to_string(),
            base_url: None,
            url: Some(env_or(
                "QWEN_BASE_URL",
                "https://api.siliconflow.cn/v1/chat/completions",
            )),
            system_prompt: None,
        },
    );
    entries.insert(
        "spark".to_string(),
        ModelConfig {
            protocol: Protocol::StatelessSse,
            credential: credential("SPARK_API_KEY", overrides),
            model: "x1".to_string(),
            base_url: None,
            url: Some(env_or(
                "SPARK_BASE_URL",
                "https://spark-api-open.xf-yun.com/v2/chat/completions",
            )),
            system_prompt: None,
        },
    );
    entries
}

/// Fill a credential slot: non-empty caller override, else non-empty
/// process environment variable, else empty.
fn credential(slot: &str, overrides: &HashMap<String, String>) -> String {
    overrides
        .get(slot)
        .filter(|value| !value.is_empty())
        .cloned()
        .or_else(|| std::env::var(slot).ok().filter(|value| !value.is_empty()))
        .unwrap_or_default()
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn overrides(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write_models(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("models.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_builtins_present_without_models_file() {
        let resolver = Resolver::new("/nonexistent/models.json");
        let table = resolver.resolve(&overrides(&[("GOOGLE_API_KEY", "k1")]));

        for id in ["google", "deepseek", "moonshot", "qwen", "spark"] {
            assert!(table.contains(id), "missing built-in '{id}'");
        }
        assert_eq!(table.get("google").unwrap().credential, "k1");
        assert_eq!(table.get("google").unwrap().protocol, Protocol::Native);
        assert_eq!(table.get("spark").unwrap().protocol, Protocol::StatelessSse);
    }

    #[test]
    fn test_empty_override_is_not_a_credential() {
        let resolver = Resolver::new("/nonexistent/models.json");
        let table = resolver.resolve(&overrides(&[("QWEN_API_KEY", "")]));
        // empty caller value falls through (and no env var is set in tests)
        assert_eq!(table.get("qwen").unwrap().credential, "");
    }

    #[test]
    fn test_disabled_entries_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_models(
            &dir,
            r#"{"models":[
                {"id":"on","type":"plain-sse","model":"m1","api_key_name":"ON_KEY","url":"http://localhost/v1"},
                {"id":"off","type":"plain-sse","model":"m2","api_key_name":"OFF_KEY","enabled":false,"url":"http://localhost/v1"}
            ]}"#,
        );

        let table = Resolver::new(path).resolve(&HashMap::new());
        assert!(table.contains("on"));
        assert!(!table.contains("off"));
    }

    #[test]
    fn test_custom_entry_shadows_builtin_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_models(
            &dir,
            r#"{"models":[
                {"id":"google","type":"plain-sse","model":"local-gemini","api_key_name":"LOCAL_KEY","url":"http://localhost/v1"}
            ]}"#,
        );

        let table = Resolver::new(path).resolve(&overrides(&[("LOCAL_KEY", "lk")]));
        let config = table.get("google").unwrap();
        // full replacement: protocol and all fields come from the custom entry
        assert_eq!(config.protocol, Protocol::PlainSse);
        assert_eq!(config.model, "local-gemini");
        assert_eq!(config.credential, "lk");
        assert_eq!(config.url.as_deref(), Some("http://localhost/v1"));
        assert_eq!(config.base_url, None);
    }

    #[test]
    fn test_malformed_file_degrades_to_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_models(&dir, "{not valid json");

        let table = Resolver::new(path).resolve(&HashMap::new());
        assert_eq!(table.len(), 5);
        assert!(table.contains("deepseek"));
    }

    #[test]
    fn test_entry_missing_required_field_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_models(
            &dir,
            r#"{"models":[{"id":"incomplete","type":"plain-sse"}]}"#,
        );

        let table = Resolver::new(path).resolve(&HashMap::new());
        assert!(!table.contains("incomplete"));
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_unrecognized_protocol_tag_still_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_models(
            &dir,
            r#"{"models":[{"id":"odd","type":"carrier-pigeon","model":"m","api_key_name":"ODD_KEY"}]}"#,
        );

        let table = Resolver::new(path).resolve(&HashMap::new());
        assert_eq!(table.get("odd").unwrap().protocol, Protocol::Unknown);
    }

    #[test]
    fn test_resolution_reflects_file_edits_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_models(
            &dir,
            r#"{"models":[{"id":"first","type":"plain-sse","model":"m","api_key_name":"K","url":"http://localhost/v1"}]}"#,
        );
        let resolver = Resolver::new(&path);
        assert!(resolver.resolve(&HashMap::new()).contains("first"));

        std::fs::write(
            &path,
            r#"{"models":[{"id":"second","type":"plain-sse","model":"m","api_key_name":"K","url":"http://localhost/v1"}]}"#,
        )
        .unwrap();
        let table = resolver.resolve(&HashMap::new());
        assert!(!table.contains("first"));
        assert!(table.contains("second"));
    }
}
