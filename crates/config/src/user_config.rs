use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};
use serde_json::Value;
use std::collections::HashMap;

/// Per-provider, host-local credentials and preferences that merge over a
/// template's defaults. The same shape is used for chat and embedding
/// providers; fields that don't apply to one kind are simply left `None`.
///
/// `secrecy::SecretString` deliberately does not implement `Serialize` (to
/// stop a secret being written out by an unrelated `#[derive(Serialize)]`
/// elsewhere in the call graph), so this type implements it by hand below,
/// making the one place the key is written back to disk explicit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    /// The provider API key. The sole source of `MergedConfig::api_key`.
    pub api_key: SecretString,
    /// Overrides the template's default model.
    pub model_override: Option<String>,
    /// Overrides the template's endpoint.
    pub endpoint_override: Option<String>,
    /// Overrides the template's default temperature.
    pub temperature: Option<f32>,
    /// Overrides the template's default top_p.
    pub top_p: Option<f32>,
    /// Overrides the template's default typical_p.
    pub typical_p: Option<f32>,
    /// Overrides the template's default max_tokens.
    pub max_tokens: Option<u32>,
    /// Overrides the per-provider concurrency limit.
    pub concurrency_limit: Option<usize>,
    /// Extra headers applied last, after template header rules.
    pub custom_headers: HashMap<String, String>,
    /// Deep-merged on top of the template's static parameters; matching keys
    /// replace the template's value (arrays are replaced, not concatenated).
    pub static_parameters_override: Option<Value>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            model_override: None,
            endpoint_override: None,
            temperature: None,
            top_p: None,
            typical_p: None,
            max_tokens: None,
            concurrency_limit: None,
            custom_headers: HashMap::new(),
            static_parameters_override: None,
        }
    }
}

impl UserConfig {
    /// Returns `true` when the API key is non-empty, the only signal the
    /// store uses to decide whether a provider is "active".
    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

impl Serialize for UserConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("UserConfig", 10)?;
        state.serialize_field("api_key", self.api_key.expose_secret())?;
        state.serialize_field("model_override", &self.model_override)?;
        state.serialize_field("endpoint_override", &self.endpoint_override)?;
        state.serialize_field("temperature", &self.temperature)?;
        state.serialize_field("top_p", &self.top_p)?;
        state.serialize_field("typical_p", &self.typical_p)?;
        state.serialize_field("max_tokens", &self.max_tokens)?;
        state.serialize_field("concurrency_limit", &self.concurrency_limit)?;
        state.serialize_field("custom_headers", &self.custom_headers)?;
        state.serialize_field("static_parameters_override", &self.static_parameters_override)?;
        state.end()
    }
}
