/// Errors raised while loading, parsing or validating templates and user
/// configs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No template file exists for the requested provider id.
    #[error("template not found for provider '{0}'")]
    TemplateNotFound(String),

    /// The template file exists but failed JSON deserialization.
    #[error("failed to parse template for provider '{provider_id}': {source}")]
    TemplateParse {
        /// Provider id whose template failed to parse.
        provider_id: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The template parsed but failed schema validation (missing endpoint,
    /// missing request/response paths, etc.).
    #[error("invalid template for provider '{provider_id}': {reason}")]
    InvalidTemplate {
        /// Provider id whose template is invalid.
        provider_id: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The user config file exists but failed JSON deserialization.
    #[error("failed to parse user config for provider '{provider_id}': {source}")]
    UserConfigParse {
        /// Provider id whose user config failed to parse.
        provider_id: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An I/O failure while reading or writing a config file. The message is
    /// pre-formatted by `anyhow::Context` at the call site (which file, which
    /// operation) rather than carrying a typed `std::io::Error` source.
    #[error("{0}")]
    Io(String),

    /// Failed to serialize a user config before persisting it.
    #[error("failed to serialize user config: {0}")]
    Serialize(#[source] serde_json::Error),
}
