use serde::Deserialize;

/// A single HTTP header transformation applied when building a provider
/// request, evaluated in declaration order.
///
/// Templates describe static headers a provider always needs (e.g. a vendor
/// API version header) or headers forwarded verbatim from configuration.
/// Per-user overrides (`UserConfig::custom_headers`) are applied after every
/// `HeaderRule`, taking precedence per spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum HeaderRule {
    /// Always set `name` to the literal `value`.
    Insert {
        /// Header name.
        name: String,
        /// Header value.
        value: String,
    },
    /// Forward the caller-supplied header `name` verbatim, if present.
    Forward {
        /// Header name to forward.
        name: String,
    },
}
