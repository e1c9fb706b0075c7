// ABOUTME: Sandbox environment values: literals or lookups in the host environment.
// ABOUTME: Resolved once when settings are built, never per sandbox.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Value of an environment variable injected into every sandbox.
///
/// ```yaml
/// env:
///   NODE_ENV: development
///   NPM_TOKEN: { env: SANDCASTLE_NPM_TOKEN }
///   API_URL: { env: PREVIEW_API_URL, default: "http://host.docker.internal:4000" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromHost {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Resolve the value for sandbox variable `key`.
    pub fn resolve(&self, key: &str) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromHost { var, default } => std::env::var(var)
                .ok()
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar {
                    key: key.to_string(),
                    var: var.clone(),
                }),
        }
    }
}

/// Resolve every entry, failing on the first host variable that is unset.
pub fn resolve_env_map(map: &HashMap<String, EnvValue>) -> Result<HashMap<String, String>> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), value.resolve(key)?)))
        .collect()
}
