//! Secrets referenced from component configuration.
//!
//! A secret is either a literal token, usable at run time but never written to
//! a pipeline document, or a reference to environment variables, which
//! serializes as the variable names only.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A credential used by a component.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    /// A literal token. Refuses to serialize.
    Token(String),
    /// The first set variable among `env_vars`.
    EnvVar {
        /// Candidate variable names, in lookup order.
        env_vars: Vec<String>,
        /// Whether resolution fails when none is set.
        strict: bool,
    },
}

/// Error raised when a secret cannot be resolved.
#[derive(Debug, Clone, Error)]
pub enum SecretError {
    /// A strict env-var secret found none of its variables.
    #[error("None of the following authentication environment variables are set: {}", .0.join(", "))]
    EnvVarNotSet(Vec<String>),
}

impl Secret {
    /// Creates a token secret.
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::Token(token.into())
    }

    /// Creates an env-var secret.
    #[must_use]
    pub fn from_env_var(env_vars: &[&str], strict: bool) -> Self {
        Self::EnvVar {
            env_vars: env_vars.iter().map(|v| (*v).to_string()).collect(),
            strict,
        }
    }

    /// Resolves the secret to its value.
    ///
    /// Non-strict env-var secrets resolve to `None` when no variable is set.
    pub fn resolve_value(&self) -> Result<Option<String>, SecretError> {
        match self {
            Self::Token(token) => Ok(Some(token.clone())),
            Self::EnvVar { env_vars, strict } => {
                let found = env_vars.iter().find_map(|name| std::env::var(name).ok());
                match found {
                    Some(value) => Ok(Some(value)),
                    None if *strict => Err(SecretError::EnvVarNotSet(env_vars.clone())),
                    None => Ok(None),
                }
            }
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
            Self::EnvVar { env_vars, strict } => f
                .debug_struct("EnvVar")
                .field("env_vars", env_vars)
                .field("strict", strict)
                .finish(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SecretRepr {
    EnvVar {
        env_vars: Vec<String>,
        #[serde(default = "default_strict")]
        strict: bool,
    },
}

fn default_strict() -> bool {
    true
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Token(_) => Err(serde::ser::Error::custom(
                "Cannot serialize token-based secret. Use an alternative secret type like environment variables",
            )),
            Self::EnvVar { env_vars, strict } => SecretRepr::EnvVar {
                env_vars: env_vars.clone(),
                strict: *strict,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match SecretRepr::deserialize(deserializer)? {
            SecretRepr::EnvVar { env_vars, strict } => {
                if env_vars.is_empty() {
                    return Err(serde::de::Error::custom(
                        "an env_var secret needs at least one variable name",
                    ));
                }
                Ok(Self::EnvVar { env_vars, strict })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_resolves_and_hides_in_debug() {
        let secret = Secret::from_token("sk-123");
        assert_eq!(secret.resolve_value().unwrap(), Some("sk-123".to_string()));
        assert!(!format!("{secret:?}").contains("sk-123"));
    }

    #[test]
    fn test_token_refuses_to_serialize() {
        let err = serde_json::to_value(Secret::from_token("sk-123")).unwrap_err();
        assert!(err.to_string().contains("token-based secret"));
    }

    #[test]
    fn test_env_var_serializes_as_reference() {
        let secret = Secret::from_env_var(&["RAGFLOW_TEST_UNSET_TOKEN"], false);
        let json = serde_json::to_value(&secret).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "env_var",
                "env_vars": ["RAGFLOW_TEST_UNSET_TOKEN"],
                "strict": false
            })
        );
        let back: Secret = serde_json::from_value(json).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_env_var_resolution() {
        let lenient = Secret::from_env_var(&["RAGFLOW_TEST_UNSET_TOKEN"], false);
        assert_eq!(lenient.resolve_value().unwrap(), None);

        let strict = Secret::from_env_var(&["RAGFLOW_TEST_UNSET_TOKEN"], true);
        assert!(matches!(strict.resolve_value(), Err(SecretError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_unknown_secret_type_rejected() {
        let result: Result<Secret, _> =
            serde_json::from_value(serde_json::json!({"type": "token", "token": "x"}));
        assert!(result.is_err());
    }
}
