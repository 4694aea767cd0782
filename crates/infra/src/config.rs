//! Configuration loading and representation.
//!
//! Read from the process environment; missing or unparsable values fall
//! back to defaults (with a warning for the unparsable ones).

use serde::{Deserialize, Serialize};

use depot_loans::RequestNumbering;

pub const REQUEST_PREFIX_VAR: &str = "DEPOT_REQUEST_PREFIX";
pub const KIT_PREFIX_VAR: &str = "DEPOT_KIT_PREFIX";
pub const NUMBER_WIDTH_VAR: &str = "DEPOT_NUMBER_WIDTH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanConfig {
    pub request_prefix: String,
    pub kit_prefix: String,
    pub number_width: usize,
}

impl Default for LoanConfig {
    fn default() -> Self {
        let numbering = RequestNumbering::default();
        Self {
            request_prefix: numbering.request_prefix,
            kit_prefix: numbering.kit_prefix,
            number_width: numbering.width,
        }
    }
}

impl LoanConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let prefix = |key: &str, fallback: String| match lookup(key) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            Some(_) => {
                tracing::warn!(key, "blank prefix; using default");
                fallback
            }
            None => fallback,
        };

        let number_width = match lookup(NUMBER_WIDTH_VAR) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(width) if (1..=12).contains(&width) => width,
                _ => {
                    tracing::warn!(key = NUMBER_WIDTH_VAR, value = %raw, "invalid width; using default");
                    defaults.number_width
                }
            },
            None => defaults.number_width,
        };

        let request_prefix = prefix(REQUEST_PREFIX_VAR, defaults.request_prefix.clone());
        let kit_prefix = prefix(KIT_PREFIX_VAR, defaults.kit_prefix.clone());

        // Shared prefixes would hand the same number to a manual and a kit request.
        let (request_prefix, kit_prefix) = if request_prefix == kit_prefix {
            tracing::warn!(prefix = %request_prefix, "request and kit prefixes collide; using defaults");
            (defaults.request_prefix, defaults.kit_prefix)
        } else {
            (request_prefix, kit_prefix)
        };

        Self {
            request_prefix,
            kit_prefix,
            number_width,
        }
    }

    pub fn numbering(&self) -> RequestNumbering {
        RequestNumbering {
            request_prefix: self.request_prefix.clone(),
            kit_prefix: self.kit_prefix.clone(),
            width: self.number_width,
        }
    }
}
