use std::fmt;

use serde::{Deserialize, Serialize};

/// Deployment environment. Selects the configuration overlay and
/// suffixes vector collection names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    #[default]
    Dev,
    Prod,
}

impl Env {
    /// Read the environment from the `ENV` variable. Unset or
    /// unrecognised values fall back to `dev`.
    pub fn from_process_env() -> Self {
        match std::env::var("ENV").as_deref() {
            Ok("prod") | Ok("production") => Env::Prod,
            Ok("dev") | Ok("development") | Err(_) => Env::Dev,
            Ok(other) => {
                tracing::warn!(value = other, "Unrecognised ENV value, defaulting to dev");
                Env::Dev
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Env::Dev => "dev",
            Env::Prod => "prod",
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
