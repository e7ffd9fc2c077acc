use thiserror::Error;

/// Errors raised while loading or querying the registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    #[error("domain is inactive: {0}")]
    InactiveDomain(String),

    #[error("unknown site: {0}")]
    UnknownSite(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
