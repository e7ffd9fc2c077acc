//! JSON configuration loading with per-environment overlays.
//!
//! A config named `sites` resolves to `sites.json` plus, when present,
//! `sites.<env>.json` deep-merged on top. Objects merge recursively;
//! any other value in the overlay replaces the base value.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::env::Env;
use crate::error::{RegistryError, Result};

/// Load `<dir>/<name>.json`, apply `<dir>/<name>.<env>.json` when it
/// exists, and deserialize the merged tree.
pub fn load_with_overlay<T: DeserializeOwned>(dir: &Path, name: &str, env: Env) -> Result<T> {
    let base_path = dir.join(format!("{name}.json"));
    let mut tree = read_json(&base_path)?;

    let overlay_path = dir.join(format!("{name}.{env}.json"));
    if overlay_path.exists() {
        let overlay = read_json(&overlay_path)?;
        tracing::debug!(file = %overlay_path.display(), "Applying config overlay");
        merge(&mut tree, overlay);
    }

    serde_json::from_value(tree).map_err(|source| RegistryError::Parse {
        path: base_path.display().to_string(),
        source,
    })
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_replaces_scalars_and_merges_objects() {
        let mut base = json!({
            "timeout": 10,
            "hosts": {"a.example": {"rps": 0.5}, "b.example": {"rps": 1.0}}
        });
        let overlay = json!({
            "timeout": 30,
            "hosts": {"a.example": {"rps": 0.2}}
        });

        merge(&mut base, overlay);

        assert_eq!(base["timeout"], 30);
        assert_eq!(base["hosts"]["a.example"]["rps"], 0.2);
        assert_eq!(base["hosts"]["b.example"]["rps"], 1.0);
    }

    #[test]
    fn merge_adds_new_keys() {
        let mut base = json!({"a": 1});
        merge(&mut base, json!({"b": 2}));
        assert_eq!(base, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn load_with_overlay_applies_env_file() {
        let dir = std::env::temp_dir().join(format!("registry-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tuning.json"), r#"{"timeout": 10, "retries": 3}"#).unwrap();
        std::fs::write(dir.join("tuning.prod.json"), r#"{"timeout": 30}"#).unwrap();

        #[derive(serde::Deserialize)]
        struct Tuning {
            timeout: u64,
            retries: u32,
        }

        let tuning: Tuning = load_with_overlay(&dir, "tuning", Env::Prod).unwrap();
        assert_eq!(tuning.timeout, 30);
        assert_eq!(tuning.retries, 3);

        let tuning: Tuning = load_with_overlay(&dir, "tuning", Env::Dev).unwrap();
        assert_eq!(tuning.timeout, 10);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_base_file_is_an_io_error() {
        let dir = std::env::temp_dir();
        let result: Result<Value> = load_with_overlay(&dir, "does-not-exist", Env::Dev);
        assert!(matches!(result, Err(RegistryError::Io { .. })));
    }
}
