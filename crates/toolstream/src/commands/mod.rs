use async_trait::async_trait;
use eyre::{Result, eyre};
use std::path::PathBuf;
use toolstream_core::config::ModelRegistry;
use tracing::{debug, warn};

pub mod chat;
pub mod models;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Canonicalize catalog paths when possible and warn on missing or invalid ones.
pub fn normalize_catalogs(paths: &[PathBuf]) -> Vec<String> {
    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        if !p.exists() {
            warn!("Catalog path does not exist: {}", p.display());
            out.push(p.to_string_lossy().to_string());
            continue;
        }
        match p.canonicalize() {
            Ok(c) => out.push(c.to_string_lossy().to_string()),
            Err(e) => {
                warn!("Failed to canonicalize catalog path {}: {}", p.display(), e);
                out.push(p.to_string_lossy().to_string());
            }
        }
    }
    debug!("Using catalog paths: {:?}", out);
    out
}

pub fn load_model_registry(catalogs: &[PathBuf]) -> Result<ModelRegistry> {
    ModelRegistry::load(&normalize_catalogs(catalogs))
        .map_err(|e| eyre!("Failed to load model catalogs: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_catalogs_warns_and_keeps_paths() {
        let tmp = TempDir::new().unwrap();
        let existing = tmp.path().join("exists.toml");
        fs::write(&existing, "").unwrap();
        let missing = tmp.path().join("missing.toml");
        let out = normalize_catalogs(&[existing.clone(), missing.clone()]);
        assert_eq!(out.len(), 2);
        assert!(out[0].contains("exists.toml"));
        assert!(out[1].contains("missing.toml"));
    }

    #[test]
    fn test_load_model_registry_merges_catalog() {
        let tmp = TempDir::new().unwrap();
        let catalog = tmp.path().join("models.toml");
        fs::write(
            &catalog,
            r#"
[[models]]
id = "local-llama"
aliases = ["llama"]
context_length = 8192
"#,
        )
        .unwrap();

        let registry = load_model_registry(&[catalog]).unwrap();
        assert_eq!(registry.resolve("llama").unwrap().id, "local-llama");
        assert!(registry.get("gpt-4o").is_some());
    }

    #[test]
    fn test_missing_catalog_fails() {
        let tmp = TempDir::new().unwrap();
        let result = load_model_registry(&[tmp.path().join("nope.toml")]);
        assert!(result.is_err());
    }
}
