use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::model::ModelConfig;
use crate::error::{Error, Result};

const DEFAULT_MODELS_TOML: &str = include_str!("../../assets/default_models.toml");

/// Registry containing all available model configurations.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    /// Definition order of the merged catalogs.
    models: Vec<ModelConfig>,
    by_id: HashMap<String, usize>,
    aliases: HashMap<String, usize>,
}

/// Root structure for TOML deserialization.
#[derive(Debug, Default, Deserialize, Serialize)]
struct ModelsFile {
    #[serde(default)]
    models: Vec<ModelConfig>,
}

impl ModelRegistry {
    /// Load the model registry, merging built-in, user and catalog configurations.
    ///
    /// Merge order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. User-level `models.toml`
    /// 3. Each path in `catalog_paths`, in order
    pub fn load(catalog_paths: &[String]) -> Result<Self> {
        let mut models_file = Self::builtin()?;

        if let Some(path) = Self::user_config_path()
            && let Some(user_config) = Self::load_config_from_path(&path)?
        {
            debug!(target: "config", path = %path.display(), "Merging user model catalog");
            Self::merge_models(&mut models_file, user_config);
        }

        for catalog in catalog_paths {
            let path = PathBuf::from(catalog);
            let catalog_config = Self::load_config_from_path(&path)?.ok_or_else(|| {
                Error::Configuration(format!("Model catalog not found: {}", path.display()))
            })?;
            debug!(target: "config", path = %path.display(), "Merging model catalog");
            Self::merge_models(&mut models_file, catalog_config);
        }

        Ok(Self::from_models(models_file.models))
    }

    /// Registry holding only the built-in catalog.
    pub fn builtin_only() -> Result<Self> {
        Ok(Self::from_models(Self::builtin()?.models))
    }

    pub fn from_models(models: Vec<ModelConfig>) -> Self {
        let mut registry = Self {
            models: Vec::with_capacity(models.len()),
            by_id: HashMap::new(),
            aliases: HashMap::new(),
        };

        for model in models {
            let slot = match registry.by_id.get(&model.id) {
                Some(&slot) => {
                    registry.models[slot] = model;
                    slot
                }
                None => {
                    registry.models.push(model);
                    registry.models.len() - 1
                }
            };
            let model = &registry.models[slot];
            registry.by_id.insert(model.id.clone(), slot);
            for alias in &model.aliases {
                registry.aliases.insert(alias.clone(), slot);
            }
        }

        registry
    }

    /// Get a model by its ID.
    pub fn get(&self, id: &str) -> Option<&ModelConfig> {
        self.by_id.get(id).map(|&slot| &self.models[slot])
    }

    /// Find a model by its alias.
    pub fn by_alias(&self, alias: &str) -> Option<&ModelConfig> {
        self.aliases.get(alias).map(|&slot| &self.models[slot])
    }

    /// Looks `name` up as an id first, then as an alias.
    pub fn resolve(&self, name: &str) -> Result<&ModelConfig> {
        self.get(name)
            .or_else(|| self.by_alias(name))
            .ok_or_else(|| Error::Configuration(format!("Unknown model: {name}")))
    }

    /// The first model of the merged catalogs.
    pub fn default_model(&self) -> Option<&ModelConfig> {
        self.models.first()
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.iter()
    }

    fn builtin() -> Result<ModelsFile> {
        toml::from_str(DEFAULT_MODELS_TOML)
            .map_err(|e| Error::Configuration(format!("Failed to parse default models: {e}")))
    }

    /// Load configuration from a specific path.
    fn load_config_from_path(path: &Path) -> Result<Option<ModelsFile>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;

        let models = toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to parse models at {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Some(models))
    }

    /// Path to the user's models configuration file.
    fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "toolstream")
            .map(|dirs| dirs.config_dir().join("models.toml"))
    }

    /// Merge `overlay` into `base`. Aliases are appended, everything else is
    /// replaced by the overlay's entry.
    fn merge_models(base: &mut ModelsFile, overlay: ModelsFile) {
        for model in overlay.models {
            match base.models.iter_mut().find(|m| m.id == model.id) {
                Some(existing) => {
                    let mut aliases = std::mem::take(&mut existing.aliases);
                    for alias in &model.aliases {
                        if !aliases.contains(alias) {
                            aliases.push(alias.clone());
                        }
                    }
                    *existing = ModelConfig { aliases, ..model };
                }
                None => base.models.push(model),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_builtin_models() {
        let registry = ModelRegistry::builtin_only().unwrap();

        assert_eq!(registry.default_model().unwrap().id, "gpt-4o");
        assert!(registry.get("gpt-4o").unwrap().reasoning.is_none());

        let r1 = registry.resolve("r1").unwrap();
        assert_eq!(r1.id, "deepseek-r1");
        assert_eq!(r1.reasoning.as_ref().unwrap().close, "</think>");

        // An empty [models.reasoning] table still declares the capability.
        assert!(registry.get("qwq-32b-bnb-4bit").unwrap().reasoning.is_some());
    }

    #[test]
    fn test_resolve_unknown_model() {
        let registry = ModelRegistry::builtin_only().unwrap();
        let err = registry.resolve("nope").unwrap_err();
        assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("nope")));
    }

    #[test]
    fn test_merge_models() {
        let mut base: ModelsFile = toml::from_str(
            r#"
[[models]]
id = "gpt-4o"
aliases = ["4o"]
context_length = 128000
"#,
        )
        .unwrap();
        let overlay: ModelsFile = toml::from_str(
            r#"
[[models]]
id = "gpt-4o"
aliases = ["omni"]
context_length = 64000
system_prompt = "Be brief."

[[models]]
id = "local"
"#,
        )
        .unwrap();

        ModelRegistry::merge_models(&mut base, overlay);
        let registry = ModelRegistry::from_models(base.models);

        let merged = registry.resolve("omni").unwrap();
        assert_eq!(merged.aliases, vec!["4o", "omni"]);
        assert_eq!(merged.context_length, 64000);
        assert_eq!(merged.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(registry.models().count(), 2);
    }

    #[test]
    fn test_load_with_catalog_paths() {
        use std::fs;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.toml");
        fs::write(
            &path,
            r#"
[[models]]
id = "llama-local"
aliases = ["llama"]
include_usage_in_stream = false
"#,
        )
        .unwrap();

        let registry = ModelRegistry::load(&[path.display().to_string()]).unwrap();
        assert_eq!(registry.resolve("llama").unwrap().id, "llama-local");
        assert!(registry.get("gpt-4o").is_some());

        let missing = dir.path().join("missing.toml").display().to_string();
        assert!(matches!(
            ModelRegistry::load(&[missing]),
            Err(Error::Configuration(_))
        ));
    }
}
