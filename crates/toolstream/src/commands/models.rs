use async_trait::async_trait;
use eyre::Result;
use std::io::Write;
use std::path::PathBuf;

use super::{Command, load_model_registry};

pub struct ModelsCommand {
    pub catalogs: Vec<PathBuf>,
}

#[async_trait]
impl Command for ModelsCommand {
    async fn execute(&self) -> Result<()> {
        let registry = load_model_registry(&self.catalogs)?;
        let default_id = registry.default_model().map(|m| m.id.clone());

        let mut stdout = std::io::stdout().lock();
        for model in registry.models() {
            let marker = if Some(&model.id) == default_id.as_ref() {
                "*"
            } else {
                " "
            };
            let aliases = if model.aliases.is_empty() {
                "-".to_string()
            } else {
                model.aliases.join(",")
            };
            let reasoning = if model.reasoning.is_some() {
                "reasoning"
            } else {
                ""
            };
            writeln!(
                stdout,
                "{marker} {:<24} {:<12} {:>8} {reasoning}",
                model.id, aliases, model.context_length
            )?;
        }
        Ok(())
    }
}
