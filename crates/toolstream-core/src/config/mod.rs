pub mod model;
pub mod registry;

pub use model::{ModelConfig, ReasoningTags};
pub use registry::ModelRegistry;
