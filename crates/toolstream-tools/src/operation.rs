use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OperationError;

/// Whether an operation prepares a transaction for signing or answers a read-only query.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Transaction,
    Query,
}

/// An operation the model can invoke by name.
///
/// Implementors work with typed parameters; the registry stores them behind
/// [`DynOperation`], which decodes the raw JSON arguments first.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send + Sync;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    const KIND: OperationKind;

    /// Semantic checks beyond what deserialization already enforces.
    fn validate(&self, _params: &Self::Params) -> bool {
        true
    }

    async fn execute(&self, params: Self::Params) -> Result<String, OperationError>;

    fn parameters_schema() -> Value
    where
        Self: Sized,
    {
        let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
        });
        let schema = settings
            .into_generator()
            .into_root_schema_for::<Self::Params>();

        let mut value = serde_json::to_value(schema)
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        if let Value::Object(map) = &mut value {
            map.remove("$schema");
            map.remove("title");
        }
        value
    }
}

#[async_trait]
pub trait DynOperation: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn kind(&self) -> OperationKind;
    fn parameters_schema(&self) -> Value;

    /// Decodes `params`, runs [`Operation::validate`] and executes. A decode
    /// failure is `InvalidParams` carrying the serde message; a rejected
    /// value is `ValidationFailed`.
    async fn execute_erased(&self, params: Value) -> Result<String, OperationError>;
}

#[async_trait]
impl<T> DynOperation for T
where
    T: Operation,
{
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn description(&self) -> &'static str {
        T::DESCRIPTION
    }

    fn kind(&self) -> OperationKind {
        T::KIND
    }

    fn parameters_schema(&self) -> Value {
        T::parameters_schema()
    }

    async fn execute_erased(&self, params: Value) -> Result<String, OperationError> {
        let typed: T::Params = serde_json::from_value(params)
            .map_err(|e| OperationError::invalid_params(T::NAME, e.to_string()))?;

        if !Operation::validate(self, &typed) {
            return Err(OperationError::ValidationFailed {
                operation: T::NAME.to_string(),
            });
        }

        Operation::execute(self, typed).await
    }
}
