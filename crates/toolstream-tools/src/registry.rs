use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::OperationError;
use crate::operation::{DynOperation, OperationKind};
use crate::result::OperationResult;

/// Name-indexed set of operations the model may call.
pub struct OperationRegistry {
    operations: HashMap<String, Box<dyn DynOperation>>,
    // Registration order, so tool definitions are stable across requests.
    order: Vec<String>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registers an operation, replacing any previous one with the same name.
    pub fn register<T: DynOperation + 'static>(&mut self, operation: T) {
        let name = operation.name().to_string();
        if self
            .operations
            .insert(name.clone(), Box::new(operation))
            .is_none()
        {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn DynOperation> {
        self.operations.get(name).map(|b| b.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn operations(&self) -> impl Iterator<Item = &dyn DynOperation> {
        self.order
            .iter()
            .filter_map(|name| self.operations.get(name).map(|b| b.as_ref()))
    }

    pub fn operations_of_kind(&self, kind: OperationKind) -> impl Iterator<Item = &dyn DynOperation> {
        self.operations().filter(move |op| op.kind() == kind)
    }

    /// Function-calling tool definitions in the OpenAI chat format.
    pub fn tool_definitions(&self) -> Vec<Value> {
        self.operations()
            .map(|op| {
                json!({
                    "type": "function",
                    "function": {
                        "name": op.name(),
                        "description": op.description(),
                        "parameters": op.parameters_schema(),
                    }
                })
            })
            .collect()
    }

    /// Resolves `name` and hands the raw arguments to the operation, which
    /// decodes and validates them before running.
    pub async fn execute_operation(
        &self,
        name: &str,
        params: Value,
    ) -> Result<String, OperationError> {
        let operation = self
            .get(name)
            .ok_or_else(|| OperationError::unknown(name))?;

        debug!(target: "operation_registry", operation = name, kind = %operation.kind(), "Executing operation");
        operation.execute_erased(params).await
    }

    /// Like [`execute_operation`](Self::execute_operation) but folds the outcome into an envelope.
    pub async fn execute_to_envelope(&self, name: &str, params: Value) -> OperationResult {
        self.execute_operation(name, params).await.into()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
