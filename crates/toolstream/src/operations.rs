//! Operations the CLI exposes to the model.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use toolstream_tools::{Operation, OperationError, OperationKind, OperationRegistry};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EchoParams {
    /// Text to return unchanged.
    pub text: String,
}

/// Returns its input. Useful for checking a model's tool-calling.
pub struct Echo;

#[async_trait]
impl Operation for Echo {
    type Params = EchoParams;

    const NAME: &'static str = "echo";
    const DESCRIPTION: &'static str = "Return the given text unchanged.";
    const KIND: OperationKind = OperationKind::Query;

    async fn execute(&self, params: Self::Params) -> Result<String, OperationError> {
        Ok(params.text)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SumParams {
    /// Numbers to add.
    pub values: Vec<f64>,
}

pub struct Sum;

#[async_trait]
impl Operation for Sum {
    type Params = SumParams;

    const NAME: &'static str = "sum";
    const DESCRIPTION: &'static str = "Add a list of numbers.";
    const KIND: OperationKind = OperationKind::Query;

    fn validate(&self, params: &Self::Params) -> bool {
        !params.values.is_empty() && params.values.iter().all(|v| v.is_finite())
    }

    async fn execute(&self, params: Self::Params) -> Result<String, OperationError> {
        Ok(params.values.iter().sum::<f64>().to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PrepareTransferParams {
    /// Recipient address.
    pub recipient: String,
    /// Amount as a decimal string.
    pub amount: String,
    /// Token denomination, e.g. `ukava`.
    pub denom: String,
}

/// Builds an unsigned transfer for the user to review and sign elsewhere.
pub struct PrepareTransfer;

#[async_trait]
impl Operation for PrepareTransfer {
    type Params = PrepareTransferParams;

    const NAME: &'static str = "prepare_transfer";
    const DESCRIPTION: &'static str =
        "Prepare an unsigned token transfer. Nothing is broadcast; the user signs it separately.";
    const KIND: OperationKind = OperationKind::Transaction;

    fn validate(&self, params: &Self::Params) -> bool {
        !params.recipient.trim().is_empty()
            && !params.denom.trim().is_empty()
            && params.amount.parse::<f64>().is_ok_and(|v| v > 0.0)
    }

    async fn execute(&self, params: Self::Params) -> Result<String, OperationError> {
        let unsigned = serde_json::json!({
            "type": "transfer",
            "to": params.recipient,
            "amount": [{ "denom": params.denom, "amount": params.amount }],
        });
        Ok(format!("Unsigned transfer ready for signing: {unsigned}"))
    }
}

/// Registry with every operation the CLI offers.
pub fn default_registry() -> Arc<OperationRegistry> {
    let mut registry = OperationRegistry::new();
    registry.register(Echo);
    registry.register(Sum);
    registry.register(PrepareTransfer);
    Arc::new(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolstream_tools::OperationStatus;

    #[test]
    fn test_default_registry_exposes_all_operations() {
        let registry = default_registry();
        let names: Vec<_> = registry.operations().map(|op| op.name()).collect();
        assert_eq!(names, vec!["echo", "sum", "prepare_transfer"]);
        assert_eq!(
            registry
                .operations_of_kind(OperationKind::Transaction)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_sum_rejects_empty_input() {
        let registry = default_registry();
        let ok = registry
            .execute_to_envelope("sum", json!({ "values": [1.5, 2.5] }))
            .await;
        assert_eq!(ok.info, "4");

        let empty = registry
            .execute_to_envelope("sum", json!({ "values": [] }))
            .await;
        assert_eq!(empty.status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_prepare_transfer_requires_positive_amount() {
        let registry = default_registry();
        let rejected = registry
            .execute_to_envelope(
                "prepare_transfer",
                json!({ "recipient": "kava1abc", "amount": "0", "denom": "ukava" }),
            )
            .await;
        assert_eq!(rejected.status, OperationStatus::Failed);

        let prepared = registry
            .execute_to_envelope(
                "prepare_transfer",
                json!({ "recipient": "kava1abc", "amount": "10", "denom": "ukava" }),
            )
            .await;
        assert!(prepared.is_ok());
        assert!(prepared.info.contains("\"to\":\"kava1abc\""));
    }
}
