use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{OperationError, RemoteError};

/// A named request/response operation with typed variables.
pub trait Operation {
    /// Wire name of the operation.
    const NAME: &'static str;

    type Variables: Serialize;
    type Data: DeserializeOwned;
}

/// Anything that can execute operations by name.
///
/// Implemented by the HTTP adapter and by the in-process record store.
#[async_trait::async_trait]
pub trait RemoteService: Send + Sync {
    async fn execute_raw(
        &self,
        name: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, RemoteError>;
}

/// Execute a typed operation: serialise its variables, decode its data.
pub async fn execute<O: Operation>(
    remote: &dyn RemoteService,
    variables: &O::Variables,
) -> Result<O::Data, RemoteError> {
    let vars = serde_json::to_value(variables)
        .map_err(|e| RemoteError::Encode(format!("{}: {}", O::NAME, e)))?;
    debug!(operation = O::NAME, "executing remote operation");
    let data = remote.execute_raw(O::NAME, vars).await?;
    serde_json::from_value(data).map_err(|e| RemoteError::Decode(format!("{}: {}", O::NAME, e)))
}

/// Request body posted to the operation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub operation_name: String,
    #[serde(default)]
    pub variables: serde_json::Value,
}

/// Response body: either `data` or a non-empty `errors` list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OperationError>,
}

impl Envelope {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn err(errors: Vec<OperationError>) -> Self {
        Self { data: None, errors }
    }

    /// Any reported error wins over partial data.
    pub fn into_result(self) -> Result<serde_json::Value, RemoteError> {
        if !self.errors.is_empty() {
            return Err(RemoteError::Operation(self.errors));
        }
        self.data
            .ok_or_else(|| RemoteError::Decode("response has neither data nor errors".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait::async_trait]
    impl RemoteService for Echo {
        async fn execute_raw(
            &self,
            name: &str,
            variables: serde_json::Value,
        ) -> Result<serde_json::Value, RemoteError> {
            match name {
                "Echo" => Ok(serde_json::json!({ "echoed": variables["text"] })),
                _ => Err(RemoteError::operation("NOT_FOUND", format!("unknown operation {name}"))),
            }
        }
    }

    #[derive(Serialize)]
    struct EchoVars {
        text: String,
    }

    #[derive(Deserialize)]
    struct EchoData {
        echoed: String,
    }

    struct EchoOp;

    impl Operation for EchoOp {
        const NAME: &'static str = "Echo";
        type Variables = EchoVars;
        type Data = EchoData;
    }

    struct Missing;

    impl Operation for Missing {
        const NAME: &'static str = "Missing";
        type Variables = EchoVars;
        type Data = EchoData;
    }

    #[tokio::test]
    async fn execute_roundtrips_typed_values() {
        let data = execute::<EchoOp>(&Echo, &EchoVars { text: "SN-001".into() }).await.unwrap();
        assert_eq!(data.echoed, "SN-001");
    }

    #[tokio::test]
    async fn execute_propagates_operation_errors() {
        let err = execute::<Missing>(&Echo, &EchoVars { text: "x".into() })
            .await
            .err()
            .unwrap();
        assert!(err.has_code("NOT_FOUND"));
    }

    #[test]
    fn envelope_errors_win_over_data() {
        let env = Envelope {
            data: Some(serde_json::json!({"x": 1})),
            errors: vec![OperationError::new("INTERNAL", "boom")],
        };
        assert!(matches!(env.into_result(), Err(RemoteError::Operation(_))));
    }

    #[test]
    fn envelope_without_data_is_decode_error() {
        let env: Envelope = serde_json::from_str("{}").unwrap();
        assert!(matches!(env.into_result(), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn request_uses_camel_case_wire_names() {
        let req = OperationRequest {
            operation_name: "FindProductBySerialNumber".into(),
            variables: serde_json::json!({"serialNumber": "SN-001"}),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["operationName"], "FindProductBySerialNumber");
    }
}
