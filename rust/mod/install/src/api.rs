use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use invent_core::ServiceError;
use invent_remote::{Envelope, OperationRequest, RemoteService};

use crate::allocator::{active_capacity, free_ports, PortAllocator};
use crate::backend::SqlBackend;
use crate::error::InstallError;
use crate::model::{DeviceSerial, NewSerial};

/// Path of the operation endpoint, relative to the server root.
pub const OPS_PATH: &str = "/install/v1/ops";

/// Shared application state.
pub type AppState = Arc<SqlBackend>;

/// Build the install API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/install/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ops", post(run_operation))
        .route("/serials", post(provision_serial))
        .route("/sites/{code}/ports", get(site_ports))
}

/// Standard API error response body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError {
            status: err.status_code(),
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

impl From<InstallError> for ApiError {
    fn from(err: InstallError) -> Self {
        ServiceError::from(err).into()
    }
}

/// Wrap a Result<T, ServiceError> into an API response.
pub(crate) fn ok_json<T: Serialize>(result: Result<T, ServiceError>) -> Result<Json<T>, ApiError> {
    result.map(Json).map_err(ApiError::from)
}

/// Operation failures travel inside the envelope; the HTTP status stays 200.
async fn run_operation(
    State(backend): State<AppState>,
    Json(req): Json<OperationRequest>,
) -> Json<Envelope> {
    Json(backend.execute_envelope(&req.operation_name, req.variables))
}

async fn provision_serial(
    State(backend): State<AppState>,
    Json(input): Json<NewSerial>,
) -> Result<(StatusCode, Json<DeviceSerial>), ApiError> {
    let serial = ok_json(backend.provision_serial(&input))?;
    Ok((StatusCode::CREATED, serial))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SitePorts {
    installation_code: String,
    capacity: u32,
    free_ports: BTreeSet<u32>,
}

async fn site_ports(
    State(backend): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<SitePorts>, ApiError> {
    let remote: Arc<dyn RemoteService> = backend;
    let allocator = PortAllocator::new(remote);
    let installations = allocator.installations(&code).await?;
    let customers = allocator.customers(&code).await?;
    let capacity = active_capacity(&installations);
    Ok(Json(SitePorts {
        free_ports: free_ports(capacity, customers.iter().map(|c| c.port)),
        installation_code: code,
        capacity,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use invent_sql::SqliteStore;

    fn app() -> Router {
        let store = SqliteStore::open_in_memory().unwrap();
        router(Arc::new(SqlBackend::new(Arc::new(store)).unwrap()))
    }

    async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        let resp = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::json!(null)
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::json!(null))
        };
        (status, json)
    }

    #[tokio::test]
    async fn provision_then_resolve_over_ops_endpoint() {
        let router = app();
        let (status, serial) = call(
            &router,
            "POST",
            "/install/v1/serials",
            Some(serde_json::json!({"serialNumber": "SN-001", "productName": "ODP-8", "capacity": 8})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(serial["capacity"], 8);

        let (status, env) = call(
            &router,
            "POST",
            OPS_PATH,
            Some(serde_json::json!({
                "operationName": "FindProductBySerialNumber",
                "variables": {"serialNumber": "SN-001"},
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(env["data"]["productSerials"][0]["product"]["name"], "ODP-8");
        assert!(env.get("errors").is_none());
    }

    #[tokio::test]
    async fn operation_errors_are_reported_in_envelope() {
        let router = app();
        let (status, env) = call(
            &router,
            "POST",
            OPS_PATH,
            Some(serde_json::json!({
                "operationName": "InsertInstallationLink",
                "variables": {"installationCode": "SITE-7", "serialId": "missing"},
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(env["errors"][0]["code"], "NOT_FOUND");
        assert!(env.get("data").is_none());
    }

    #[tokio::test]
    async fn duplicate_serial_is_conflict() {
        let router = app();
        let body = serde_json::json!({"serialNumber": "SN-001", "productName": "ODP-8"});
        call(&router, "POST", "/install/v1/serials", Some(body.clone())).await;
        let (status, json) = call(&router, "POST", "/install/v1/serials", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn unknown_site_has_no_ports() {
        let router = app();
        let (status, json) = call(&router, "GET", "/install/v1/sites/NOWHERE/ports", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["capacity"], 0);
        assert_eq!(json["freePorts"], serde_json::json!([]));
    }

    async fn op(router: &Router, name: &str, variables: serde_json::Value) -> serde_json::Value {
        let (status, env) = call(
            router,
            "POST",
            OPS_PATH,
            Some(serde_json::json!({"operationName": name, "variables": variables})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(env.get("errors").is_none(), "{}: {}", name, env);
        env["data"].clone()
    }

    #[tokio::test]
    async fn site_ports_excludes_occupied() {
        let router = app();
        let (_, serial) = call(
            &router,
            "POST",
            "/install/v1/serials",
            Some(serde_json::json!({"serialNumber": "SN-001", "productName": "ODP-8", "capacity": 8})),
        )
        .await;
        op(
            &router,
            "InstallProduct",
            serde_json::json!({
                "installationCode": "SITE-7",
                "serialId": serial["id"],
                "installedAt": "2026-01-01T00:00:00Z",
            }),
        )
        .await;
        op(
            &router,
            "InsertCustomer",
            serde_json::json!({"installationCode": "SITE-7", "port": 1, "customerCode": "C-1"}),
        )
        .await;

        let (status, json) = call(&router, "GET", "/install/v1/sites/SITE-7/ports", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["installationCode"], "SITE-7");
        assert_eq!(json["capacity"], 8);
        assert_eq!(json["freePorts"], serde_json::json!([2, 3, 4, 5, 6, 7, 8]));
    }
}
