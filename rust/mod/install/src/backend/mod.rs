//! Record store that answers the install operations from SQL.

mod handlers;
mod records;
pub mod schema;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use invent_core::ServiceError;
use invent_remote::{Envelope, Operation, OperationError, RemoteError, RemoteService};
use invent_sql::{SQLError, SQLExec, SQLStore};

use crate::model::{DeviceSerial, NewSerial};
use crate::ops::{
    DeleteCustomer, DeleteInstallationLink, FindCustomersByInstallationCode,
    FindInstallationsByCode, FindProductBySerialNumber, InsertCustomer, InsertInstallationLink,
    InstallProduct, StampInstalledAt, UpdateSerialCapacity,
};

use records::sql_error;

/// Install record store over an embedded SQL database.
pub struct SqlBackend {
    sql: Arc<dyn SQLStore>,
}

impl SqlBackend {
    pub fn new(sql: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Self { sql })
    }

    /// Run one operation by wire name.
    ///
    /// Reads and single-row writes commit on their own; `InstallProduct`
    /// and every check-then-write runs in one transaction.
    pub fn dispatch(
        &self,
        name: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        debug!(operation = name, "dispatching operation");
        let db = self.sql.as_ref();
        match name {
            n if n == FindProductBySerialNumber::NAME => {
                call::<FindProductBySerialNumber>(variables, |v| {
                    handlers::find_product_by_serial_number(db, &v)
                })
            }
            n if n == InsertInstallationLink::NAME => {
                call::<InsertInstallationLink>(variables, |v| {
                    self.atomic(|tx| handlers::insert_installation_link(tx, &v))
                })
            }
            n if n == StampInstalledAt::NAME => {
                call::<StampInstalledAt>(variables, |v| handlers::stamp_installed_at(db, &v))
            }
            n if n == InstallProduct::NAME => call::<InstallProduct>(variables, |v| {
                self.atomic(|tx| handlers::install_product(tx, &v))
            }),
            n if n == FindInstallationsByCode::NAME => {
                call::<FindInstallationsByCode>(variables, |v| {
                    handlers::find_installations_by_code(db, &v)
                })
            }
            n if n == FindCustomersByInstallationCode::NAME => {
                call::<FindCustomersByInstallationCode>(variables, |v| {
                    handlers::find_customers_by_installation_code(db, &v)
                })
            }
            n if n == InsertCustomer::NAME => call::<InsertCustomer>(variables, |v| {
                self.atomic(|tx| handlers::insert_customer(tx, &v))
            }),
            n if n == DeleteInstallationLink::NAME => {
                call::<DeleteInstallationLink>(variables, |v| {
                    self.atomic(|tx| handlers::delete_installation_link(tx, &v))
                })
            }
            n if n == DeleteCustomer::NAME => {
                call::<DeleteCustomer>(variables, |v| {
                    self.atomic(|tx| handlers::delete_customer(tx, &v))
                })
            }
            n if n == UpdateSerialCapacity::NAME => {
                call::<UpdateSerialCapacity>(variables, |v| {
                    self.atomic(|tx| handlers::update_serial_capacity(tx, &v))
                })
            }
            _ => Err(ServiceError::Validation(format!("unknown operation {}", name))),
        }
    }

    /// Run an operation and wrap the outcome for the wire.
    pub fn execute_envelope(&self, name: &str, variables: serde_json::Value) -> Envelope {
        match self.dispatch(name, variables) {
            Ok(data) => Envelope::ok(data),
            Err(e) => {
                debug!(operation = name, code = e.error_code(), "operation failed: {}", e);
                Envelope::err(vec![operation_error(&e)])
            }
        }
    }

    /// Add a device serial to inventory.
    pub fn provision_serial(&self, input: &NewSerial) -> Result<DeviceSerial, ServiceError> {
        let serial = self.atomic(|tx| handlers::provision_serial(tx, input))?;
        info!(
            serial = %serial.serial_number,
            product = %serial.product.name,
            capacity = ?serial.capacity,
            "serial provisioned"
        );
        Ok(serial)
    }

    /// Run `body` in one transaction, carrying its `ServiceError` out unchanged.
    fn atomic<T>(
        &self,
        mut body: impl FnMut(&dyn SQLExec) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut outcome: Option<Result<T, ServiceError>> = None;
        let committed = self.sql.transaction(&mut |tx: &dyn SQLExec| match body(tx) {
            Ok(value) => {
                outcome = Some(Ok(value));
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                outcome = Some(Err(e));
                Err(SQLError::Aborted(reason))
            }
        });

        match (committed, outcome) {
            (Err(SQLError::Aborted(_)), Some(Err(e))) => Err(e),
            (Err(e), _) => Err(sql_error(e)),
            (Ok(()), Some(result)) => result,
            (Ok(()), None) => Err(ServiceError::Internal("transaction produced no result".into())),
        }
    }
}

fn call<O>(
    variables: serde_json::Value,
    handler: impl FnOnce(O::Variables) -> Result<O::Data, ServiceError>,
) -> Result<serde_json::Value, ServiceError>
where
    O: Operation,
    O::Variables: DeserializeOwned,
    O::Data: Serialize,
{
    let vars: O::Variables = serde_json::from_value(variables)
        .map_err(|e| ServiceError::Validation(format!("{}: invalid variables: {}", O::NAME, e)))?;
    let data = handler(vars)?;
    serde_json::to_value(&data).map_err(|e| ServiceError::Internal(e.to_string()))
}

fn operation_error(err: &ServiceError) -> OperationError {
    OperationError::new(err.error_code(), err.to_string())
}

#[async_trait::async_trait]
impl RemoteService for SqlBackend {
    async fn execute_raw(
        &self,
        name: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, RemoteError> {
        self.dispatch(name, variables)
            .map_err(|e| RemoteError::Operation(vec![operation_error(&e)]))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use invent_sql::SqliteStore;

    fn backend() -> SqlBackend {
        let store = SqliteStore::open_in_memory().unwrap();
        SqlBackend::new(Arc::new(store)).unwrap()
    }

    fn provision(b: &SqlBackend, sn: &str, capacity: Option<u32>) -> DeviceSerial {
        b.provision_serial(&NewSerial {
            serial_number: sn.into(),
            product_name: "ODP".into(),
            capacity,
        })
        .unwrap()
    }

    #[test]
    fn provisioning_reuses_product_and_rejects_duplicates() {
        let b = backend();
        let a = provision(&b, "SN-001", Some(8));
        let c = provision(&b, "SN-002", Some(16));
        assert_eq!(a.product.id, c.product.id);

        let dup = b.provision_serial(&NewSerial {
            serial_number: "SN-001".into(),
            product_name: "ODP".into(),
            capacity: None,
        });
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn find_by_serial_is_exact_and_case_sensitive() {
        let b = backend();
        provision(&b, "SN-001", Some(8));

        let hit = b
            .dispatch("FindProductBySerialNumber", json!({"serialNumber": "SN-001"}))
            .unwrap();
        assert_eq!(hit["productSerials"][0]["serialNumber"], "SN-001");
        assert!(hit["productSerials"][0]["installation"].is_null());

        let miss = b
            .dispatch("FindProductBySerialNumber", json!({"serialNumber": "sn-001"}))
            .unwrap();
        assert_eq!(miss["productSerials"], json!([]));
    }

    #[test]
    fn second_link_for_serial_is_rejected() {
        let b = backend();
        let s = provision(&b, "SN-001", Some(8));
        b.dispatch("InsertInstallationLink", json!({"installationCode": "A", "serialId": s.id}))
            .unwrap();
        let err = b
            .dispatch("InsertInstallationLink", json!({"installationCode": "B", "serialId": s.id}))
            .unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");
    }

    #[test]
    fn link_to_unknown_serial_is_not_found() {
        let b = backend();
        let err = b
            .dispatch("InsertInstallationLink", json!({"installationCode": "A", "serialId": "nope"}))
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn install_product_rolls_back_on_failure() {
        let b = backend();
        let s = provision(&b, "SN-001", Some(8));
        b.dispatch("InsertInstallationLink", json!({"installationCode": "A", "serialId": s.id}))
            .unwrap();

        let err = b
            .dispatch(
                "InstallProduct",
                json!({"installationCode": "B", "serialId": s.id, "installedAt": "2026-01-01T00:00:00Z"}),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");

        let site = b
            .dispatch("FindInstallationsByCode", json!({"installationCode": "B"}))
            .unwrap();
        assert_eq!(site["installations"], json!([]));
        let found = b
            .dispatch("FindProductBySerialNumber", json!({"serialNumber": "SN-001"}))
            .unwrap();
        assert!(found["productSerials"][0].get("installedAt").is_none());
    }

    #[test]
    fn customers_are_unique_per_port_and_bounded() {
        let b = backend();
        let s = provision(&b, "SN-001", Some(8));
        b.dispatch(
            "InstallProduct",
            json!({"installationCode": "SITE-7", "serialId": s.id, "installedAt": "2026-01-01T00:00:00Z"}),
        )
        .unwrap();

        let vars = json!({"installationCode": "SITE-7", "port": 3, "customerCode": "C-1"});
        b.dispatch("InsertCustomer", vars.clone()).unwrap();
        let err = b.dispatch("InsertCustomer", vars).unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");

        let err = b
            .dispatch(
                "InsertCustomer",
                json!({"installationCode": "SITE-7", "port": 9, "customerCode": "C-2"}),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn deleting_missing_rows_returns_null() {
        let b = backend();
        let data = b.dispatch("DeleteCustomer", json!({"id": "nope"})).unwrap();
        assert!(data["customer"].is_null());
        let data = b.dispatch("DeleteInstallationLink", json!({"id": "nope"})).unwrap();
        assert!(data["link"].is_null());
    }

    #[test]
    fn second_delete_of_same_rows_returns_null() {
        let b = backend();
        let s = provision(&b, "SN-001", Some(8));
        let installed = b
            .dispatch(
                "InstallProduct",
                json!({"installationCode": "SITE-7", "serialId": s.id, "installedAt": "2026-01-01T00:00:00Z"}),
            )
            .unwrap();
        let link_id = installed["link"]["id"].as_str().unwrap().to_string();
        let inserted = b
            .dispatch(
                "InsertCustomer",
                json!({"installationCode": "SITE-7", "port": 2, "customerCode": "C-1"}),
            )
            .unwrap();
        let customer_id = inserted["customer"]["id"].as_str().unwrap().to_string();

        let first = b.dispatch("DeleteCustomer", json!({"id": customer_id})).unwrap();
        assert_eq!(first["customer"]["port"], 2);
        let second = b.dispatch("DeleteCustomer", json!({"id": customer_id})).unwrap();
        assert!(second["customer"].is_null());

        let first = b.dispatch("DeleteInstallationLink", json!({"id": link_id})).unwrap();
        assert_eq!(first["link"]["installationCode"], "SITE-7");
        let second = b.dispatch("DeleteInstallationLink", json!({"id": link_id})).unwrap();
        assert!(second["link"].is_null());
    }

    #[test]
    fn unknown_operation_and_bad_variables_are_validation_errors() {
        let b = backend();
        let env = b.execute_envelope("DropTables", json!({}));
        assert_eq!(env.errors[0].code.as_deref(), Some("VALIDATION_FAILED"));
        let env = b.execute_envelope("DeleteCustomer", json!({"identifier": 1}));
        assert_eq!(env.errors[0].code.as_deref(), Some("VALIDATION_FAILED"));
        assert!(env.data.is_none());
    }
}
