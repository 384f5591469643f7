use std::sync::Arc;

use invent_remote::{execute, RemoteService};
use tracing::info;

use crate::error::InstallError;
use crate::ops::{DeleteCustomer, DeleteInstallationLink, IdVars};

/// Hard-deletes links and customers. There is no undo.
pub struct DismantleHandler {
    remote: Arc<dyn RemoteService>,
}

impl DismantleHandler {
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self { remote }
    }

    /// Delete an installation link, freeing its serial for rebinding.
    ///
    /// The serial's installed-at timestamp is left as it was.
    pub async fn detach_installation(&self, link_id: &str) -> Result<(), InstallError> {
        let data = execute::<DeleteInstallationLink>(
            self.remote.as_ref(),
            &IdVars { id: link_id.to_string() },
        )
        .await?;
        let link = data.link.ok_or_else(|| InstallError::RecordNotFound {
            kind: "installation link",
            id: link_id.to_string(),
        })?;
        info!(
            link_id,
            installation_code = %link.installation_code,
            serial_id = %link.serial_id,
            "installation detached"
        );
        Ok(())
    }

    /// Delete a customer, freeing its port.
    pub async fn dismantle_customer(&self, customer_id: &str) -> Result<(), InstallError> {
        let data = execute::<DeleteCustomer>(
            self.remote.as_ref(),
            &IdVars { id: customer_id.to_string() },
        )
        .await?;
        let customer = data.customer.ok_or_else(|| InstallError::RecordNotFound {
            kind: "customer",
            id: customer_id.to_string(),
        })?;
        info!(
            customer_id,
            installation_code = %customer.installation_code,
            port = customer.port,
            "customer dismantled"
        );
        Ok(())
    }
}
