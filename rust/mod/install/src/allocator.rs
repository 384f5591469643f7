use std::collections::BTreeSet;
use std::sync::Arc;

use invent_core::error_code;
use invent_remote::{execute, RemoteService};
use tracing::info;

use crate::error::InstallError;
use crate::model::{Customer, CustomerFields, DeviceRole, DeviceSerial, LinkedSerial, SiteDevice};
use crate::ops::{
    CapacityVars, CodeVars, FindCustomersByInstallationCode, FindInstallationsByCode,
    InsertCustomer, NewCustomerVars, UpdateSerialCapacity,
};
use crate::resolver::Resolution;

/// Capacity of the first linked device (oldest first) with a nonzero capacity, else 0.
pub fn active_capacity(installations: &[LinkedSerial]) -> u32 {
    installations
        .iter()
        .filter_map(|i| i.serial.as_ref())
        .find_map(DeviceSerial::port_capacity)
        .unwrap_or(0)
}

/// `{1..=capacity}` minus `occupied`, ascending.
pub fn free_ports(capacity: u32, occupied: impl IntoIterator<Item = u32>) -> BTreeSet<u32> {
    let mut ports: BTreeSet<u32> = (1..=capacity).collect();
    for port in occupied {
        ports.remove(&port);
    }
    ports
}

/// Tag each linked device with its role; at most one is `Active`.
pub fn assign_roles(installations: Vec<LinkedSerial>) -> Vec<SiteDevice> {
    let mut active_taken = false;
    installations
        .into_iter()
        .map(|LinkedSerial { link, serial }| {
            let supplies = serial.as_ref().and_then(DeviceSerial::port_capacity).is_some();
            let role = if supplies && !active_taken {
                active_taken = true;
                DeviceRole::Active
            } else {
                DeviceRole::Attached
            };
            SiteDevice { link, serial, role }
        })
        .collect()
}

/// Allocates customer ports against a site's capacity.
pub struct PortAllocator {
    remote: Arc<dyn RemoteService>,
}

impl PortAllocator {
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self { remote }
    }

    /// All links sharing `code`, oldest first, with their devices.
    pub async fn installations(&self, code: &str) -> Result<Vec<LinkedSerial>, InstallError> {
        let data = execute::<FindInstallationsByCode>(self.remote.as_ref(), &code_vars(code)).await?;
        Ok(data.installations)
    }

    /// Live customers at `code`, by port.
    pub async fn customers(&self, code: &str) -> Result<Vec<Customer>, InstallError> {
        let data =
            execute::<FindCustomersByInstallationCode>(self.remote.as_ref(), &code_vars(code))
                .await?;
        Ok(data.customers)
    }

    pub async fn capacity(&self, code: &str) -> Result<u32, InstallError> {
        Ok(active_capacity(&self.installations(code).await?))
    }

    /// Devices at a site with explicit active/attached roles.
    pub async fn site_devices(&self, code: &str) -> Result<Vec<SiteDevice>, InstallError> {
        Ok(assign_roles(self.installations(code).await?))
    }

    /// Ports at `code` not held by any customer. Empty when no device supplies capacity.
    pub async fn available_ports(&self, code: &str) -> Result<BTreeSet<u32>, InstallError> {
        let capacity = self.capacity(code).await?;
        if capacity == 0 {
            return Ok(BTreeSet::new());
        }
        let customers = self.customers(code).await?;
        Ok(free_ports(capacity, customers.iter().map(|c| c.port)))
    }

    /// Provision a customer on `port`.
    ///
    /// The store holds (installation code, port) unique, so a port taken
    /// since the caller listed free ports comes back as `PortConflict`.
    pub async fn assign(
        &self,
        code: &str,
        port: u32,
        fields: CustomerFields,
    ) -> Result<Customer, InstallError> {
        if fields.customer_code.trim().is_empty() {
            return Err(InstallError::Validation("customer id must not be empty".into()));
        }

        let capacity = self.capacity(code).await?;
        if capacity == 0 {
            return Err(InstallError::CapacityExhausted(code.to_string()));
        }
        if port == 0 || port > capacity {
            return Err(InstallError::PortOutOfRange {
                installation_code: code.to_string(),
                port,
                capacity,
            });
        }

        let vars = NewCustomerVars {
            installation_code: code.to_string(),
            port,
            fields,
        };
        let customer = match execute::<InsertCustomer>(self.remote.as_ref(), &vars).await {
            Ok(data) => data.customer,
            Err(e) if e.has_code(error_code::ALREADY_EXISTS) => {
                return Err(InstallError::PortConflict {
                    installation_code: code.to_string(),
                    port,
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            installation_code = code,
            port,
            customer_id = %customer.id,
            "customer provisioned"
        );
        Ok(customer)
    }

    /// Provision a customer on the lowest free port.
    pub async fn assign_first_free(
        &self,
        code: &str,
        fields: CustomerFields,
    ) -> Result<Customer, InstallError> {
        let port = self
            .available_ports(code)
            .await?
            .first()
            .copied()
            .ok_or_else(|| InstallError::CapacityExhausted(code.to_string()))?;
        self.assign(code, port, fields).await
    }

    /// Change the port capacity of a resolved device.
    ///
    /// Rejected when the site's resulting capacity would strand an occupied port.
    pub async fn update_capacity(
        &self,
        resolution: &Resolution,
        capacity: u32,
    ) -> Result<DeviceSerial, InstallError> {
        if capacity == 0 {
            return Err(InstallError::Validation("capacity must be greater than zero".into()));
        }

        if let Some(link) = &resolution.link {
            let code = link.installation_code.as_str();
            let mut installations = self.installations(code).await?;
            for entry in installations.iter_mut() {
                if let Some(serial) = entry.serial.as_mut() {
                    if serial.id == resolution.serial.id {
                        serial.capacity = Some(capacity);
                    }
                }
            }
            let resulting = active_capacity(&installations);
            let highest = self.customers(code).await?.iter().map(|c| c.port).max();
            if let Some(highest) = highest {
                if highest > resulting {
                    return Err(InstallError::Validation(format!(
                        "port {} is occupied at installation {}, capacity cannot drop to {}",
                        highest, code, resulting
                    )));
                }
            }
        }

        let data = execute::<UpdateSerialCapacity>(
            self.remote.as_ref(),
            &CapacityVars {
                serial_id: resolution.serial.id.clone(),
                capacity,
            },
        )
        .await?;

        let serial = data.serial.ok_or_else(|| InstallError::RecordNotFound {
            kind: "device serial",
            id: resolution.serial.id.clone(),
        })?;
        info!(serial = %serial.serial_number, capacity, "capacity updated");
        Ok(serial)
    }
}

fn code_vars(code: &str) -> CodeVars {
    CodeVars {
        installation_code: code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InstallationLink, Product};

    fn linked(id: &str, capacity: Option<u32>) -> LinkedSerial {
        LinkedSerial {
            link: InstallationLink {
                id: format!("l-{id}"),
                installation_code: "SITE-7".into(),
                serial_id: id.into(),
                create_at: None,
                update_at: None,
            },
            serial: Some(DeviceSerial {
                id: id.into(),
                serial_number: format!("SN-{id}"),
                product: Product { id: "p".into(), name: "ODP".into() },
                capacity,
                capacity_remaining: None,
                installed_at: None,
                create_at: None,
                update_at: None,
            }),
        }
    }

    #[test]
    fn capacity_comes_from_first_nonzero_device() {
        let site = vec![linked("a", None), linked("b", Some(0)), linked("c", Some(16)), linked("d", Some(8))];
        assert_eq!(active_capacity(&site), 16);
    }

    #[test]
    fn no_qualifying_device_means_zero_capacity() {
        assert_eq!(active_capacity(&[]), 0);
        assert_eq!(active_capacity(&[linked("a", Some(0))]), 0);
        let mut orphan = linked("x", Some(8));
        orphan.serial = None;
        assert_eq!(active_capacity(&[orphan]), 0);
    }

    #[test]
    fn free_ports_excludes_occupied_and_ignores_out_of_range() {
        let free = free_ports(8, [1, 3, 42]);
        assert_eq!(free.into_iter().collect::<Vec<_>>(), vec![2, 4, 5, 6, 7, 8]);
        assert!(free_ports(0, [1]).is_empty());
    }

    #[test]
    fn roles_mark_single_active_device() {
        let devices = assign_roles(vec![linked("a", None), linked("b", Some(8)), linked("c", Some(16))]);
        let roles: Vec<_> = devices.iter().map(|d| d.role).collect();
        assert_eq!(
            roles,
            vec![DeviceRole::Attached, DeviceRole::Active, DeviceRole::Attached]
        );
    }
}
