use std::sync::Arc;

use invent_remote::{execute, RemoteService};
use serde::Serialize;
use tracing::debug;

use crate::error::InstallError;
use crate::model::{DeviceSerial, InstallationLink};
use crate::ops::{FindProductBySerialNumber, SerialNumberVars};

/// A scanned serial with its current installation link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub serial: DeviceSerial,
    pub link: Option<InstallationLink>,
}

impl Resolution {
    pub fn is_bound(&self) -> bool {
        self.link.is_some()
    }
}

/// Maps a scanned serial number to its device record.
pub struct SerialResolver {
    remote: Arc<dyn RemoteService>,
}

impl SerialResolver {
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self { remote }
    }

    /// Look up the device whose serial number equals `serial_number` exactly.
    ///
    /// When the store holds duplicates the first match is used.
    pub async fn resolve(&self, serial_number: &str) -> Result<Resolution, InstallError> {
        if serial_number.trim().is_empty() {
            return Err(InstallError::InvalidScan);
        }

        let data = execute::<FindProductBySerialNumber>(
            self.remote.as_ref(),
            &SerialNumberVars {
                serial_number: serial_number.to_string(),
            },
        )
        .await?;

        let found = data
            .product_serials
            .into_iter()
            .next()
            .ok_or_else(|| InstallError::DeviceNotFound(serial_number.to_string()))?;

        debug!(
            serial_number,
            serial_id = %found.serial.id,
            bound = found.installation.is_some(),
            "resolved serial"
        );
        Ok(Resolution {
            serial: found.serial,
            link: found.installation,
        })
    }
}
