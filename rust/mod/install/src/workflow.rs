//! Scan → resolve → confirm → dashboard, with state held per session.

use std::collections::BTreeSet;
use std::sync::Arc;

use invent_remote::RemoteService;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::allocator::{assign_roles, PortAllocator};
use crate::binder::{BindMode, InstallationBinder};
use crate::error::InstallError;
use crate::ids::IdGenerator;
use crate::model::{Customer, DeviceSerial, InstallationLink, SiteDevice};
use crate::resolver::{Resolution, SerialResolver};
use crate::scan::{ScanEvent, ScanListener};

/// Where a scan happened.
///
/// Both fields are empty for a fresh, top-level scan. Scanning from a
/// site's dashboard sets them so the new device joins that site and the
/// technician returns to the device they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub installation_code: Option<String>,
    pub serial_number: Option<String>,
}

impl ScanContext {
    pub fn top_level() -> Self {
        Self::default()
    }

    pub fn at_site(installation_code: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            installation_code: Some(installation_code.into()),
            serial_number: Some(serial_number.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Found {
        event: ScanEvent,
        resolution: Resolution,
    },
    /// The scanned value matched no device; the technician should rescan.
    NotFound { payload: String },
}

/// Dashboard to open after a confirmed scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub serial_number: String,
    pub installation_code: String,
    pub link: InstallationLink,
}

/// Everything the dashboard of one device shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteOverview {
    pub serial: DeviceSerial,
    pub link: Option<InstallationLink>,
    /// Other devices at the same site.
    pub devices: Vec<SiteDevice>,
    pub customers: Vec<Customer>,
    pub free_ports: BTreeSet<u32>,
}

/// One technician's pass through the install flow.
pub struct FieldSession {
    context: ScanContext,
    resolver: SerialResolver,
    binder: InstallationBinder,
    allocator: PortAllocator,
}

impl FieldSession {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        ids: Arc<dyn IdGenerator>,
        context: ScanContext,
    ) -> Self {
        Self {
            context,
            resolver: SerialResolver::new(Arc::clone(&remote)),
            binder: InstallationBinder::new(Arc::clone(&remote), ids),
            allocator: PortAllocator::new(remote),
        }
    }

    pub fn with_bind_mode(mut self, mode: BindMode) -> Self {
        self.binder = self.binder.with_mode(mode);
        self
    }

    pub fn resolver(&self) -> &SerialResolver {
        &self.resolver
    }

    pub fn allocator(&self) -> &PortAllocator {
        &self.allocator
    }

    /// Resolve a scan. An unknown serial is an outcome, not an error.
    pub async fn handle_scan(&self, event: ScanEvent) -> Result<ScanOutcome, InstallError> {
        match self.resolver.resolve(&event.payload).await {
            Ok(resolution) => Ok(ScanOutcome::Found { event, resolution }),
            Err(InstallError::DeviceNotFound(payload)) => Ok(ScanOutcome::NotFound { payload }),
            Err(e) => Err(e),
        }
    }

    /// Wait for the next scan and resolve it.
    ///
    /// Returns `None` when `cancel` fires or the scan source goes away. A
    /// resolve already started runs to completion.
    pub async fn next_outcome(
        &self,
        listener: &mut ScanListener,
        cancel: &CancellationToken,
    ) -> Option<Result<ScanOutcome, InstallError>> {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("scan listener cancelled");
                return None;
            }
            event = listener.next() => event?,
        };
        Some(self.handle_scan(event).await)
    }

    /// Bind the scanned device and work out which dashboard to open.
    pub async fn confirm(
        &self,
        scanned: &str,
        resolution: &Resolution,
    ) -> Result<Navigation, InstallError> {
        let link = self
            .binder
            .bind(resolution, self.context.installation_code.as_deref())
            .await?;
        let serial_number = self
            .context
            .serial_number
            .clone()
            .unwrap_or_else(|| scanned.to_string());
        Ok(Navigation {
            serial_number,
            installation_code: link.installation_code.clone(),
            link,
        })
    }

    /// Load the dashboard for `serial_number`.
    pub async fn dashboard(&self, serial_number: &str) -> Result<SiteOverview, InstallError> {
        let resolution = self.resolver.resolve(serial_number).await?;
        let Some(link) = resolution.link.clone() else {
            return Ok(SiteOverview {
                serial: resolution.serial,
                link: None,
                devices: Vec::new(),
                customers: Vec::new(),
                free_ports: BTreeSet::new(),
            });
        };

        let code = link.installation_code.as_str();
        let devices = assign_roles(self.allocator.installations(code).await?)
            .into_iter()
            .filter(|d| {
                d.serial
                    .as_ref()
                    .map_or(true, |s| s.serial_number != serial_number)
            })
            .collect();
        let customers = self.allocator.customers(code).await?;
        let free_ports = self.allocator.available_ports(code).await?;

        Ok(SiteOverview {
            serial: resolution.serial,
            link: Some(link),
            devices,
            customers,
            free_ports,
        })
    }
}
