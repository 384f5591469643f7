use std::sync::Arc;

use invent_core::{error_code, now_rfc3339};
use invent_remote::{execute, RemoteService};
use tracing::{info, warn};

use crate::error::InstallError;
use crate::ids::IdGenerator;
use crate::model::{DeviceSerial, InstallationLink};
use crate::ops::{
    DeleteInstallationLink, IdVars, InsertInstallationLink, InstallProduct, InstallVars, LinkVars,
    SerialData, StampInstalledAt, StampVars,
};
use crate::resolver::{Resolution, SerialResolver};

/// How the link insert and the installed-at stamp are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// Two operations; a failed stamp deletes the freshly inserted link.
    #[default]
    Saga,
    /// One `InstallProduct` operation, committed in a single store transaction.
    Atomic,
}

/// Binds a resolved serial to an installation code.
pub struct InstallationBinder {
    remote: Arc<dyn RemoteService>,
    ids: Arc<dyn IdGenerator>,
    mode: BindMode,
}

impl InstallationBinder {
    pub fn new(remote: Arc<dyn RemoteService>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            remote,
            ids,
            mode: BindMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: BindMode) -> Self {
        self.mode = mode;
        self
    }

    /// Bind `resolution.serial` and return its link.
    ///
    /// - Already bound: the existing link is returned untouched.
    /// - No `target_code`: a fresh installation code is minted.
    /// - Otherwise the serial joins the site identified by `target_code`.
    ///
    /// Losing a race against another bind of the same serial returns the
    /// winner's link.
    pub async fn bind(
        &self,
        resolution: &Resolution,
        target_code: Option<&str>,
    ) -> Result<InstallationLink, InstallError> {
        if let Some(link) = &resolution.link {
            if let Some(target) = target_code {
                if target != link.installation_code {
                    warn!(
                        serial = %resolution.serial.serial_number,
                        bound_to = %link.installation_code,
                        requested = target,
                        "serial already bound to another installation, keeping existing link"
                    );
                }
            }
            return Ok(link.clone());
        }

        let code = match target_code {
            Some(code) if code.trim().is_empty() => {
                return Err(InstallError::Validation(
                    "installation code must not be empty".into(),
                ));
            }
            Some(code) => code.to_string(),
            None => self.ids.generate(),
        };

        let serial = &resolution.serial;
        let installed_at = now_rfc3339();
        let result = match self.mode {
            BindMode::Saga => self.bind_saga(serial, &code, &installed_at).await,
            BindMode::Atomic => self.bind_atomic(serial, &code, &installed_at).await,
        };

        match result {
            Ok(link) => {
                info!(
                    serial = %serial.serial_number,
                    installation_code = %link.installation_code,
                    link_id = %link.id,
                    "serial bound"
                );
                Ok(link)
            }
            Err(InstallError::Remote(e)) if e.has_code(error_code::ALREADY_EXISTS) => {
                let current = SerialResolver::new(Arc::clone(&self.remote))
                    .resolve(&serial.serial_number)
                    .await?;
                match current.link {
                    Some(link) => {
                        warn!(
                            serial = %serial.serial_number,
                            installation_code = %link.installation_code,
                            "serial was bound concurrently, using existing link"
                        );
                        Ok(link)
                    }
                    None => Err(InstallError::Remote(e)),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn bind_saga(
        &self,
        serial: &DeviceSerial,
        code: &str,
        installed_at: &str,
    ) -> Result<InstallationLink, InstallError> {
        let remote = self.remote.as_ref();
        let link = execute::<InsertInstallationLink>(
            remote,
            &LinkVars {
                installation_code: code.to_string(),
                serial_id: serial.id.clone(),
            },
        )
        .await?
        .link;

        let stamp = execute::<StampInstalledAt>(
            remote,
            &StampVars {
                serial_id: serial.id.clone(),
                installed_at: installed_at.to_string(),
            },
        )
        .await;

        let failure = match stamp {
            Ok(SerialData { serial: Some(_) }) => return Ok(link),
            Ok(SerialData { serial: None }) => {
                InstallError::DeviceNotFound(serial.serial_number.clone())
            }
            Err(e) => InstallError::Remote(e),
        };

        warn!(
            link_id = %link.id,
            serial = %serial.serial_number,
            "stamping installed-at failed, removing link: {failure}"
        );
        match execute::<DeleteInstallationLink>(remote, &IdVars { id: link.id.clone() }).await {
            Ok(_) => Err(failure),
            Err(compensation) => Err(InstallError::PartialWrite {
                completed: format!("installation link {}", link.id),
                failed: format!("installed-at stamp of serial {}", serial.serial_number),
                reason: format!("{failure}; removing the link failed: {compensation}"),
            }),
        }
    }

    async fn bind_atomic(
        &self,
        serial: &DeviceSerial,
        code: &str,
        installed_at: &str,
    ) -> Result<InstallationLink, InstallError> {
        let data = execute::<InstallProduct>(
            self.remote.as_ref(),
            &InstallVars {
                installation_code: code.to_string(),
                serial_id: serial.id.clone(),
                installed_at: installed_at.to_string(),
            },
        )
        .await
        .map_err(|e| {
            if e.has_code(error_code::NOT_FOUND) {
                InstallError::DeviceNotFound(serial.serial_number.clone())
            } else {
                InstallError::Remote(e)
            }
        })?;
        Ok(data.link)
    }
}
