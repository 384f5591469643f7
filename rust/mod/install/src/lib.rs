//! Field installation: bind scanned devices to sites and allocate their ports.

pub mod allocator;
pub mod api;
pub mod backend;
pub mod binder;
pub mod dismantle;
pub mod error;
pub mod ids;
pub mod model;
pub mod ops;
pub mod resolver;
pub mod scan;
pub mod workflow;

use std::sync::Arc;

use axum::Router;
use invent_core::{Module, ServiceError};
use invent_sql::SQLStore;

pub use allocator::PortAllocator;
pub use backend::SqlBackend;
pub use binder::{BindMode, InstallationBinder};
pub use dismantle::DismantleHandler;
pub use error::InstallError;
pub use ids::{IdGenerator, UuidGenerator};
pub use resolver::{Resolution, SerialResolver};
pub use scan::{ScanEvent, ScanHub, ScanListener, ScanSource};
pub use workflow::{FieldSession, Navigation, ScanContext, ScanOutcome, SiteOverview};

/// Install module: the record store behind the operation endpoint.
pub struct InstallModule {
    backend: Arc<SqlBackend>,
}

impl InstallModule {
    pub fn new(sql: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        Ok(Self {
            backend: Arc::new(SqlBackend::new(sql)?),
        })
    }

    pub fn backend(&self) -> Arc<SqlBackend> {
        Arc::clone(&self.backend)
    }
}

impl Module for InstallModule {
    fn name(&self) -> &str {
        "install"
    }

    fn routes(&self) -> Router {
        api::router(self.backend())
    }
}
