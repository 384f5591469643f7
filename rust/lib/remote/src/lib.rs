//! Named-operation remote service.
//!
//! The record store is reached through request/response operations keyed by
//! name with typed variables. Each operation returns either data or a list of
//! errors, and every operation commits independently: nothing here spans two
//! operations with a transaction.
//!
//! # Usage
//!
//! ```ignore
//! use invent_remote::{execute, HttpRemote, NoAuth};
//!
//! let remote = HttpRemote::new("http://localhost:8080/install/v1/ops", Arc::new(NoAuth));
//! let data = execute::<FindProductBySerialNumber>(&remote, &vars).await?;
//! ```

mod auth;
mod error;
mod http;
mod operation;

pub use auth::{NoAuth, StaticToken, TokenSource};
pub use error::{OperationError, RemoteError};
pub use http::HttpRemote;
pub use operation::{execute, Envelope, Operation, OperationRequest, RemoteService};
