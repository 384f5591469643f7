use axum::Router;

/// A service module that contributes HTTP routes.
///
/// The server binary collects every module and merges their routes into a
/// single Router.
pub trait Module: Send + Sync {
    /// Module name, used for logging.
    fn name(&self) -> &str;

    /// Return the module's routes. Paths are already prefixed with the module name.
    fn routes(&self) -> Router;
}
