//! The capability a pool needs from the resources it manages

use crate::config::Endpoint;

use std::time::Duration;

/// Creates, checks and tears down pooled resources
///
/// The pool never looks inside a resource; everything it knows about one
/// goes through this trait. A resource dropped without [`close`] (for
/// example when a handle outlives its pool) must release what it holds in
/// its own `Drop`.
///
/// [`close`]: ResourceManager::close
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Endpoint, ResourceManager};
/// use std::time::Duration;
///
/// struct Counter;
///
/// impl ResourceManager for Counter {
///     type Resource = u64;
///     type Error = std::io::Error;
///
///     fn connect(&self, _: &Endpoint, _: Duration) -> Result<u64, Self::Error> {
///         Ok(0)
///     }
///
///     fn is_healthy(&self, value: &mut u64) -> bool {
///         *value < 1_000
///     }
///
///     fn close(&self, value: &mut u64) {
///         *value = 0;
///     }
/// }
/// ```
pub trait ResourceManager: Send + Sync + 'static {
    type Resource: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new resource
    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Self::Resource, Self::Error>;

    /// Round-trip check, e.g. a ping
    fn is_healthy(&self, resource: &mut Self::Resource) -> bool;

    /// Release whatever the resource holds
    ///
    /// May be called on a resource that is already closed.
    fn close(&self, resource: &mut Self::Resource);

    /// Bring a broken resource back to life
    ///
    /// The default closes it and replaces it with a fresh connection.
    fn reconnect(
        &self,
        resource: &mut Self::Resource,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<(), Self::Error> {
        self.close(resource);
        *resource = self.connect(endpoint, timeout)?;
        Ok(())
    }
}
