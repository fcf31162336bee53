//! Borrowed resources and their way back to the pool

use crate::manager::ResourceManager;
use crate::pool::Shared;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

/// A borrowed resource that returns to its pool when dropped
///
/// The handle only holds a weak reference to the pool, so an outstanding
/// handle never keeps a pool alive. Dropping a handle whose pool is already
/// gone destroys the resource instead.
pub struct PooledResource<M: ResourceManager> {
    resource: Option<M::Resource>,
    pool: Weak<Shared<M>>,
}

impl<M: ResourceManager> PooledResource<M> {
    pub(crate) fn new(resource: M::Resource, pool: Weak<Shared<M>>) -> Self {
        Self {
            resource: Some(resource),
            pool,
        }
    }

    /// Take the resource out of pool management
    ///
    /// The pool forgets the resource and frees its slot, so maintenance may
    /// connect a replacement.
    pub fn detach(mut this: Self) -> M::Resource {
        let resource = this.resource.take().expect("Resource already taken");
        if let Some(pool) = this.pool.upgrade() {
            pool.forget();
        }
        resource
    }

    /// Whether the issuing pool still exists
    pub fn is_pool_alive(this: &Self) -> bool {
        this.pool.strong_count() > 0
    }

    pub(crate) fn belongs_to(this: &Self, pool: &Arc<Shared<M>>) -> bool {
        Weak::ptr_eq(&this.pool, &Arc::downgrade(pool))
    }

    pub(crate) fn take(mut this: Self) -> M::Resource {
        this.resource.take().expect("Resource already taken")
    }
}

impl<M: ResourceManager> Deref for PooledResource<M> {
    type Target = M::Resource;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("Resource already taken")
    }
}

impl<M: ResourceManager> DerefMut for PooledResource<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("Resource already taken")
    }
}

impl<M: ResourceManager> Drop for PooledResource<M> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };

        match self.pool.upgrade() {
            Some(pool) => {
                // A panicking manager must not take the borrower down with it.
                let returned =
                    panic::catch_unwind(AssertUnwindSafe(|| pool.return_resource(resource)));
                if returned.is_err() {
                    tracing::error!("panic while returning a resource; resource lost");
                }
            }
            None => {
                tracing::debug!("pool already dropped, destroying returned resource");
                drop(resource);
            }
        }
    }
}

impl<M> fmt::Debug for PooledResource<M>
where
    M: ResourceManager,
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledResource")
            .field("resource", &self.resource)
            .field("pool_alive", &(self.pool.strong_count() > 0))
            .finish()
    }
}
