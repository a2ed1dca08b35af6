//! Explicit tenant context.
//!
//! The tenant for a request is resolved once at the edge (subdomain, session,
//! header; not decided here) and then passed by value into every persistence
//! and service call. Nothing reads the tenant from global or thread-local state.

use thiserror::Error;
use uuid::Uuid;

use crate::types::{TenantId, UserId};

/// The calling context carries no usable tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Tenant context is missing")]
pub struct MissingTenant;

/// Supplies the tenant of the current request.
pub trait TenantResolver {
    /// Returns the current tenant, or `MissingTenant` if none can be determined.
    ///
    /// # Errors
    ///
    /// Returns `MissingTenant` when the request is not bound to a tenant.
    fn current_tenant(&self) -> Result<TenantId, MissingTenant>;
}

impl TenantResolver for TenantId {
    fn current_tenant(&self) -> Result<TenantId, MissingTenant> {
        Ok(*self)
    }
}

impl TenantResolver for Option<TenantId> {
    fn current_tenant(&self) -> Result<TenantId, MissingTenant> {
        self.ok_or(MissingTenant)
    }
}

/// Per-call context: the tenant whose data may be touched, plus the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
    actor: Option<UserId>,
}

impl TenantContext {
    /// Context bound to `tenant_id`.
    #[must_use]
    pub const fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            actor: None,
        }
    }

    /// Context with no tenant. Every tenant-scoped operation rejects it.
    #[must_use]
    pub const fn unscoped() -> Self {
        Self {
            tenant_id: None,
            actor: None,
        }
    }

    /// Builds a context from a resolver.
    ///
    /// # Errors
    ///
    /// Returns `MissingTenant` if the resolver has no tenant.
    pub fn resolve<R: TenantResolver + ?Sized>(resolver: &R) -> Result<Self, MissingTenant> {
        resolver.current_tenant().map(Self::new)
    }

    /// Attaches the acting user.
    #[must_use]
    pub const fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Returns the tenant, rejecting a missing or nil tenant.
    ///
    /// # Errors
    ///
    /// Returns `MissingTenant` if no tenant is bound or the bound tenant is the nil UUID.
    pub fn tenant_id(&self) -> Result<TenantId, MissingTenant> {
        match self.tenant_id {
            Some(id) if id.into_inner() != Uuid::nil() => Ok(id),
            _ => Err(MissingTenant),
        }
    }

    /// Returns the acting user, if known.
    #[must_use]
    pub const fn actor(&self) -> Option<UserId> {
        self.actor
    }
}
