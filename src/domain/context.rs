//! Operation Context
//!
//! Contains metadata about the current operation for authorization, audit and tracing.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

use crate::access::Actor;
use crate::error::AppError;

/// Context for an operation, used for authorization and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Authenticated actor from the X-Actor-Id / X-Actor-Role headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            actor: None,
            correlation_id: None,
            client_ip: None,
        }
    }

    /// Create context for an actor
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Create context with client IP
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    /// Every ledger operation is attributed to an actor
    pub fn require_actor(&self) -> Result<&Actor, AppError> {
        self.actor
            .as_ref()
            .ok_or_else(|| AppError::MissingHeader("X-Actor-Id".to_string()))
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;

    #[test]
    fn test_context_builder() {
        let actor = Actor::new(Uuid::new_v4(), Role::Salesman);
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_actor(actor.clone())
            .with_correlation_id(correlation_id);

        assert_eq!(context.actor, Some(actor));
        assert_eq!(context.correlation_id, Some(correlation_id));
        assert!(context.require_actor().is_ok());
    }

    #[test]
    fn test_missing_actor_is_rejected() {
        let context = OperationContext::new();
        assert!(matches!(
            context.require_actor(),
            Err(AppError::MissingHeader(_))
        ));
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert_eq!(context.correlation_id, Some(id));

        // Calling again should return the same ID
        assert_eq!(context.ensure_correlation_id(), id);
    }
}
