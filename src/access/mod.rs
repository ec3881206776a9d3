//! Access Policy
//!
//! Decides which customers, shops and transactions an actor may see or mutate.
//! The ledger consults a single injected predicate instead of re-expressing
//! role and ownership rules per operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Actor role as asserted by the upstream authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Salesman,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Salesman => "salesman",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Ok(Role::Admin),
            "salesman" => Ok(Role::Salesman),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The person performing a ledger operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn salesman(id: Uuid) -> Self {
        Self::new(id, Role::Salesman)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Ownership facts about a row, resolved by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    /// Salesman who recorded the transaction (None for rows not yet created)
    pub author_id: Option<Uuid>,
    pub customer_owner: Option<Uuid>,
    pub shop_owner: Option<Uuid>,
}

impl Ownership {
    /// Ownership of a customer account on its own
    pub fn of_customer(customer_owner: Option<Uuid>) -> Self {
        Self {
            customer_owner,
            ..Self::default()
        }
    }

    /// Ownership of a prospective transaction against a customer and optional shop
    pub fn of_target(customer_owner: Option<Uuid>, shop_owner: Option<Uuid>) -> Self {
        Self {
            author_id: None,
            customer_owner,
            shop_owner,
        }
    }

    fn involves(&self, actor_id: Uuid) -> bool {
        self.author_id == Some(actor_id)
            || self.customer_owner == Some(actor_id)
            || self.shop_owner == Some(actor_id)
    }
}

/// The rows an actor may see, in a form a store can apply inside its query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    /// Rows the actor authored or whose customer or shop they own
    Involving(Uuid),
}

impl Visibility {
    pub fn admits(&self, ownership: &Ownership) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Involving(actor_id) => ownership.involves(*actor_id),
        }
    }

    /// Actor the rows must involve, if any
    pub fn involved_actor(&self) -> Option<Uuid> {
        match self {
            Visibility::All => None,
            Visibility::Involving(actor_id) => Some(*actor_id),
        }
    }
}

/// Read-only authorization predicate consumed by the ledger engine and views.
///
/// `visibility` is what listings push down to the store, so it must admit
/// exactly the rows `can_access` admits.
pub trait AccessPolicy: Send + Sync {
    fn can_access(&self, actor: &Actor, ownership: &Ownership) -> bool;

    fn visibility(&self, actor: &Actor) -> Visibility;
}

/// Administrators see everything; salesmen see rows they authored or whose
/// customer or shop they own.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipPolicy;

impl AccessPolicy for OwnershipPolicy {
    fn can_access(&self, actor: &Actor, ownership: &Ownership) -> bool {
        self.visibility(actor).admits(ownership)
    }

    fn visibility(&self, actor: &Actor) -> Visibility {
        match actor.role {
            Role::Admin => Visibility::All,
            Role::Salesman => Visibility::Involving(actor.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_sees_everything() {
        let admin = Actor::admin(Uuid::new_v4());
        assert!(OwnershipPolicy.can_access(&admin, &Ownership::default()));
    }

    #[test]
    fn test_salesman_sees_own_customer() {
        let salesman = Actor::salesman(Uuid::new_v4());
        let own = Ownership::of_customer(Some(salesman.id));
        let other = Ownership::of_customer(Some(Uuid::new_v4()));

        assert!(OwnershipPolicy.can_access(&salesman, &own));
        assert!(!OwnershipPolicy.can_access(&salesman, &other));
        assert!(!OwnershipPolicy.can_access(&salesman, &Ownership::of_customer(None)));
    }

    #[test]
    fn test_salesman_sees_own_shop_or_authored_rows() {
        let salesman = Actor::salesman(Uuid::new_v4());

        let via_shop = Ownership::of_target(Some(Uuid::new_v4()), Some(salesman.id));
        assert!(OwnershipPolicy.can_access(&salesman, &via_shop));

        let authored = Ownership {
            author_id: Some(salesman.id),
            customer_owner: Some(Uuid::new_v4()),
            shop_owner: None,
        };
        assert!(OwnershipPolicy.can_access(&salesman, &authored));
    }

    #[test]
    fn test_visibility_per_role() {
        let admin = Actor::admin(Uuid::new_v4());
        let salesman = Actor::salesman(Uuid::new_v4());

        assert_eq!(OwnershipPolicy.visibility(&admin), Visibility::All);
        assert_eq!(OwnershipPolicy.visibility(&admin).involved_actor(), None);
        assert_eq!(
            OwnershipPolicy.visibility(&salesman).involved_actor(),
            Some(salesman.id)
        );
        assert!(!OwnershipPolicy
            .visibility(&salesman)
            .admits(&Ownership::of_customer(Some(Uuid::new_v4()))));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("salesman".parse::<Role>(), Ok(Role::Salesman));
        assert!("guest".parse::<Role>().is_err());
    }
}
