//! Storage abstractions for the siteforge backend
//!
//! Two traits split the storage surface: [`CreditStore`] is the credit
//! accounting subsystem, [`TenantStore`] holds sites and leads. The SQLite
//! implementation backs both with one database; tests and development can
//! swap in the in-memory implementation.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use crate::error::Error;
use crate::models::{
    Lead, NewLead, NewSite, NewTransaction, PendingConversion, Site, Transaction, UserId,
};

/// Result type for store operations
pub type StoreResult<T> = Result<T, Error>;

/// Append-only credit ledger, balance projection and the single
/// pending-conversion slot per user.
///
/// Implementations are the synchronization point: the balance check and the
/// ledger insert behind [`append_transaction`](CreditStore::append_transaction)
/// form one atomic unit with respect to concurrent appends for the same user,
/// and [`user_credits`](CreditStore::user_credits) always equals the sum of
/// the amounts returned by
/// [`transactions_for_user`](CreditStore::transactions_for_user) at a
/// consistent snapshot.
pub trait CreditStore: Send + Sync {
    /// Idempotently create the backing structures. Safe to call repeatedly
    /// and concurrently; never mutates existing rows.
    fn ensure_schema(&self) -> StoreResult<()>;

    /// Cheap reachability check for health reporting
    fn ping(&self) -> StoreResult<()>;

    /// Append an immutable ledger entry.
    ///
    /// Fails with [`Error::InsufficientCredits`] when the entry would drive
    /// the user's balance below zero, leaving the ledger unchanged. An entry
    /// replaying an existing `(user, idempotency_key)` pair returns the
    /// originally applied transaction without applying anything again.
    fn append_transaction(&self, new: NewTransaction) -> StoreResult<Transaction>;

    /// All ledger entries for a user, oldest first
    fn transactions_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Transaction>>;

    /// Current balance. Zero for users with no ledger entries.
    fn user_credits(&self, user_id: &UserId) -> StoreResult<i64>;

    /// Create or supersede the user's pending conversion
    fn record_pending_conversion(
        &self,
        user_id: &UserId,
        anonymous_session_id: &str,
        amount: i64,
    ) -> StoreResult<PendingConversion>;

    /// The user's pending conversion, if any
    fn pending_conversion(&self, user_id: &UserId) -> StoreResult<Option<PendingConversion>>;

    /// Fold the pending conversion into the ledger as a conversion entry and
    /// clear the slot, returning the new entry. Resolving a user with
    /// nothing pending is a successful no-op (`Ok(None)`), which makes the
    /// call safe to retry.
    fn resolve_pending_conversion(&self, user_id: &UserId) -> StoreResult<Option<Transaction>>;

    /// Discard the pending conversion without converting it. Clearing when
    /// none exists is a successful no-op.
    fn clear_pending_conversion(&self, user_id: &UserId) -> StoreResult<()>;
}

/// Site and lead records, scoped by owning user
pub trait TenantStore: Send + Sync {
    /// Insert a site. Fails with [`Error::SubdomainTaken`] when the
    /// subdomain is already in use.
    fn create_site(&self, new: NewSite) -> StoreResult<Site>;

    /// Insert a site and charge its creation cost against the owner's
    /// credits in one atomic step: a subdomain conflict or an insufficient
    /// balance applies nothing at all.
    fn provision_site(&self, new: NewSite, cost: i64) -> StoreResult<Site>;

    /// Sites owned by the user, in creation order
    fn list_sites(&self, owner: &UserId) -> StoreResult<Vec<Site>>;

    /// Every site regardless of owner. Only exposed when the
    /// unauthenticated listing policy is configured to allow it.
    fn all_sites(&self) -> StoreResult<Vec<Site>>;

    /// Look up a site by its subdomain label
    fn site_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<Site>>;

    /// Record a contact submission against an existing site. The owning
    /// user is taken from the site itself.
    fn insert_lead(&self, new: NewLead) -> StoreResult<Lead>;

    /// Leads across all sites owned by the user, oldest first
    fn leads_for_user(&self, owner: &UserId) -> StoreResult<Vec<Lead>>;
}

// Forwarding impls so a single store instance behind an Arc can serve as
// both halves of the application state.

impl<S: CreditStore + ?Sized> CreditStore for Arc<S> {
    fn ensure_schema(&self) -> StoreResult<()> {
        (**self).ensure_schema()
    }

    fn ping(&self) -> StoreResult<()> {
        (**self).ping()
    }

    fn append_transaction(&self, new: NewTransaction) -> StoreResult<Transaction> {
        (**self).append_transaction(new)
    }

    fn transactions_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Transaction>> {
        (**self).transactions_for_user(user_id)
    }

    fn user_credits(&self, user_id: &UserId) -> StoreResult<i64> {
        (**self).user_credits(user_id)
    }

    fn record_pending_conversion(
        &self,
        user_id: &UserId,
        anonymous_session_id: &str,
        amount: i64,
    ) -> StoreResult<PendingConversion> {
        (**self).record_pending_conversion(user_id, anonymous_session_id, amount)
    }

    fn pending_conversion(&self, user_id: &UserId) -> StoreResult<Option<PendingConversion>> {
        (**self).pending_conversion(user_id)
    }

    fn resolve_pending_conversion(&self, user_id: &UserId) -> StoreResult<Option<Transaction>> {
        (**self).resolve_pending_conversion(user_id)
    }

    fn clear_pending_conversion(&self, user_id: &UserId) -> StoreResult<()> {
        (**self).clear_pending_conversion(user_id)
    }
}

impl<S: TenantStore + ?Sized> TenantStore for Arc<S> {
    fn create_site(&self, new: NewSite) -> StoreResult<Site> {
        (**self).create_site(new)
    }

    fn provision_site(&self, new: NewSite, cost: i64) -> StoreResult<Site> {
        (**self).provision_site(new, cost)
    }

    fn list_sites(&self, owner: &UserId) -> StoreResult<Vec<Site>> {
        (**self).list_sites(owner)
    }

    fn all_sites(&self) -> StoreResult<Vec<Site>> {
        (**self).all_sites()
    }

    fn site_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<Site>> {
        (**self).site_by_subdomain(subdomain)
    }

    fn insert_lead(&self, new: NewLead) -> StoreResult<Lead> {
        (**self).insert_lead(new)
    }

    fn leads_for_user(&self, owner: &UserId) -> StoreResult<Vec<Lead>> {
        (**self).leads_for_user(owner)
    }
}
