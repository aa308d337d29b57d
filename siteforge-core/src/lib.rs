//! Siteforge core library
//!
//! The domain and storage layer of the siteforge backend:
//! - An append-only ledger of signed credit movements per user
//! - A balance projection that always equals the fold of that ledger
//! - A single pending-conversion slot per user, settled exactly once
//! - Site and lead records scoped by owning user
//!
//! The HTTP surface lives in `siteforge-server`; everything here is
//! synchronous and free of web concerns.

pub mod error;
pub mod models;
pub mod store;

pub use error::Error;
pub use models::{
    validate_subdomain, Lead, LeadId, NewLead, NewSite, NewTransaction, PendingConversion, Site,
    SiteId, Transaction, TransactionId, TransactionReason, UserId, RESERVED_SUBDOMAINS,
};
pub use store::{CreditStore, InMemoryStore, SqliteStore, StoreResult, TenantStore};
