//! Domain models for the siteforge backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identifier assigned to a user by the external identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Unique ledger entry identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// Unique site identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteId(pub String);

/// Unique lead identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// Why a ledger entry exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionReason {
    /// Credits given to a user (signup bonus, promotion, purchase)
    Grant,
    /// Credits consumed by a billable action
    Spend,
    /// A pending conversion folded into the ledger
    Conversion,
    /// Manual correction
    Adjustment,
}

impl TransactionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionReason::Grant => "grant",
            TransactionReason::Spend => "spend",
            TransactionReason::Conversion => "conversion",
            TransactionReason::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "grant" => Some(TransactionReason::Grant),
            "spend" => Some(TransactionReason::Spend),
            "conversion" => Some(TransactionReason::Conversion),
            "adjustment" => Some(TransactionReason::Adjustment),
            _ => None,
        }
    }
}

/// An immutable credit ledger entry
///
/// Amounts are signed: grants and conversions are positive, spends are
/// negative. Entries are never updated or deleted once appended.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub amount: i64,
    pub reason: TransactionReason,
    /// Anonymous session id of the pending conversion this entry settled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_conversion_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for a ledger append
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub amount: i64,
    pub reason: TransactionReason,
    pub related_conversion_id: Option<String>,
    /// Replay guard: an append reusing a key the user has already written
    /// returns the original entry instead of applying anything again
    pub idempotency_key: Option<String>,
}

/// Credits accrued by an anonymous session, waiting to be claimed by the
/// user the session later authenticated as. At most one exists per user;
/// recording another supersedes it.
#[derive(Debug, Clone, Serialize)]
pub struct PendingConversion {
    pub user_id: UserId,
    pub anonymous_session_id: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// A user-owned tenant site, addressed externally by its subdomain
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    pub id: SiteId,
    pub user_id: UserId,
    pub subdomain: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a site
#[derive(Debug, Clone)]
pub struct NewSite {
    pub user_id: UserId,
    pub subdomain: String,
    pub name: String,
    pub cover_image_url: Option<String>,
}

/// A contact-form submission captured by a tenant site. The owning user is
/// denormalized from the site at insert time.
#[derive(Debug, Clone, Serialize)]
pub struct Lead {
    pub id: LeadId,
    pub site_id: SiteId,
    pub user_id: UserId,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a lead
#[derive(Debug, Clone)]
pub struct NewLead {
    pub site_id: SiteId,
    pub payload: serde_json::Value,
}

/// Labels that can never be tenant subdomains
pub const RESERVED_SUBDOMAINS: &[&str] = &["www", "app", "api"];

/// Check a tenant subdomain label: 1-63 lowercase ASCII alphanumerics or
/// hyphens, no leading or trailing hyphen, not a reserved label.
pub fn validate_subdomain(subdomain: &str) -> Result<(), Error> {
    if subdomain.is_empty() || subdomain.len() > 63 {
        return Err(Error::Validation(
            "Subdomain must be between 1 and 63 characters".to_string(),
        ));
    }
    if !subdomain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::Validation(
            "Subdomain may only contain lowercase letters, digits and hyphens".to_string(),
        ));
    }
    if subdomain.starts_with('-') || subdomain.ends_with('-') {
        return Err(Error::Validation(
            "Subdomain may not start or end with a hyphen".to_string(),
        ));
    }
    if RESERVED_SUBDOMAINS.contains(&subdomain) {
        return Err(Error::Validation(format!(
            "Subdomain '{}' is reserved",
            subdomain
        )));
    }
    Ok(())
}
