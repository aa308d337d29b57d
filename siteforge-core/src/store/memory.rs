//! In-memory storage implementation
//!
//! Backs tests and development. All collections live behind one lock so
//! multi-step mutations (balance check plus append, site insert plus
//! charge) stay atomic, and the balance is computed as a fold over the
//! ledger, which makes the reconciliation invariant hold by construction.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use super::{CreditStore, StoreResult, TenantStore};
use crate::error::Error;
use crate::models::{
    Lead, LeadId, NewLead, NewSite, NewTransaction, PendingConversion, Site, SiteId, Transaction,
    TransactionId, TransactionReason, UserId,
};

#[derive(Default)]
struct State {
    transactions: Vec<Transaction>,
    /// (user id, idempotency key) -> transaction id of the original append
    applied_keys: HashMap<(String, String), TransactionId>,
    /// user id -> the single pending conversion slot
    pending: HashMap<String, PendingConversion>,
    sites: Vec<Site>,
    leads: Vec<Lead>,
}

impl State {
    fn balance_of(&self, user_id: &UserId) -> i64 {
        self.transactions
            .iter()
            .filter(|t| &t.user_id == user_id)
            .map(|t| t.amount)
            .sum()
    }

    fn append(&mut self, new: NewTransaction) -> StoreResult<Transaction> {
        if new.amount == 0 {
            return Err(Error::Validation(
                "Transaction amount must be non-zero".to_string(),
            ));
        }
        if let Some(key) = &new.idempotency_key {
            let slot = (new.user_id.0.clone(), key.clone());
            if let Some(id) = self.applied_keys.get(&slot) {
                let existing = self
                    .transactions
                    .iter()
                    .find(|t| &t.id == id)
                    .cloned()
                    .ok_or_else(|| {
                        Error::StorageUnavailable("Idempotency record without entry".to_string())
                    })?;
                return Ok(existing);
            }
        }

        let balance = self.balance_of(&new.user_id);
        if balance + new.amount < 0 {
            return Err(Error::InsufficientCredits {
                available: balance,
                requested: -new.amount,
            });
        }

        let transaction = Transaction {
            id: TransactionId(Uuid::new_v4().to_string()),
            user_id: new.user_id.clone(),
            amount: new.amount,
            reason: new.reason,
            related_conversion_id: new.related_conversion_id,
            idempotency_key: new.idempotency_key.clone(),
            created_at: Utc::now(),
        };
        if let Some(key) = new.idempotency_key {
            self.applied_keys
                .insert((new.user_id.0, key), transaction.id.clone());
        }
        self.transactions.push(transaction.clone());
        Ok(transaction)
    }
}

/// In-memory store backing both the credit and tenant halves
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CreditStore for InMemoryStore {
    fn ensure_schema(&self) -> StoreResult<()> {
        Ok(())
    }

    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn append_transaction(&self, new: NewTransaction) -> StoreResult<Transaction> {
        self.state.write().unwrap().append(new)
    }

    fn transactions_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Transaction>> {
        let state = self.state.read().unwrap();
        Ok(state
            .transactions
            .iter()
            .filter(|t| &t.user_id == user_id)
            .cloned()
            .collect())
    }

    fn user_credits(&self, user_id: &UserId) -> StoreResult<i64> {
        Ok(self.state.read().unwrap().balance_of(user_id))
    }

    fn record_pending_conversion(
        &self,
        user_id: &UserId,
        anonymous_session_id: &str,
        amount: i64,
    ) -> StoreResult<PendingConversion> {
        if amount <= 0 {
            return Err(Error::Validation(
                "Conversion amount must be positive".to_string(),
            ));
        }
        let pending = PendingConversion {
            user_id: user_id.clone(),
            anonymous_session_id: anonymous_session_id.to_string(),
            amount,
            created_at: Utc::now(),
        };
        // Keyed by user: recording over an existing slot supersedes it
        self.state
            .write()
            .unwrap()
            .pending
            .insert(user_id.0.clone(), pending.clone());
        Ok(pending)
    }

    fn pending_conversion(&self, user_id: &UserId) -> StoreResult<Option<PendingConversion>> {
        Ok(self.state.read().unwrap().pending.get(&user_id.0).cloned())
    }

    fn resolve_pending_conversion(&self, user_id: &UserId) -> StoreResult<Option<Transaction>> {
        let mut state = self.state.write().unwrap();
        let pending = match state.pending.get(&user_id.0).cloned() {
            Some(pending) => pending,
            None => return Ok(None),
        };
        let transaction = state.append(NewTransaction {
            user_id: user_id.clone(),
            amount: pending.amount,
            reason: TransactionReason::Conversion,
            related_conversion_id: Some(pending.anonymous_session_id),
            idempotency_key: None,
        })?;
        state.pending.remove(&user_id.0);
        Ok(Some(transaction))
    }

    fn clear_pending_conversion(&self, user_id: &UserId) -> StoreResult<()> {
        self.state.write().unwrap().pending.remove(&user_id.0);
        Ok(())
    }
}

impl TenantStore for InMemoryStore {
    fn create_site(&self, new: NewSite) -> StoreResult<Site> {
        let mut state = self.state.write().unwrap();
        insert_site(&mut state, new)
    }

    fn provision_site(&self, new: NewSite, cost: i64) -> StoreResult<Site> {
        if cost < 0 {
            return Err(Error::Validation(
                "Site creation cost cannot be negative".to_string(),
            ));
        }
        let mut state = self.state.write().unwrap();
        let balance = state.balance_of(&new.user_id);
        if cost > 0 && balance - cost < 0 {
            return Err(Error::InsufficientCredits {
                available: balance,
                requested: cost,
            });
        }
        let site = insert_site(&mut state, new)?;
        if cost > 0 {
            state.append(NewTransaction {
                user_id: site.user_id.clone(),
                amount: -cost,
                reason: TransactionReason::Spend,
                related_conversion_id: None,
                idempotency_key: None,
            })?;
        }
        Ok(site)
    }

    fn list_sites(&self, owner: &UserId) -> StoreResult<Vec<Site>> {
        let state = self.state.read().unwrap();
        Ok(state
            .sites
            .iter()
            .filter(|s| &s.user_id == owner)
            .cloned()
            .collect())
    }

    fn all_sites(&self) -> StoreResult<Vec<Site>> {
        Ok(self.state.read().unwrap().sites.clone())
    }

    fn site_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<Site>> {
        let state = self.state.read().unwrap();
        Ok(state
            .sites
            .iter()
            .find(|s| s.subdomain == subdomain)
            .cloned())
    }

    fn insert_lead(&self, new: NewLead) -> StoreResult<Lead> {
        let mut state = self.state.write().unwrap();
        let site = state
            .sites
            .iter()
            .find(|s| s.id == new.site_id)
            .cloned()
            .ok_or(Error::SiteNotFound)?;
        let lead = Lead {
            id: LeadId(Uuid::new_v4().to_string()),
            site_id: site.id,
            user_id: site.user_id,
            payload: new.payload,
            created_at: Utc::now(),
        };
        state.leads.push(lead.clone());
        Ok(lead)
    }

    fn leads_for_user(&self, owner: &UserId) -> StoreResult<Vec<Lead>> {
        let state = self.state.read().unwrap();
        Ok(state
            .leads
            .iter()
            .filter(|l| &l.user_id == owner)
            .cloned()
            .collect())
    }
}

fn insert_site(state: &mut State, new: NewSite) -> StoreResult<Site> {
    if state.sites.iter().any(|s| s.subdomain == new.subdomain) {
        return Err(Error::SubdomainTaken);
    }
    let site = Site {
        id: SiteId(Uuid::new_v4().to_string()),
        user_id: new.user_id,
        subdomain: new.subdomain,
        name: new.name,
        cover_image_url: new.cover_image_url,
        created_at: Utc::now(),
    };
    state.sites.push(site.clone());
    Ok(site)
}
