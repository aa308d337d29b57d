//! SQLite-based storage implementation
//!
//! One connection behind a mutex backs both store traits. The per-user
//! balance is maintained as an aggregate column on `credits` and updated in
//! the same transaction as every ledger insert, with a `CHECK (balance >= 0)`
//! constraint backstopping the overdraft guard. The pending conversion lives
//! as nullable columns on the user's `credits` row, which keeps the
//! at-most-one-per-user invariant structural.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::{CreditStore, StoreResult, TenantStore};
use crate::error::Error;
use crate::models::{
    Lead, LeadId, NewLead, NewSite, NewTransaction, PendingConversion, Site, SiteId, Transaction,
    TransactionId, TransactionReason, UserId,
};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Upper bound on waiting for a locked database before a call fails
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store implementing both CreditStore and TenantStore
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), Error> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, Error> {
        let table_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })?)
    }

    /// Migration to version 1: initial schema. Every statement is a pure
    /// "create if absent", so re-running this against a populated database
    /// is harmless.
    fn migrate_v1(conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );
            "#,
        )?;
        Self::ensure_credits_table(conn)?;
        Self::ensure_credit_transactions_table(conn)?;
        Self::ensure_sites_table(conn)?;
        Self::ensure_contact_submissions_table(conn)?;
        Ok(())
    }

    /// One row per user: the maintained balance aggregate plus the single
    /// pending-conversion slot. No row means zero balance, nothing pending.
    fn ensure_credits_table(conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS credits (
                user_id TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
                pending_session_id TEXT,
                pending_amount INTEGER,
                pending_created_at TEXT,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// The append-only ledger. `seq` gives a stable creation order,
    /// `(user_id, idempotency_key)` is unique so replays cannot double-apply.
    fn ensure_credit_transactions_table(conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS credit_transactions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                reason TEXT NOT NULL,
                related_conversion_id TEXT,
                idempotency_key TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_credit_transactions_user
                ON credit_transactions(user_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_credit_transactions_idem
                ON credit_transactions(user_id, idempotency_key);
            "#,
        )?;
        Ok(())
    }

    fn ensure_sites_table(conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sites (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                subdomain TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                cover_image_url TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sites_user ON sites(user_id);
            "#,
        )?;
        Ok(())
    }

    fn ensure_contact_submissions_table(conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS contact_submissions (
                id TEXT PRIMARY KEY,
                site_id TEXT NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_contact_submissions_user
                ON contact_submissions(user_id);
            "#,
        )?;
        Ok(())
    }

    /// Make sure the user has a `credits` row without touching an existing one
    fn ensure_credits_row(conn: &Connection, user_id: &UserId) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO credits (user_id, balance, updated_at) VALUES (?1, 0, ?2)
             ON CONFLICT(user_id) DO NOTHING",
            params![user_id.0, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn insert_transaction_row(conn: &Connection, record: &Transaction) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO credit_transactions
                 (id, user_id, amount, reason, related_conversion_id, idempotency_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.0,
                record.user_id.0,
                record.amount,
                record.reason.as_str(),
                record.related_conversion_id,
                record.idempotency_key,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn transaction_by_idempotency_key(
        conn: &Connection,
        user_id: &UserId,
        key: &str,
    ) -> Result<Option<Transaction>, Error> {
        Ok(conn
            .query_row(
                "SELECT id, user_id, amount, reason, related_conversion_id, idempotency_key,
                        created_at
                 FROM credit_transactions
                 WHERE user_id = ?1 AND idempotency_key = ?2",
                params![user_id.0, key],
                Self::read_transaction,
            )
            .optional()?)
    }

    fn balance_row(conn: &Connection, user_id: &UserId) -> Result<i64, Error> {
        Ok(conn.query_row(
            "SELECT balance FROM credits WHERE user_id = ?1",
            params![user_id.0],
            |row| row.get(0),
        )?)
    }

    fn read_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let amount: i64 = row.get(2)?;
        let reason: String = row.get(3)?;
        let related_conversion_id: Option<String> = row.get(4)?;
        let idempotency_key: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;
        Ok(Transaction {
            id: TransactionId(id),
            user_id: UserId(user_id),
            amount,
            reason: TransactionReason::from_str(&reason).unwrap_or(TransactionReason::Adjustment),
            related_conversion_id,
            idempotency_key,
            created_at: parse_timestamp(&created_at),
        })
    }

    fn read_site(row: &rusqlite::Row<'_>) -> rusqlite::Result<Site> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let subdomain: String = row.get(2)?;
        let name: String = row.get(3)?;
        let cover_image_url: Option<String> = row.get(4)?;
        let created_at: String = row.get(5)?;
        Ok(Site {
            id: SiteId(id),
            user_id: UserId(user_id),
            subdomain,
            name,
            cover_image_url,
            created_at: parse_timestamp(&created_at),
        })
    }

    fn read_lead(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lead> {
        let id: String = row.get(0)?;
        let site_id: String = row.get(1)?;
        let user_id: String = row.get(2)?;
        let payload: String = row.get(3)?;
        let created_at: String = row.get(4)?;
        Ok(Lead {
            id: LeadId(id),
            site_id: SiteId(site_id),
            user_id: UserId(user_id),
            payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
            created_at: parse_timestamp(&created_at),
        })
    }

    fn insert_site_row(conn: &Connection, site: &Site) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO sites (id, user_id, subdomain, name, cover_image_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                site.id.0,
                site.user_id.0,
                site.subdomain,
                site.name,
                site.cover_image_url,
                site.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return Error::SubdomainTaken;
                }
            }
            e.into()
        })?;
        Ok(())
    }

    fn build_site(new: NewSite) -> Site {
        Site {
            id: SiteId(Uuid::new_v4().to_string()),
            user_id: new.user_id,
            subdomain: new.subdomain,
            name: new.name,
            cover_image_url: new.cover_image_url,
            created_at: Utc::now(),
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl CreditStore for SqliteStore {
    fn ensure_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::migrate_v1(&conn)
    }

    fn ping(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn append_transaction(&self, new: NewTransaction) -> StoreResult<Transaction> {
        if new.amount == 0 {
            return Err(Error::Validation(
                "Transaction amount must be non-zero".to_string(),
            ));
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(key) = &new.idempotency_key {
            if let Some(existing) = Self::transaction_by_idempotency_key(&tx, &new.user_id, key)? {
                // Replay: the original entry stands, nothing else is applied
                return Ok(existing);
            }
        }

        Self::ensure_credits_row(&tx, &new.user_id)?;
        let balance = Self::balance_row(&tx, &new.user_id)?;
        if balance + new.amount < 0 {
            return Err(Error::InsufficientCredits {
                available: balance,
                requested: -new.amount,
            });
        }

        let now = Utc::now();
        let record = Transaction {
            id: TransactionId(Uuid::new_v4().to_string()),
            user_id: new.user_id.clone(),
            amount: new.amount,
            reason: new.reason,
            related_conversion_id: new.related_conversion_id.clone(),
            idempotency_key: new.idempotency_key.clone(),
            created_at: now,
        };

        // The CHECK constraint on balance backstops the guard above
        tx.execute(
            "UPDATE credits SET balance = balance + ?2, updated_at = ?3 WHERE user_id = ?1",
            params![new.user_id.0, new.amount, now.to_rfc3339()],
        )?;
        Self::insert_transaction_row(&tx, &record)?;
        tx.commit()?;

        Ok(record)
    }

    fn transactions_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, user_id, amount, reason, related_conversion_id, idempotency_key,
                    created_at
             FROM credit_transactions WHERE user_id = ?1 ORDER BY seq ASC",
        )?;
        let transactions = stmt
            .query_map(params![user_id.0], Self::read_transaction)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    fn user_credits(&self, user_id: &UserId) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();

        let balance: Option<i64> = conn
            .query_row(
                "SELECT balance FROM credits WHERE user_id = ?1",
                params![user_id.0],
                |row| row.get(0),
            )
            .optional()?;

        Ok(balance.unwrap_or(0))
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
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        // Single upsert keyed by user: an existing slot is superseded,
        // never doubled
        conn.execute(
            "INSERT INTO credits
                 (user_id, balance, pending_session_id, pending_amount, pending_created_at, updated_at)
             VALUES (?1, 0, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                 pending_session_id = excluded.pending_session_id,
                 pending_amount = excluded.pending_amount,
                 pending_created_at = excluded.pending_created_at,
                 updated_at = excluded.updated_at",
            params![user_id.0, anonymous_session_id, amount, now.to_rfc3339()],
        )?;

        Ok(PendingConversion {
            user_id: user_id.clone(),
            anonymous_session_id: anonymous_session_id.to_string(),
            amount,
            created_at: now,
        })
    }

    fn pending_conversion(&self, user_id: &UserId) -> StoreResult<Option<PendingConversion>> {
        let conn = self.conn.lock().unwrap();

        let slot: Option<(Option<String>, Option<i64>, Option<String>)> = conn
            .query_row(
                "SELECT pending_session_id, pending_amount, pending_created_at
                 FROM credits WHERE user_id = ?1",
                params![user_id.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        Ok(match slot {
            Some((Some(session_id), Some(amount), created_at)) => Some(PendingConversion {
                user_id: user_id.clone(),
                anonymous_session_id: session_id,
                amount,
                created_at: created_at
                    .map(|s| parse_timestamp(&s))
                    .unwrap_or_else(Utc::now),
            }),
            _ => None,
        })
    }

    fn resolve_pending_conversion(&self, user_id: &UserId) -> StoreResult<Option<Transaction>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let slot: Option<(Option<String>, Option<i64>)> = tx
            .query_row(
                "SELECT pending_session_id, pending_amount FROM credits WHERE user_id = ?1",
                params![user_id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (session_id, amount) = match slot {
            Some((Some(session_id), Some(amount))) => (session_id, amount),
            // Nothing pending: resolving is a no-op, so retries are safe
            _ => return Ok(None),
        };

        let now = Utc::now();
        let record = Transaction {
            id: TransactionId(Uuid::new_v4().to_string()),
            user_id: user_id.clone(),
            amount,
            reason: TransactionReason::Conversion,
            related_conversion_id: Some(session_id),
            idempotency_key: None,
            created_at: now,
        };

        Self::insert_transaction_row(&tx, &record)?;
        tx.execute(
            "UPDATE credits SET balance = balance + ?2,
                 pending_session_id = NULL, pending_amount = NULL, pending_created_at = NULL,
                 updated_at = ?3
             WHERE user_id = ?1",
            params![user_id.0, amount, now.to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(Some(record))
    }

    fn clear_pending_conversion(&self, user_id: &UserId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        // Zero rows affected is still success: nothing was pending
        conn.execute(
            "UPDATE credits SET
                 pending_session_id = NULL, pending_amount = NULL, pending_created_at = NULL,
                 updated_at = ?2
             WHERE user_id = ?1",
            params![user_id.0, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }
}

impl TenantStore for SqliteStore {
    fn create_site(&self, new: NewSite) -> StoreResult<Site> {
        let conn = self.conn.lock().unwrap();
        let site = Self::build_site(new);
        Self::insert_site_row(&conn, &site)?;
        Ok(site)
    }

    fn provision_site(&self, new: NewSite, cost: i64) -> StoreResult<Site> {
        if cost < 0 {
            return Err(Error::Validation(
                "Site creation cost cannot be negative".to_string(),
            ));
        }
        if cost == 0 {
            return self.create_site(new);
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        Self::ensure_credits_row(&tx, &new.user_id)?;
        let balance = Self::balance_row(&tx, &new.user_id)?;
        if balance - cost < 0 {
            return Err(Error::InsufficientCredits {
                available: balance,
                requested: cost,
            });
        }

        let site = Self::build_site(new);
        Self::insert_site_row(&tx, &site)?;

        let now = Utc::now();
        let record = Transaction {
            id: TransactionId(Uuid::new_v4().to_string()),
            user_id: site.user_id.clone(),
            amount: -cost,
            reason: TransactionReason::Spend,
            related_conversion_id: None,
            idempotency_key: None,
            created_at: now,
        };
        tx.execute(
            "UPDATE credits SET balance = balance - ?2, updated_at = ?3 WHERE user_id = ?1",
            params![site.user_id.0, cost, now.to_rfc3339()],
        )?;
        Self::insert_transaction_row(&tx, &record)?;
        tx.commit()?;

        Ok(site)
    }

    fn list_sites(&self, owner: &UserId) -> StoreResult<Vec<Site>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, user_id, subdomain, name, cover_image_url, created_at
             FROM sites WHERE user_id = ?1 ORDER BY created_at ASC",
        )?;
        let sites = stmt
            .query_map(params![owner.0], Self::read_site)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sites)
    }

    fn all_sites(&self) -> StoreResult<Vec<Site>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, user_id, subdomain, name, cover_image_url, created_at
             FROM sites ORDER BY created_at ASC",
        )?;
        let sites = stmt
            .query_map([], Self::read_site)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sites)
    }

    fn site_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<Site>> {
        let conn = self.conn.lock().unwrap();

        Ok(conn
            .query_row(
                "SELECT id, user_id, subdomain, name, cover_image_url, created_at
                 FROM sites WHERE subdomain = ?1",
                params![subdomain],
                Self::read_site,
            )
            .optional()?)
    }

    fn insert_lead(&self, new: NewLead) -> StoreResult<Lead> {
        let conn = self.conn.lock().unwrap();

        // The owning user comes from the site row itself
        let owner: Option<String> = conn
            .query_row(
                "SELECT user_id FROM sites WHERE id = ?1",
                params![new.site_id.0],
                |row| row.get(0),
            )
            .optional()?;
        let owner = owner.ok_or(Error::SiteNotFound)?;

        let payload = serde_json::to_string(&new.payload)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        let lead = Lead {
            id: LeadId(Uuid::new_v4().to_string()),
            site_id: new.site_id,
            user_id: UserId(owner),
            payload: new.payload,
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO contact_submissions (id, site_id, user_id, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                lead.id.0,
                lead.site_id.0,
                lead.user_id.0,
                payload,
                lead.created_at.to_rfc3339(),
            ],
        )?;

        Ok(lead)
    }

    fn leads_for_user(&self, owner: &UserId) -> StoreResult<Vec<Lead>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, site_id, user_id, payload, created_at
             FROM contact_submissions WHERE user_id = ?1 ORDER BY created_at ASC",
        )?;
        let leads = stmt
            .query_map(params![owner.0], Self::read_lead)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(leads)
    }
}
