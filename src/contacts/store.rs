//! Owner-scoped contact storage.
//!
//! Every statement carries `user_id = ?` alongside the contact id, so a
//! contact that exists but belongs to someone else behaves exactly like one
//! that does not exist.

use super::validate::{check_name, check_phone};
use crate::db::{self, Pool};
use crate::error::{AppError, AppResult, ValidationErrors};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

const CONTACT_COLUMNS: &str = "id, user_id, name, phone, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new contact. Both are required; they are optional here so
/// that a missing field surfaces as a validation error instead of a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Partial update. At least one field must be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        created_at: from_epoch(row.get(4)?),
        updated_at: from_epoch(row.get(5)?),
    })
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[derive(Clone)]
pub struct ContactStore {
    pool: Pool,
}

impl ContactStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Validate and insert a contact owned by `owner`.
    pub async fn create(&self, owner: i64, input: NewContact) -> AppResult<Contact> {
        let mut errors = ValidationErrors::new();
        let name = check_name(input.name.as_deref(), &mut errors);
        let phone = check_phone(input.phone.as_deref(), &mut errors);
        errors.into_result()?;
        let (Some(name), Some(phone)) = (name, phone) else {
            return Err(AppError::internal("validated contact fields missing"));
        };

        let contact = db::with_conn(&self.pool, move |conn| {
            let now = db::epoch_secs();
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO contacts (user_id, name, phone, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     RETURNING {CONTACT_COLUMNS}"
                ),
                rusqlite::params![owner, name, phone, now],
                row_to_contact,
            )?)
        })
        .await?;

        tracing::info!(user_id = owner, contact_id = contact.id, "Contact created");
        Ok(contact)
    }

    /// All contacts owned by `owner`, oldest first.
    pub async fn list(&self, owner: i64) -> AppResult<Vec<Contact>> {
        db::with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = ?1 ORDER BY id"
            ))?;
            let contacts = stmt
                .query_map(rusqlite::params![owner], row_to_contact)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(contacts)
        })
        .await
    }

    /// Fetch one contact if `owner` owns it.
    pub async fn get(&self, owner: i64, contact_id: i64) -> AppResult<Contact> {
        db::with_conn(&self.pool, move |conn| {
            conn.query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1 AND user_id = ?2"),
                rusqlite::params![contact_id, owner],
                row_to_contact,
            )
            .optional()?
            .ok_or(AppError::NotFound)
        })
        .await
    }

    /// Apply a validated patch. Missing and foreign-owned ids are both `NotFound`.
    pub async fn update(
        &self,
        owner: i64,
        contact_id: i64,
        patch: ContactPatch,
    ) -> AppResult<Contact> {
        let mut errors = ValidationErrors::new();
        if patch.name.is_none() && patch.phone.is_none() {
            errors.push("contact", "Informe ao menos um campo: name ou phone.");
        }
        let name = match patch.name.as_deref() {
            Some(name) => check_name(Some(name), &mut errors),
            None => None,
        };
        let phone = match patch.phone.as_deref() {
            Some(phone) => check_phone(Some(phone), &mut errors),
            None => None,
        };
        errors.into_result()?;

        let contact = db::with_conn(&self.pool, move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE contacts SET
                        name = COALESCE(?1, name),
                        phone = COALESCE(?2, phone),
                        updated_at = ?3
                     WHERE id = ?4 AND user_id = ?5
                     RETURNING {CONTACT_COLUMNS}"
                ),
                rusqlite::params![name, phone, db::epoch_secs(), contact_id, owner],
                row_to_contact,
            )
            .optional()?
            .ok_or(AppError::NotFound)
        })
        .await?;

        tracing::info!(user_id = owner, contact_id, "Contact updated");
        Ok(contact)
    }

    /// Delete a contact. Missing and foreign-owned ids are both `NotFound`.
    pub async fn delete(&self, owner: i64, contact_id: i64) -> AppResult<()> {
        let deleted = db::with_conn(&self.pool, move |conn| {
            Ok(conn.execute(
                "DELETE FROM contacts WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![contact_id, owner],
            )?)
        })
        .await?;

        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        tracing::info!(user_id = owner, contact_id, "Contact deleted");
        Ok(())
    }
}
