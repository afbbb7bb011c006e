//! `SQLite` storage for trust configuration.
//!
//! Persists [`TrustSnapshot`]s so circles, memberships and per-contact
//! settings survive restarts. A save replaces the stored configuration
//! atomically inside one transaction.

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::info;
use rusqlite::{params, Connection};

use super::error::{Result, TrustError};
use super::types::{ContactTrust, TrustCircle, TrustLevel, TrustSnapshot};
use crate::location::GeohashPrecision;

/// `SQLite`-based storage for trust snapshots.
///
/// Thread-safe wrapper around a `SQLite` connection.
pub struct TrustStorage {
    conn: Mutex<Connection>,
}

type CircleRow = (String, String, String, Option<u8>, i64, bool, bool);

impl TrustStorage {
    /// Opens (or creates) storage at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    /// Creates an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TrustError::Storage(format!("Failed to acquire database lock: {e}")))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS trust_circles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                level TEXT NOT NULL,
                custom_precision INTEGER,
                update_interval INTEGER NOT NULL,
                require_mutual INTEGER NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS trust_contacts (
                contact_id TEXT PRIMARY KEY,
                precision_override INTEGER,
                paused INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS circle_members (
                circle_id TEXT NOT NULL,
                contact_id TEXT NOT NULL,
                PRIMARY KEY (circle_id, contact_id),
                FOREIGN KEY (circle_id) REFERENCES trust_circles(id)
            );
            ",
        )?;

        Ok(())
    }

    /// Replaces the stored configuration with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or an update
    /// interval does not fit in an `INTEGER` column.
    pub fn save_snapshot(&self, snapshot: &TrustSnapshot) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM circle_members", [])?;
        tx.execute("DELETE FROM trust_contacts", [])?;
        tx.execute("DELETE FROM trust_circles", [])?;

        for circle in &snapshot.circles {
            let interval = i64::try_from(circle.update_interval).map_err(|_| {
                TrustError::InvalidData(format!(
                    "update interval of circle {} out of range",
                    circle.id
                ))
            })?;
            tx.execute(
                r"
                INSERT INTO trust_circles (id, name, level, custom_precision, update_interval, require_mutual, enabled)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
                params![
                    &circle.id,
                    &circle.name,
                    circle.level.as_str(),
                    circle.custom_precision.map(GeohashPrecision::get),
                    interval,
                    circle.require_mutual,
                    circle.enabled,
                ],
            )?;
        }

        let memberships = snapshot
            .circles
            .iter()
            .flat_map(|c| c.members.iter().map(move |m| (c.id.as_str(), m.as_str())))
            .chain(snapshot.contacts.iter().flat_map(|contact| {
                contact
                    .circles
                    .iter()
                    .map(move |id| (id.as_str(), contact.contact_id.as_str()))
            }));
        for (circle_id, contact_id) in memberships {
            tx.execute(
                "INSERT OR IGNORE INTO circle_members (circle_id, contact_id) VALUES (?1, ?2)",
                params![circle_id, contact_id],
            )?;
        }

        for contact in &snapshot.contacts {
            tx.execute(
                "INSERT INTO trust_contacts (contact_id, precision_override, paused) VALUES (?1, ?2, ?3)",
                params![
                    &contact.contact_id,
                    contact.precision_override.map(GeohashPrecision::get),
                    contact.paused,
                ],
            )?;
        }

        tx.commit()?;
        info!(
            "saved trust snapshot: {} circles, {} contacts",
            snapshot.circles.len(),
            snapshot.contacts.len()
        );
        Ok(())
    }

    /// Loads the stored configuration, ordered by id. An empty database
    /// yields an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, or
    /// [`TrustError::InvalidData`] for rows that do not decode.
    pub fn load_snapshot(&self) -> Result<TrustSnapshot> {
        let conn = self.lock()?;

        let mut members: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut contact_circles: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut stmt = conn.prepare("SELECT circle_id, contact_id FROM circle_members")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (circle_id, contact_id) in rows {
            members
                .entry(circle_id.clone())
                .or_default()
                .insert(contact_id.clone());
            contact_circles.entry(contact_id).or_default().insert(circle_id);
        }

        let mut stmt = conn.prepare(
            r"
            SELECT id, name, level, custom_precision, update_interval, require_mutual, enabled
            FROM trust_circles
            ORDER BY id
            ",
        )?;
        let circle_rows: Vec<CircleRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let circles = circle_rows
            .into_iter()
            .map(
                |(id, name, level_str, custom_precision, interval, require_mutual, enabled)| {
                    let level = TrustLevel::parse(&level_str).ok_or_else(|| {
                        TrustError::InvalidData(format!("Invalid trust level: {level_str}"))
                    })?;
                    let update_interval = u64::try_from(interval).map_err(|_| {
                        TrustError::InvalidData(format!("Invalid update interval: {interval}"))
                    })?;
                    Ok(TrustCircle {
                        members: members.remove(&id).unwrap_or_default(),
                        id,
                        name,
                        level,
                        custom_precision: decode_precision(custom_precision)?,
                        update_interval,
                        require_mutual,
                        enabled,
                    })
                },
            )
            .collect::<Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT contact_id, precision_override, paused FROM trust_contacts ORDER BY contact_id",
        )?;
        let contact_rows: Vec<(String, Option<u8>, bool)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut contacts = contact_rows
            .into_iter()
            .map(|(contact_id, precision_override, paused)| {
                Ok(ContactTrust {
                    circles: contact_circles.remove(&contact_id).unwrap_or_default(),
                    contact_id,
                    precision_override: decode_precision(precision_override)?,
                    paused,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Members without a contact row.
        for (contact_id, circles) in contact_circles {
            contacts.push(ContactTrust {
                circles,
                ..ContactTrust::new(contact_id)
            });
        }
        contacts.sort_by(|a, b| a.contact_id.cmp(&b.contact_id));

        Ok(TrustSnapshot { circles, contacts })
    }
}

fn decode_precision(value: Option<u8>) -> Result<Option<GeohashPrecision>> {
    value
        .map(|v| {
            GeohashPrecision::new(v)
                .map_err(|_| TrustError::InvalidData(format!("Invalid precision: {v}")))
        })
        .transpose()
}

impl std::fmt::Debug for TrustStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStorage").finish_non_exhaustive()
    }
}
