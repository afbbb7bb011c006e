//! High-level trust circle management API.
//!
//! [`TrustCircleManager`] owns two maps, circles by id and contacts by id,
//! and keeps them consistent: a contact lists a circle exactly when that
//! circle lists the contact.

// Map operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};

use super::error::{Result, TrustError};
use super::types::{
    ContactTrust, TrustCircle, TrustCircleConfig, TrustCircleUpdate, TrustLevel, TrustSnapshot,
};
use crate::config::ProtocolConfig;
use crate::crypto::hash::random_id;
use crate::location::GeohashPrecision;

#[derive(Debug, Default)]
struct TrustState {
    circles: HashMap<String, TrustCircle>,
    contacts: HashMap<String, ContactTrust>,
}

impl TrustState {
    fn circle_mut(&mut self, circle_id: &str) -> Result<&mut TrustCircle> {
        self.circles
            .get_mut(circle_id)
            .ok_or_else(|| TrustError::NotFound(circle_id.to_string()))
    }
}

/// Per-contact precision resolution over trust circles.
///
/// # Precision Resolution
///
/// For a contact, [`TrustCircleManager::get_precision_for_contact`] returns:
///
/// 1. `None` if the contact is paused
/// 2. the contact's precision override, if set
/// 3. the finest effective precision among enabled circles containing
///    the contact
/// 4. `None` otherwise
///
/// # Example
///
/// ```
/// use zkgps_core::trust::{TrustCircleConfig, TrustCircleManager, TrustLevel};
///
/// let manager = TrustCircleManager::new("alice");
/// let family = manager
///     .create_circle(TrustCircleConfig::new("Family", TrustLevel::Intimate))
///     .unwrap();
/// manager.add_to_circle(&family.id, "bob").unwrap();
///
/// let precision = manager.get_precision_for_contact("bob").unwrap();
/// assert_eq!(precision.map(|p| p.get()), Some(10));
/// ```
#[derive(Debug)]
pub struct TrustCircleManager {
    owner_id: String,
    state: Mutex<TrustState>,
}

impl TrustCircleManager {
    /// Creates an empty manager for `owner_id`.
    #[must_use]
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            state: Mutex::new(TrustState::default()),
        }
    }

    /// Creates a manager seeded with one enabled circle per trust level,
    /// using the precision and update interval from `config`.
    ///
    /// Seeded circles have the level name as id (`"intimate"`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if a seeded circle cannot be created.
    pub fn with_default_circles(owner_id: impl Into<String>, config: &ProtocolConfig) -> Result<Self> {
        let manager = Self::new(owner_id);
        for level in TrustLevel::ALL {
            let defaults = config.trust_levels.get(level);
            let mut circle = TrustCircleConfig::new(level.display_name(), level)
                .with_id(level.as_str())
                .with_update_interval(defaults.update_interval);
            if defaults.precision != level.default_precision() {
                circle = circle.with_custom_precision(defaults.precision);
            }
            manager.create_circle(circle)?;
        }
        Ok(manager)
    }

    /// The owner's user id.
    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn lock(&self) -> Result<MutexGuard<'_, TrustState>> {
        self.state
            .lock()
            .map_err(|e| TrustError::Storage(format!("Failed to acquire trust state lock: {e}")))
    }

    // ==================== Circle Operations ====================

    /// Creates a circle.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidData`] for an invalid configuration and
    /// [`TrustError::AlreadyExists`] if the id is taken.
    pub fn create_circle(&self, config: TrustCircleConfig) -> Result<TrustCircle> {
        config.validate()?;
        let id = match config.id {
            Some(id) => id,
            None => random_id()?,
        };

        let mut state = self.lock()?;
        if state.circles.contains_key(&id) {
            return Err(TrustError::AlreadyExists(id));
        }

        let circle = TrustCircle {
            id: id.clone(),
            name: config.name,
            level: config.level,
            custom_precision: config.custom_precision,
            members: BTreeSet::new(),
            update_interval: config
                .update_interval
                .unwrap_or_else(|| config.level.default_update_interval_ms()),
            require_mutual: config
                .require_mutual
                .unwrap_or_else(|| config.level.requires_mutual_by_default()),
            enabled: config.enabled,
        };
        state.circles.insert(id, circle.clone());
        info!("created {} circle {}", circle.level, circle.id);
        Ok(circle)
    }

    /// Applies a partial update to a circle.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::NotFound`] for an unknown circle and
    /// [`TrustError::InvalidData`] for an invalid update.
    pub fn update_circle(&self, circle_id: &str, update: TrustCircleUpdate) -> Result<TrustCircle> {
        let mut state = self.lock()?;
        let circle = state.circle_mut(circle_id)?;
        update.apply(circle)?;
        info!("updated circle {circle_id}");
        Ok(circle.clone())
    }

    /// Deletes a circle and removes it from every member's circle set.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::NotFound`] for an unknown circle.
    pub fn delete_circle(&self, circle_id: &str) -> Result<()> {
        let mut state = self.lock()?;
        let circle = state
            .circles
            .remove(circle_id)
            .ok_or_else(|| TrustError::NotFound(circle_id.to_string()))?;
        for contact in state.contacts.values_mut() {
            contact.circles.remove(circle_id);
        }
        info!(
            "deleted circle {circle_id} with {} members",
            circle.members.len()
        );
        Ok(())
    }

    /// Looks up a circle.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn get_circle(&self, circle_id: &str) -> Result<Option<TrustCircle>> {
        Ok(self.lock()?.circles.get(circle_id).cloned())
    }

    /// All circles, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn circles(&self) -> Result<Vec<TrustCircle>> {
        let mut circles: Vec<_> = self.lock()?.circles.values().cloned().collect();
        circles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(circles)
    }

    // ==================== Membership Operations ====================

    /// Adds a contact to a circle, creating the contact if needed.
    ///
    /// Adding an existing member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::NotFound`] for an unknown circle and
    /// [`TrustError::InvalidData`] for an empty contact id.
    pub fn add_to_circle(&self, circle_id: &str, contact_id: &str) -> Result<()> {
        if contact_id.is_empty() {
            return Err(TrustError::InvalidData(
                "contact id must not be empty".to_string(),
            ));
        }
        let mut state = self.lock()?;
        state.circle_mut(circle_id)?.members.insert(contact_id.to_string());
        state
            .contacts
            .entry(contact_id.to_string())
            .or_insert_with(|| ContactTrust::new(contact_id))
            .circles
            .insert(circle_id.to_string());
        debug!("added {contact_id} to circle {circle_id}");
        Ok(())
    }

    /// Removes a contact from a circle. The contact record is kept.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::NotFound`] for an unknown circle.
    pub fn remove_from_circle(&self, circle_id: &str, contact_id: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.circle_mut(circle_id)?.members.remove(contact_id);
        if let Some(contact) = state.contacts.get_mut(contact_id) {
            contact.circles.remove(circle_id);
        }
        debug!("removed {contact_id} from circle {circle_id}");
        Ok(())
    }

    // ==================== Contact Operations ====================

    /// Looks up a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn get_contact(&self, contact_id: &str) -> Result<Option<ContactTrust>> {
        Ok(self.lock()?.contacts.get(contact_id).cloned())
    }

    /// All contacts, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn contacts(&self) -> Result<Vec<ContactTrust>> {
        let mut contacts: Vec<_> = self.lock()?.contacts.values().cloned().collect();
        contacts.sort_by(|a, b| a.contact_id.cmp(&b.contact_id));
        Ok(contacts)
    }

    /// Sets or clears a contact's precision override, creating the contact
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidData`] for an empty contact id.
    pub fn set_precision_override(
        &self,
        contact_id: &str,
        precision: Option<GeohashPrecision>,
    ) -> Result<()> {
        if contact_id.is_empty() {
            return Err(TrustError::InvalidData(
                "contact id must not be empty".to_string(),
            ));
        }
        self.lock()?
            .contacts
            .entry(contact_id.to_string())
            .or_insert_with(|| ContactTrust::new(contact_id))
            .precision_override = precision;
        info!("set precision override for {contact_id}: {precision:?}");
        Ok(())
    }

    /// Pauses or resumes sharing with a contact.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ContactNotFound`] for an unknown contact.
    pub fn set_paused(&self, contact_id: &str, paused: bool) -> Result<()> {
        self.lock()?
            .contacts
            .get_mut(contact_id)
            .ok_or_else(|| TrustError::ContactNotFound(contact_id.to_string()))?
            .paused = paused;
        info!("sharing with {contact_id} paused: {paused}");
        Ok(())
    }

    /// Removes a contact from every circle and forgets it.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ContactNotFound`] for an unknown contact.
    pub fn remove_contact(&self, contact_id: &str) -> Result<()> {
        let mut state = self.lock()?;
        let contact = state
            .contacts
            .remove(contact_id)
            .ok_or_else(|| TrustError::ContactNotFound(contact_id.to_string()))?;
        for circle_id in &contact.circles {
            if let Some(circle) = state.circles.get_mut(circle_id) {
                circle.members.remove(contact_id);
            }
        }
        info!("removed contact {contact_id}");
        Ok(())
    }

    // ==================== Resolution ====================

    /// The precision a contact may see, or `None` if they may see nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn get_precision_for_contact(&self, contact_id: &str) -> Result<Option<GeohashPrecision>> {
        let state = self.lock()?;
        let Some(contact) = state.contacts.get(contact_id) else {
            return Ok(None);
        };
        if contact.paused {
            return Ok(None);
        }
        if let Some(precision) = contact.precision_override {
            return Ok(Some(precision));
        }
        Ok(contact
            .circles
            .iter()
            .filter_map(|id| state.circles.get(id))
            .filter(|circle| circle.enabled)
            .map(TrustCircle::effective_precision)
            .max())
    }

    /// Update interval for a contact: the shortest interval among enabled
    /// circles containing them.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn get_update_interval_for_contact(&self, contact_id: &str) -> Result<Option<u64>> {
        let state = self.lock()?;
        Ok(state.contacts.get(contact_id).and_then(|contact| {
            contact
                .circles
                .iter()
                .filter_map(|id| state.circles.get(id))
                .filter(|circle| circle.enabled)
                .map(|circle| circle.update_interval)
                .min()
        }))
    }

    /// Checks that a contact reciprocates membership where we require it.
    ///
    /// Passes trivially if none of our mutual-required circles contains
    /// `their_user_id`. Otherwise `their_circles` must be available and at
    /// least one of their mutual-required circles must list our owner id;
    /// without visibility into their circles the check fails closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn check_mutual_membership(
        &self,
        their_user_id: &str,
        their_circles: Option<&[TrustCircle]>,
    ) -> Result<bool> {
        let requires_mutual = self
            .lock()?
            .circles
            .values()
            .any(|circle| circle.require_mutual && circle.contains(their_user_id));
        if !requires_mutual {
            return Ok(true);
        }

        let Some(their_circles) = their_circles else {
            debug!("mutual check for {their_user_id} failed closed: no visibility");
            return Ok(false);
        };
        let reciprocated = their_circles
            .iter()
            .any(|circle| circle.require_mutual && circle.contains(&self.owner_id));
        if !reciprocated {
            debug!("mutual check for {their_user_id} failed: not reciprocated");
        }
        Ok(reciprocated)
    }

    // ==================== Snapshots ====================

    /// Exports the whole configuration, circles and contacts ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn export(&self) -> Result<TrustSnapshot> {
        let state = self.lock()?;
        let mut circles: Vec<_> = state.circles.values().cloned().collect();
        circles.sort_by(|a, b| a.id.cmp(&b.id));
        let mut contacts: Vec<_> = state.contacts.values().cloned().collect();
        contacts.sort_by(|a, b| a.contact_id.cmp(&b.contact_id));
        Ok(TrustSnapshot { circles, contacts })
    }

    /// Replaces the whole configuration with `snapshot`.
    ///
    /// Membership is reconciled from both sides: a contact listing a circle
    /// becomes a member of it, and vice versa.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidData`] for duplicate ids or references
    /// to unknown circles. The current configuration is kept on error.
    pub fn import(&self, snapshot: TrustSnapshot) -> Result<()> {
        let mut next = TrustState::default();
        for circle in snapshot.circles {
            if circle.id.is_empty() {
                return Err(TrustError::InvalidData("empty circle id".to_string()));
            }
            if next.circles.contains_key(&circle.id) {
                return Err(TrustError::InvalidData(format!(
                    "duplicate circle id {}",
                    circle.id
                )));
            }
            next.circles.insert(circle.id.clone(), circle);
        }
        for contact in snapshot.contacts {
            if let Some(missing) = contact
                .circles
                .iter()
                .find(|id| !next.circles.contains_key(*id))
            {
                return Err(TrustError::InvalidData(format!(
                    "contact {} references unknown circle {missing}",
                    contact.contact_id
                )));
            }
            if next.contacts.contains_key(&contact.contact_id) {
                return Err(TrustError::InvalidData(format!(
                    "duplicate contact id {}",
                    contact.contact_id
                )));
            }
            next.contacts.insert(contact.contact_id.clone(), contact);
        }

        let memberships: Vec<(String, String)> = next
            .circles
            .values()
            .flat_map(|c| c.members.iter().map(|m| (c.id.clone(), m.clone())))
            .chain(next.contacts.values().flat_map(|contact| {
                contact
                    .circles
                    .iter()
                    .map(|id| (id.clone(), contact.contact_id.clone()))
            }))
            .collect();
        for (circle_id, contact_id) in memberships {
            next.circle_mut(&circle_id)?.members.insert(contact_id.clone());
            next.contacts
                .entry(contact_id.clone())
                .or_insert_with(|| ContactTrust::new(contact_id))
                .circles
                .insert(circle_id);
        }

        let mut state = self.lock()?;
        *state = next;
        info!(
            "imported {} circles and {} contacts",
            state.circles.len(),
            state.contacts.len()
        );
        Ok(())
    }
}
