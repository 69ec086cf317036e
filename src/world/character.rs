use argon2::Argon2;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use super::attributes::{self, ATTRIBUTE_PERMISSIONS, ATTRIBUTE_TITLE};
use super::container::ObjectContainer;
use super::errors::WorldError;
use super::records::CharacterRecord;
use super::sync::{read, write};
use super::types::{ContainerParent, EntityId, EntityKind, HasAttributes, HasIdentity};
use crate::session::{PlayerSession, SendOutcome};

/// A player character.
///
/// Identity, name and inventory are fixed at creation. Everything else sits
/// behind a private lock that is released before any call into another
/// entity or any queue send.
pub struct Character {
    id: EntityId,
    name: String,
    inventory: Arc<ObjectContainer>,
    state: RwLock<CharacterState>,
}

#[derive(Default)]
struct CharacterState {
    password: String,
    attributes: HashMap<String, String>,
    temp_attributes: HashMap<String, String>,
    session: Weak<PlayerSession>,
}

impl fmt::Debug for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Character")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Character {
    pub fn new(name: &str, inventory_capacity: usize) -> Self {
        let id = EntityId::generate();
        Self {
            id,
            name: name.to_string(),
            inventory: Arc::new(ObjectContainer::new(
                inventory_capacity,
                ContainerParent::Character(id),
            )),
            state: RwLock::new(CharacterState::default()),
        }
    }

    /// Rebuild from a record. Unknown attribute names in the record are
    /// rejected like any other write.
    pub fn from_record(record: &CharacterRecord) -> Result<Self, WorldError> {
        let inventory = ObjectContainer::from_record(
            &record.inventory,
            ContainerParent::Character(record.uuid),
        )?;
        if let Some(bad) = record
            .attributes
            .keys()
            .find(|name| !attributes::is_valid(EntityKind::Character, name))
        {
            return Err(WorldError::InvalidAttribute(bad.clone()));
        }
        Ok(Self {
            id: record.uuid,
            name: record.name.clone(),
            inventory: Arc::new(inventory),
            state: RwLock::new(CharacterState {
                password: record.password.clone(),
                attributes: record.attributes.clone(),
                ..CharacterState::default()
            }),
        })
    }

    pub fn to_record(&self) -> CharacterRecord {
        let state = read(&self.state);
        CharacterRecord {
            uuid: self.id,
            name: self.name.clone(),
            password: state.password.clone(),
            attributes: state.attributes.clone(),
            inventory: self.inventory.to_record(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name followed by the character's title in parentheses, when one is set.
    pub fn display_name_with_title(&self) -> String {
        let title = self.attribute(ATTRIBUTE_TITLE);
        if title.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, title)
        }
    }

    pub fn inventory(&self) -> &Arc<ObjectContainer> {
        &self.inventory
    }

    pub fn attribute(&self, name: &str) -> String {
        let state = read(&self.state);
        match state.attributes.get(name) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => attributes::character_default(name).to_string(),
        }
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), WorldError> {
        if !attributes::is_valid(EntityKind::Character, name) {
            return Err(WorldError::InvalidAttribute(name.to_string()));
        }
        write(&self.state)
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Session-scoped value; empty when unset.
    pub fn temp_attribute(&self, name: &str) -> String {
        read(&self.state)
            .temp_attributes
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Temp attributes are not validated and are cleared on logout.
    pub fn set_temp_attribute(&self, name: &str, value: &str) {
        write(&self.state)
            .temp_attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn clear_temp_attributes(&self) {
        write(&self.state).temp_attributes.clear();
    }

    /// Whether the space-delimited `permissions` attribute lists `permission`.
    pub fn has_permission(&self, permission: &str) -> bool {
        let state = read(&self.state);
        state
            .attributes
            .get(ATTRIBUTE_PERMISSIONS)
            .map(|perms| perms.split_whitespace().any(|p| p == permission))
            .unwrap_or(false)
    }

    /// Hash and store a new password. Hashing runs before the lock is taken.
    pub fn set_password(&self, hasher: &Argon2<'_>, password: &str) -> Result<(), WorldError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| WorldError::PasswordHash(e.to_string()))?
            .to_string();
        write(&self.state).password = hash;
        Ok(())
    }

    /// `false` for a mismatch, a missing hash, or a malformed stored hash alike.
    pub fn check_password(&self, hasher: &Argon2<'_>, password: &str) -> bool {
        let stored = read(&self.state).password.clone();
        if stored.is_empty() {
            return false;
        }
        match PasswordHash::new(&stored) {
            Ok(parsed) => hasher.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    /// SHA-256 of the stored hash, hex encoded. Lets a client remember a login
    /// without keeping the password.
    pub fn password_fingerprint(&self) -> String {
        let stored = read(&self.state).password.clone();
        format!("{:x}", Sha256::digest(stored.as_bytes()))
    }

    /// Controlling session, if the character is online.
    pub fn session(&self) -> Option<Arc<PlayerSession>> {
        read(&self.state).session.upgrade()
    }

    pub fn is_online(&self) -> bool {
        self.session().is_some()
    }

    /// Claim the character for `session`. Fails when another live session
    /// already controls it.
    pub(crate) fn claim(&self, session: &Arc<PlayerSession>) -> Result<(), WorldError> {
        let mut state = write(&self.state);
        if let Some(current) = state.session.upgrade() {
            if !Arc::ptr_eq(&current, session) {
                return Err(WorldError::AlreadyPlaying(self.name.clone()));
            }
        }
        state.session = Arc::downgrade(session);
        Ok(())
    }

    pub(crate) fn release(&self) {
        write(&self.state).session = Weak::new();
    }

    /// Queue `text` for the controlling session. Offline characters drop it.
    pub fn notify(&self, text: impl Into<String>) -> SendOutcome {
        match self.session() {
            Some(session) => session.send(text),
            None => SendOutcome::Closed,
        }
    }
}

impl HasIdentity for Character {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Character
    }
}

impl HasAttributes for Character {
    fn attribute(&self, name: &str) -> String {
        Character::attribute(self, name)
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), WorldError> {
        Character::set_attribute(self, name, value)
    }
}
