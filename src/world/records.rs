//! Persistence shapes every storage collaborator must round-trip losslessly.
//!
//! Each entity serializes as its identifier, a few kind-specific scalars and
//! a string map of attributes. Container contents serialize as member ids in
//! slot order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::{EntityId, ItemLocation};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerRecord {
    pub capacity: usize,
    pub members: Vec<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharacterRecord {
    pub uuid: EntityId,
    pub name: String,
    /// PHC-format argon2 hash; empty when no password was ever set.
    pub password: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    pub inventory: ContainerRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomRecord {
    pub uuid: EntityId,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Characters and item instances in the room, in slot order.
    pub contents: ContainerRecord,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Room,
    Character,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemInstanceRecord {
    pub uuid: EntityId,
    /// Template name.
    pub parent: String,
    pub location_type: LocationType,
    /// Room id or character id, depending on `location_type`.
    pub location: EntityId,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ItemInstanceRecord {
    pub fn item_location(&self) -> ItemLocation {
        match self.location_type {
            LocationType::Room => ItemLocation::Room(self.location),
            LocationType::Character => ItemLocation::Character(self.location),
        }
    }
}

impl From<ItemLocation> for (LocationType, EntityId) {
    fn from(location: ItemLocation) -> Self {
        match location {
            ItemLocation::Room(id) => (LocationType::Room, id),
            ItemLocation::Character(id) => (LocationType::Character, id),
        }
    }
}
