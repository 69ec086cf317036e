use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::character::Character;
use super::errors::WorldError;
use super::item::{Item, ItemInstance};
use super::room::Room;

/// Globally unique, immutable identifier of a world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Allocate a fresh identifier. Identifiers are never reused.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of an [`ObjectContainer`](super::container::ObjectContainer).
///
/// Containers are locked in ascending `ContainerId` order whenever two of them
/// are held at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(Uuid);

impl ContainerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Item,
    ItemInstance,
    Room,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Character => "character",
            EntityKind::Item => "item",
            EntityKind::ItemInstance => "item_instance",
            EntityKind::Room => "room",
        };
        f.write_str(label)
    }
}

/// Which logical container a container plays, and which entity owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerParent {
    Room(EntityId),
    Character(EntityId),
    Other,
}

/// Where an item instance lives. One tag carries both the location type and
/// its back-reference so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLocation {
    Room(EntityId),
    Character(EntityId),
}

impl ItemLocation {
    pub fn owner(&self) -> EntityId {
        match self {
            ItemLocation::Room(id) | ItemLocation::Character(id) => *id,
        }
    }
}

pub trait HasIdentity {
    fn id(&self) -> EntityId;
    fn kind(&self) -> EntityKind;
}

/// Whitelisted, string-valued permanent attributes.
pub trait HasAttributes {
    /// Stored value, or the kind's fallback when unset.
    fn attribute(&self, name: &str) -> String;
    /// Fails with [`WorldError::InvalidAttribute`] for names outside the whitelist.
    fn set_attribute(&self, name: &str, value: &str) -> Result<(), WorldError>;
}

/// A registered world entity.
#[derive(Debug, Clone)]
pub enum Entity {
    Character(Arc<Character>),
    Item(Arc<Item>),
    ItemInstance(Arc<ItemInstance>),
    Room(Arc<Room>),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Character(c) => c.id(),
            Entity::Item(i) => i.id(),
            Entity::ItemInstance(ii) => ii.id(),
            Entity::Room(r) => r.id(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Character(_) => EntityKind::Character,
            Entity::Item(_) => EntityKind::Item,
            Entity::ItemInstance(_) => EntityKind::ItemInstance,
            Entity::Room(_) => EntityKind::Room,
        }
    }

    pub fn as_character(&self) -> Option<&Arc<Character>> {
        match self {
            Entity::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_item_instance(&self) -> Option<&Arc<ItemInstance>> {
        match self {
            Entity::ItemInstance(ii) => Some(ii),
            _ => None,
        }
    }

    pub fn as_room(&self) -> Option<&Arc<Room>> {
        match self {
            Entity::Room(r) => Some(r),
            _ => None,
        }
    }
}
