use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::attributes::{
    self, ATTRIBUTE_AREA, ATTRIBUTE_DESCRIPTION, ATTRIBUTE_SCRIPT, ATTRIBUTE_TITLE, ATTRIBUTE_TYPE,
};
use super::container::ObjectContainer;
use super::errors::WorldError;
use super::records::RoomRecord;
use super::sync::{read, write};
use super::types::{ContainerParent, EntityId, EntityKind, HasAttributes, HasIdentity};

/// A location. Its contents container holds characters and item instances.
#[derive(Debug)]
pub struct Room {
    id: EntityId,
    here: Arc<ObjectContainer>,
    attributes: RwLock<HashMap<String, String>>,
}

impl Room {
    pub fn new(title: &str, area: &str, capacity: usize) -> Self {
        Self::with_id(EntityId::generate(), title, area, capacity)
    }

    /// A room with a fixed id, for a start room that must keep its identity
    /// across restarts.
    pub fn with_id(id: EntityId, title: &str, area: &str, capacity: usize) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert(ATTRIBUTE_TITLE.to_string(), title.to_string());
        attrs.insert(ATTRIBUTE_AREA.to_string(), area.to_string());
        Self {
            id,
            here: Arc::new(ObjectContainer::new(capacity, ContainerParent::Room(id))),
            attributes: RwLock::new(attrs),
        }
    }

    /// Rebuild from a record, keeping its id. Contents are packed in record
    /// order and stay unclaimed until each member is restored.
    pub fn from_record(record: &RoomRecord) -> Result<Self, WorldError> {
        validate_attributes(&record.attributes)?;
        let here = ObjectContainer::from_record(&record.contents, ContainerParent::Room(record.uuid))?;
        Ok(Self {
            id: record.uuid,
            here: Arc::new(here),
            attributes: RwLock::new(record.attributes.clone()),
        })
    }

    /// Load a record into this (empty) room in place. The id must match.
    pub fn load_record(&self, record: &RoomRecord) -> Result<(), WorldError> {
        if record.uuid != self.id {
            return Err(WorldError::NotRegistered(record.uuid));
        }
        validate_attributes(&record.attributes)?;
        self.here.load_record(&record.contents)?;
        *write(&self.attributes) = record.attributes.clone();
        Ok(())
    }

    pub fn to_record(&self) -> RoomRecord {
        RoomRecord {
            uuid: self.id,
            attributes: read(&self.attributes).clone(),
            contents: self.here.to_record(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn here(&self) -> &Arc<ObjectContainer> {
        &self.here
    }

    pub fn attribute(&self, name: &str) -> String {
        match read(&self.attributes).get(name) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => attributes::room_default(name).to_string(),
        }
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), WorldError> {
        if !attributes::is_valid(EntityKind::Room, name) {
            return Err(WorldError::InvalidAttribute(name.to_string()));
        }
        write(&self.attributes).insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn title(&self) -> String {
        self.attribute(ATTRIBUTE_TITLE)
    }

    pub fn description(&self) -> String {
        self.attribute(ATTRIBUTE_DESCRIPTION)
    }

    pub fn area(&self) -> String {
        self.attribute(ATTRIBUTE_AREA)
    }

    pub fn room_type(&self) -> String {
        self.attribute(ATTRIBUTE_TYPE)
    }

    pub fn script(&self) -> Option<String> {
        Some(self.attribute(ATTRIBUTE_SCRIPT)).filter(|s| !s.is_empty())
    }

    /// Destination room id for an exit, if the exit exists and parses.
    pub fn exit(&self, direction: &str) -> Option<EntityId> {
        if !attributes::DIRECTIONS.contains(&direction) {
            return None;
        }
        self.attribute(direction).parse().ok()
    }

    /// Existing exits, in the fixed direction order.
    pub fn exits(&self) -> Vec<&'static str> {
        attributes::DIRECTIONS
            .iter()
            .copied()
            .filter(|dir| self.exit(dir).is_some())
            .collect()
    }

    /// Point the `direction` exit at `to`.
    pub fn link(&self, direction: &str, to: &Room) -> Result<(), WorldError> {
        if !attributes::DIRECTIONS.contains(&direction) {
            return Err(WorldError::InvalidAttribute(direction.to_string()));
        }
        self.set_attribute(direction, &to.id().to_string())
    }
}

fn validate_attributes(attrs: &HashMap<String, String>) -> Result<(), WorldError> {
    match attrs.keys().find(|name| !attributes::is_valid(EntityKind::Room, name)) {
        Some(bad) => Err(WorldError::InvalidAttribute(bad.clone())),
        None => Ok(()),
    }
}

impl HasIdentity for Room {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Room
    }
}

impl HasAttributes for Room {
    fn attribute(&self, name: &str) -> String {
        Room::attribute(self, name)
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), WorldError> {
        Room::set_attribute(self, name, value)
    }
}
