use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::attributes;
use super::errors::WorldError;
use super::records::ItemInstanceRecord;
use super::sync::{read, write};
use super::types::{EntityId, EntityKind, HasAttributes, HasIdentity, ItemLocation};

/// Immutable item template. Instances reference it by name and fall back to
/// its attributes.
#[derive(Debug)]
pub struct Item {
    id: EntityId,
    name: String,
    script: Option<String>,
    attributes: HashMap<String, String>,
}

impl Item {
    pub fn new(name: &str, attributes: HashMap<String, String>) -> Result<Self, WorldError> {
        if let Some(bad) = attributes
            .keys()
            .find(|n| !attributes::is_valid(EntityKind::Item, n))
        {
            return Err(WorldError::InvalidAttribute(bad.clone()));
        }
        Ok(Self {
            id: EntityId::generate(),
            name: name.to_string(),
            script: None,
            attributes,
        })
    }

    pub fn with_script(mut self, script: &str) -> Self {
        self.script = Some(script.to_string());
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn attribute(&self, name: &str) -> String {
        self.attributes.get(name).cloned().unwrap_or_default()
    }
}

/// A concrete copy of an [`Item`] somewhere in the world.
#[derive(Debug)]
pub struct ItemInstance {
    id: EntityId,
    template: Arc<Item>,
    state: RwLock<InstanceState>,
}

#[derive(Debug)]
struct InstanceState {
    location: ItemLocation,
    attributes: HashMap<String, String>,
}

impl ItemInstance {
    pub fn new(template: Arc<Item>, location: ItemLocation) -> Self {
        Self {
            id: EntityId::generate(),
            template,
            state: RwLock::new(InstanceState {
                location,
                attributes: HashMap::new(),
            }),
        }
    }

    /// Rebuild from a record; `template` must be the template the record names.
    pub fn from_record(record: &ItemInstanceRecord, template: Arc<Item>) -> Result<Self, WorldError> {
        if !template.name().eq_ignore_ascii_case(&record.parent) {
            return Err(WorldError::UnknownTemplate(record.parent.clone()));
        }
        if let Some(bad) = record
            .attributes
            .keys()
            .find(|n| !attributes::is_valid(EntityKind::ItemInstance, n))
        {
            return Err(WorldError::InvalidAttribute(bad.clone()));
        }
        Ok(Self {
            id: record.uuid,
            template,
            state: RwLock::new(InstanceState {
                location: record.item_location(),
                attributes: record.attributes.clone(),
            }),
        })
    }

    pub fn to_record(&self) -> ItemInstanceRecord {
        let state = read(&self.state);
        let (location_type, location) = state.location.into();
        ItemInstanceRecord {
            uuid: self.id,
            parent: self.template.name().to_string(),
            location_type,
            location,
            attributes: state.attributes.clone(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Template name, which is also the instance's display name.
    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn template(&self) -> &Arc<Item> {
        &self.template
    }

    /// Overlay value when set, template value otherwise.
    pub fn attribute(&self, name: &str) -> String {
        {
            let state = read(&self.state);
            if let Some(value) = state.attributes.get(name).filter(|v| !v.is_empty()) {
                return value.clone();
            }
        }
        self.template.attribute(name)
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), WorldError> {
        if !attributes::is_valid(EntityKind::ItemInstance, name) {
            return Err(WorldError::InvalidAttribute(name.to_string()));
        }
        write(&self.state)
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn location(&self) -> ItemLocation {
        read(&self.state).location
    }

    /// Only the world's item moves call this, from inside the registry commit
    /// so the tag and the container index change together.
    pub(crate) fn set_location(&self, location: ItemLocation) {
        write(&self.state).location = location;
    }
}

impl HasIdentity for ItemInstance {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::ItemInstance
    }
}

impl HasAttributes for ItemInstance {
    fn attribute(&self, name: &str) -> String {
        ItemInstance::attribute(self, name)
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), WorldError> {
        ItemInstance::set_attribute(self, name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lantern() -> Arc<Item> {
        let mut attrs = HashMap::new();
        attrs.insert("description".to_string(), "A brass lantern.".to_string());
        attrs.insert("rarity".to_string(), "common".to_string());
        Arc::new(Item::new("Lantern", attrs).unwrap())
    }

    #[test]
    fn overlay_falls_back_to_template_then_shadows_it() {
        let instance = ItemInstance::new(lantern(), ItemLocation::Room(EntityId::generate()));
        assert_eq!(instance.attribute("description"), "A brass lantern.");

        instance.set_attribute("description", "A dented brass lantern.").unwrap();
        assert_eq!(instance.attribute("description"), "A dented brass lantern.");
        assert_eq!(instance.template().attribute("description"), "A brass lantern.");
        assert_eq!(instance.attribute("rarity"), "common");
    }

    #[test]
    fn template_rejects_unknown_attributes() {
        let mut attrs = HashMap::new();
        attrs.insert("damage".to_string(), "9".to_string());
        assert!(matches!(Item::new("Sword", attrs), Err(WorldError::InvalidAttribute(_))));
    }

    #[test]
    fn instance_rejects_unknown_attributes() {
        let instance = ItemInstance::new(lantern(), ItemLocation::Room(EntityId::generate()));
        assert_eq!(
            instance.set_attribute("title", "x"),
            Err(WorldError::InvalidAttribute("title".into()))
        );
        assert_eq!(instance.attribute("title"), "");
    }

    #[test]
    fn record_keeps_location_tag_and_reference_together() {
        let holder = EntityId::generate();
        let instance = ItemInstance::new(lantern(), ItemLocation::Character(holder));
        let record = instance.to_record();
        assert_eq!(record.location, holder);
        assert_eq!(record.item_location(), ItemLocation::Character(holder));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"location_type\":\"character\""));
    }
}
