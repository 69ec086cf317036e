//! # World State
//!
//! [`World`] is the explicit context every handler, session and script hook
//! receives. It owns the [`EntityRegistry`], the name and template indexes,
//! the command tree and the session set; tests build as many isolated worlds
//! as they like.
//!
//! ## Lock order
//!
//! Outermost first. Nothing takes an earlier lock while holding a later one.
//!
//! 1. session set
//! 2. name / template index (only around registration)
//! 3. containers, ascending [`ContainerId`](types::ContainerId)
//! 4. registry
//! 5. a single entity
//! 6. an outbound queue
//!
//! Entities release their lock before notifying anyone, so a queue push is
//! always the innermost step.

pub mod attributes;
pub mod character;
pub mod container;
pub mod errors;
pub mod item;
pub mod records;
pub mod registry;
pub mod room;
pub(crate) mod sync;
pub mod types;

use anyhow::Result;
use argon2::Argon2;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::commands::{builtin, CommandManager};
use crate::config::Config;
use crate::logutil::escape_log;
use crate::scripting::{
    self, ScriptEngine, ScriptInvocation, HOOK_AREA_ENTERED, HOOK_AREA_LEFT, HOOK_CHARACTER_ENTERED,
    HOOK_CHARACTER_LEFT,
};
use crate::session::{Connection, PlayerSession, SessionManager};
use crate::validation::{validate_character_name, validate_password};

use character::Character;
use container::ObjectContainer;
use errors::WorldError;
use item::{Item, ItemInstance};
use records::{CharacterRecord, ItemInstanceRecord, RoomRecord};
use registry::EntityRegistry;
use room::Room;
use sync::{read, write};
use types::{Entity, EntityId, EntityKind, ItemLocation};

/// Texts shown around a character move. `to_mover` goes to the mover only.
#[derive(Debug, Clone, Default)]
pub struct MoveMessages {
    pub to_mover: Option<String>,
    pub to_old_room: String,
    pub to_new_room: String,
}

pub struct World {
    config: Config,
    registry: EntityRegistry,
    names: RwLock<HashMap<String, EntityId>>,
    templates: RwLock<HashMap<String, Arc<Item>>>,
    start_room: Arc<Room>,
    commands: CommandManager,
    sessions: SessionManager,
    hasher: Argon2<'static>,
    scripts: Option<Arc<dyn ScriptEngine>>,
}

impl World {
    /// A world with the built-in command set.
    pub fn new(config: Config) -> Result<Self> {
        let mut commands = CommandManager::new(&config.commands);
        builtin::register_builtin(&mut commands);
        Self::with_commands(config, commands)
    }

    /// A world with a caller-provided command tree.
    pub fn with_commands(config: Config, commands: CommandManager) -> Result<Self> {
        let hasher = config.security.hasher()?;
        let registry = EntityRegistry::new();
        let start_room = Arc::new(Room::with_id(
            config.world.start_room_id.unwrap_or_else(EntityId::generate),
            &config.world.start_room_title,
            &config.world.start_room_area,
            config.world.room_capacity,
        ));
        registry.register(Entity::Room(Arc::clone(&start_room)))?;
        let sessions = SessionManager::new(config.sessions.clone());
        Ok(Self {
            config,
            registry,
            names: RwLock::new(HashMap::new()),
            templates: RwLock::new(HashMap::new()),
            start_room,
            commands,
            sessions,
            hasher,
            scripts: None,
        })
    }

    pub fn with_script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.scripts = Some(engine);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn commands(&self) -> &CommandManager {
        &self.commands
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn hasher(&self) -> &Argon2<'static> {
        &self.hasher
    }

    pub fn script_engine(&self) -> Option<&Arc<dyn ScriptEngine>> {
        self.scripts.as_ref()
    }

    pub fn start_room(&self) -> &Arc<Room> {
        &self.start_room
    }

    // ---- rooms -------------------------------------------------------------

    pub fn create_room(&self, title: &str, area: &str) -> Result<Arc<Room>, WorldError> {
        let room = Arc::new(Room::new(title, area, self.config.world.room_capacity));
        self.registry.register(Entity::Room(Arc::clone(&room)))?;
        debug!("world.room.create id={} title={}", room.id(), escape_log(title));
        Ok(room)
    }

    pub fn room(&self, id: EntityId) -> Option<Arc<Room>> {
        self.registry.lookup(id)?.as_room().cloned()
    }

    /// The room whose contents currently hold `id`.
    pub fn room_of(&self, id: EntityId) -> Option<Arc<Room>> {
        let container = self.registry.lookup_container(id)?;
        self.room(container.parent_room()?)
    }

    /// Title, description, exits and visible occupants, as `look` shows them.
    pub fn describe_room(&self, room: &Room, viewer: Option<EntityId>) -> String {
        let mut lines = vec![room.title(), room.description()];
        let exits = room.exits();
        if exits.is_empty() {
            lines.push("There are no obvious exits.".to_string());
        } else {
            lines.push(format!("Exits: {}", exits.join(", ")));
        }
        let here: Vec<String> = self
            .characters_in(room.here(), true, viewer)
            .iter()
            .map(|c| c.display_name_with_title())
            .collect();
        if !here.is_empty() {
            lines.push(format!("Here: {}", here.join(", ")));
        }
        let items: Vec<String> = self
            .items_in(room.here())
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        if !items.is_empty() {
            lines.push(format!("You see: {}", items.join(", ")));
        }
        lines.join("\n")
    }

    // ---- characters --------------------------------------------------------

    /// Create, register and place a new character in the start room.
    pub fn create_character(&self, name: &str, password: &str) -> Result<Arc<Character>, WorldError> {
        validate_character_name(name).map_err(|e| WorldError::InvalidName(e.to_string()))?;
        validate_password(password).map_err(|e| WorldError::InvalidPassword(e.to_string()))?;

        let character = Arc::new(Character::new(name, self.config.world.inventory_capacity));
        character.set_password(&self.hasher, password)?;
        self.index_character(&character)?;
        if let Err(e) = self.registry.place(character.id(), self.start_room.here()) {
            self.forget_character(&character);
            return Err(e);
        }
        info!(
            target: "security",
            "character.create name={} id={}",
            escape_log(name),
            character.id()
        );
        Ok(character)
    }

    fn index_character(&self, character: &Arc<Character>) -> Result<(), WorldError> {
        let key = character.name().to_lowercase();
        let mut names = write(&self.names);
        if names.contains_key(&key) {
            return Err(WorldError::NameTaken(character.name().to_string()));
        }
        self.registry.register(Entity::Character(Arc::clone(character)))?;
        names.insert(key, character.id());
        Ok(())
    }

    fn forget_character(&self, character: &Character) {
        write(&self.names).remove(&character.name().to_lowercase());
        self.registry.deregister(character.id());
    }

    pub fn character(&self, id: EntityId) -> Option<Arc<Character>> {
        self.registry.lookup(id)?.as_character().cloned()
    }

    /// Case-insensitive lookup by display name.
    pub fn character_by_name(&self, name: &str) -> Option<Arc<Character>> {
        let id = *read(&self.names).get(&name.to_lowercase())?;
        self.character(id)
    }

    /// `None` for an unknown name and for a wrong password alike.
    pub fn authenticate(&self, name: &str, password: &str) -> Option<Arc<Character>> {
        let character = self.character_by_name(name)?;
        character
            .check_password(&self.hasher, password)
            .then_some(character)
    }

    /// Characters in `container` in slot order, optionally online only and
    /// without `exclude`.
    pub fn characters_in(
        &self,
        container: &ObjectContainer,
        online_only: bool,
        exclude: Option<EntityId>,
    ) -> Vec<Arc<Character>> {
        container
            .occupants_except(exclude)
            .into_iter()
            .filter_map(|id| self.character(id))
            .filter(|c| !online_only || c.is_online())
            .collect()
    }

    /// Move `character` into `to`, then tell both rooms and the mover.
    pub fn move_character(
        &self,
        character: &Arc<Character>,
        to: &Arc<Room>,
        messages: MoveMessages,
    ) -> Result<(), WorldError> {
        let id = character.id();
        let from = self.room_of(id).ok_or(WorldError::Uncontained(id))?;
        if from.id() == to.id() {
            return Ok(());
        }
        self.move_allowed(character, to).map_err(WorldError::MoveRefused)?;
        self.registry.relocate(id, to.here())?;

        for other in self.characters_in(from.here(), true, Some(id)) {
            other.notify(messages.to_old_room.clone());
        }
        for other in self.characters_in(to.here(), true, Some(id)) {
            other.notify(messages.to_new_room.clone());
        }
        if let Some(text) = messages.to_mover {
            character.notify(text);
        }

        self.left_room(character, &from, Some(to.as_ref()));
        self.entered_room(character, to, Some(from.as_ref()));
        Ok(())
    }

    /// Whether `character` may walk into `room`; the error is the text shown
    /// to the mover. Ghosts pass every check.
    pub fn move_allowed(&self, character: &Character, room: &Room) -> Result<(), String> {
        if !character.temp_attribute(attributes::TEMP_GHOST).is_empty() {
            return Ok(());
        }
        if room.room_type() == attributes::ROOM_TYPE_TRACK {
            return Err("You cannot walk onto the train tracks!".to_string());
        }
        Ok(())
    }

    fn left_room(&self, character: &Character, room: &Room, next: Option<&Room>) {
        if next.map_or(true, |n| n.area() != room.area()) {
            debug!(
                "world.area.leave character={} area={}",
                escape_log(character.name()),
                escape_log(&room.area())
            );
            self.run_room_hook(room, HOOK_AREA_LEFT, character);
        }
        debug!("world.room.leave character={} room={}", escape_log(character.name()), room.id());
        self.run_room_hook(room, HOOK_CHARACTER_LEFT, character);
    }

    fn entered_room(&self, character: &Character, room: &Room, previous: Option<&Room>) {
        if previous.map_or(true, |p| p.area() != room.area()) {
            debug!(
                "world.area.enter character={} area={}",
                escape_log(character.name()),
                escape_log(&room.area())
            );
            self.run_room_hook(room, HOOK_AREA_ENTERED, character);
        }
        debug!("world.room.enter character={} room={}", escape_log(character.name()), room.id());
        self.run_room_hook(room, HOOK_CHARACTER_ENTERED, character);
    }

    /// Call `function` in the room's script, if it has one. No locks are held.
    fn run_room_hook(&self, room: &Room, function: &str, character: &Character) {
        if let Some(script) = room.script() {
            scripting::run_script(
                self,
                &ScriptInvocation {
                    script,
                    function: function.to_string(),
                    invoker: character.name().to_string(),
                    room: room.id(),
                },
            );
        }
    }

    // ---- items -------------------------------------------------------------

    pub fn register_item(&self, item: Item) -> Result<Arc<Item>, WorldError> {
        let key = item.name().to_lowercase();
        let mut templates = write(&self.templates);
        if templates.contains_key(&key) {
            return Err(WorldError::DuplicateTemplate(item.name().to_string()));
        }
        let item = Arc::new(item);
        self.registry.register(Entity::Item(Arc::clone(&item)))?;
        templates.insert(key, Arc::clone(&item));
        Ok(item)
    }

    pub fn item_template(&self, name: &str) -> Option<Arc<Item>> {
        read(&self.templates).get(&name.to_lowercase()).cloned()
    }

    pub fn item_instance(&self, id: EntityId) -> Option<Arc<ItemInstance>> {
        self.registry.lookup(id)?.as_item_instance().cloned()
    }

    fn container_for(&self, location: ItemLocation) -> Result<Arc<ObjectContainer>, WorldError> {
        match location {
            ItemLocation::Room(id) => self
                .room(id)
                .map(|r| Arc::clone(r.here()))
                .ok_or(WorldError::NotRegistered(id)),
            ItemLocation::Character(id) => self
                .character(id)
                .map(|c| Arc::clone(c.inventory()))
                .ok_or(WorldError::NotRegistered(id)),
        }
    }

    /// New instance of the named template at `location`.
    pub fn spawn_item(&self, template: &str, location: ItemLocation) -> Result<Arc<ItemInstance>, WorldError> {
        let template = self
            .item_template(template)
            .ok_or_else(|| WorldError::UnknownTemplate(template.to_string()))?;
        let container = self.container_for(location)?;
        let instance = Arc::new(ItemInstance::new(template, location));
        self.registry
            .register(Entity::ItemInstance(Arc::clone(&instance)))?;
        if let Err(e) = self.registry.place(instance.id(), &container) {
            self.registry.deregister(instance.id());
            return Err(e);
        }
        Ok(instance)
    }

    /// Move an instance; its location tag changes in the same step as the
    /// registry entry.
    pub fn move_item(&self, instance: &Arc<ItemInstance>, to: ItemLocation) -> Result<(), WorldError> {
        let container = self.container_for(to)?;
        self.registry
            .relocate_with(instance.id(), &container, |_| instance.set_location(to))?;
        Ok(())
    }

    pub fn items_in(&self, container: &ObjectContainer) -> Vec<Arc<ItemInstance>> {
        container
            .occupants()
            .into_iter()
            .filter_map(|id| self.item_instance(id))
            .collect()
    }

    /// First instance in slot order whose name matches case-insensitively.
    pub fn find_item_in(&self, container: &ObjectContainer, name: &str) -> Option<Arc<ItemInstance>> {
        self.items_in(container)
            .into_iter()
            .find(|i| i.name().eq_ignore_ascii_case(name))
    }

    // ---- sessions ----------------------------------------------------------

    pub fn connect(&self, connection: Box<dyn Connection>) -> Result<Arc<PlayerSession>, WorldError> {
        self.sessions.connect(connection)
    }

    pub fn process_command(&self, session: &Arc<PlayerSession>, input: &str) {
        self.commands.process(self, session, input);
    }

    pub fn disconnect(&self, session: &Arc<PlayerSession>) -> bool {
        self.sessions.disconnect(self, session)
    }

    /// Bind `character` to `session` exclusively.
    pub fn attach_character(&self, session: &Arc<PlayerSession>, character: &Arc<Character>) -> Result<(), WorldError> {
        character.claim(session)?;
        if let Err(e) = session.attach(Arc::clone(character)) {
            character.release();
            return Err(e);
        }
        Ok(())
    }

    /// Login effects: the room is shown to the character and the others in
    /// it see the arrival.
    pub fn character_logged_in(&self, character: &Arc<Character>) {
        let Some(room) = self.room_of(character.id()) else {
            return;
        };
        character.notify(self.describe_room(&room, Some(character.id())));
        let notice = format!("{} connected and appeared here with you.", character.name());
        for other in self.characters_in(room.here(), true, Some(character.id())) {
            other.notify(notice.clone());
        }
        self.entered_room(character, &room, None);
        info!(
            target: "mushcore::sessions",
            "character.login name={} room={}",
            escape_log(character.name()),
            room.id()
        );
    }

    /// Logout effects. Called from the disconnect path only.
    pub(crate) fn character_logged_out(&self, character: &Arc<Character>) {
        if let Some(room) = self.room_of(character.id()) {
            let notice = format!("{} disconnected and is no longer here with you.", character.name());
            for other in self.characters_in(room.here(), true, Some(character.id())) {
                other.notify(notice.clone());
            }
            self.left_room(character, &room, None);
        }
        character.clear_temp_attributes();
        info!(
            target: "mushcore::sessions",
            "character.logout name={}",
            escape_log(character.name())
        );
    }

    // ---- records -----------------------------------------------------------

    /// Rebuild a room from its record. A record carrying the start room's id
    /// loads into the start room in place. Restore rooms before the
    /// characters and instances they hold.
    pub fn restore_room(&self, record: &RoomRecord) -> Result<Arc<Room>, WorldError> {
        if record.uuid == self.start_room.id() {
            self.start_room.load_record(record)?;
            return Ok(Arc::clone(&self.start_room));
        }
        let room = Arc::new(Room::from_record(record)?);
        self.registry.register(Entity::Room(Arc::clone(&room)))?;
        debug!("world.room.restore id={} title={}", room.id(), escape_log(&room.title()));
        Ok(room)
    }

    /// Rebuild a character from its record into `room` (the start room when
    /// `None`). Inventory members are adopted as their instances are
    /// restored with [`restore_item_instance`](Self::restore_item_instance).
    pub fn restore_character(
        &self,
        record: &CharacterRecord,
        room: Option<EntityId>,
    ) -> Result<Arc<Character>, WorldError> {
        let room = match room {
            Some(id) => self.room(id).ok_or(WorldError::NotRegistered(id))?,
            None => Arc::clone(&self.start_room),
        };
        let character = Arc::new(Character::from_record(record)?);
        self.index_character(&character)?;
        let placed = if room.here().contains(character.id()) {
            self.registry.adopt(character.id(), room.here())
        } else {
            self.registry.place(character.id(), room.here()).map(|_| ())
        };
        if let Err(e) = placed {
            self.forget_character(&character);
            return Err(e);
        }
        Ok(character)
    }

    pub fn restore_item_instance(&self, record: &ItemInstanceRecord) -> Result<Arc<ItemInstance>, WorldError> {
        let template = self
            .item_template(&record.parent)
            .ok_or_else(|| WorldError::UnknownTemplate(record.parent.clone()))?;
        let instance = Arc::new(ItemInstance::from_record(record, template)?);
        let container = self.container_for(instance.location())?;
        self.registry
            .register(Entity::ItemInstance(Arc::clone(&instance)))?;
        let placed = if container.contains(instance.id()) {
            self.registry.adopt(instance.id(), &container)
        } else {
            self.registry.place(instance.id(), &container).map(|_| ())
        };
        if let Err(e) = placed {
            self.registry.deregister(instance.id());
            return Err(e);
        }
        Ok(instance)
    }

    /// Free every room and inventory slot still held by an id that was never
    /// restored (or was restored somewhere else). Call once after loading
    /// records. Returns the number of slots released.
    pub fn release_unclaimed_slots(&self) -> usize {
        let mut containers: Vec<Arc<ObjectContainer>> = Vec::new();
        for id in self.registry.ids_of_kind(EntityKind::Room) {
            if let Some(room) = self.room(id) {
                containers.push(Arc::clone(room.here()));
            }
        }
        for id in self.registry.ids_of_kind(EntityKind::Character) {
            if let Some(character) = self.character(id) {
                containers.push(Arc::clone(character.inventory()));
            }
        }

        let mut released = 0;
        for container in containers {
            for id in container.occupants() {
                let claimed = self
                    .registry
                    .lookup_container(id)
                    .map_or(false, |c| c.id() == container.id());
                if claimed {
                    continue;
                }
                if container.remove(id).is_ok() {
                    warn!(
                        "world.restore.unclaimed id={} container={:?}",
                        id,
                        container.parent()
                    );
                    released += 1;
                }
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Argon2Config;

    fn world() -> World {
        let mut config = Config::default();
        config.security.argon2 = Some(Argon2Config {
            memory_kib: Some(8),
            time_cost: Some(1),
            parallelism: Some(1),
        });
        World::new(config).unwrap()
    }

    fn lantern(world: &World) {
        let mut attrs = HashMap::new();
        attrs.insert("description".to_string(), "A brass lantern.".to_string());
        world.register_item(Item::new("Lantern", attrs).unwrap()).unwrap();
    }

    #[test]
    fn names_are_unique_case_insensitively() {
        let w = world();
        w.create_character("Alice", "Password123").unwrap();
        assert_eq!(
            w.create_character("ALICE", "Password123").unwrap_err(),
            WorldError::NameTaken("ALICE".into())
        );
        assert!(w.character_by_name("alice").is_some());
        assert!(w.authenticate("alice", "Password123").is_some());
        assert!(w.authenticate("alice", "wrong-password").is_none());
    }

    #[test]
    fn new_characters_start_in_the_start_room() {
        let w = world();
        let c = w.create_character("Bob", "Password123").unwrap();
        assert_eq!(w.room_of(c.id()).map(|r| r.id()), Some(w.start_room().id()));
    }

    #[test]
    fn moving_items_keeps_tag_and_registry_in_step() {
        let w = world();
        lantern(&w);
        let c = w.create_character("Carol", "Password123").unwrap();
        let room = w.start_room().id();
        let lamp = w.spawn_item("lantern", ItemLocation::Room(room)).unwrap();

        w.move_item(&lamp, ItemLocation::Character(c.id())).unwrap();
        assert_eq!(lamp.location(), ItemLocation::Character(c.id()));
        assert!(c.inventory().contains(lamp.id()));
        assert!(!w.start_room().here().contains(lamp.id()));
    }

    #[test]
    fn failed_item_move_keeps_the_old_tag() {
        let w = world();
        lantern(&w);
        let tiny = Arc::new(Character::new("Tiny", 0));
        w.index_character(&tiny).unwrap();
        w.registry().place(tiny.id(), w.start_room().here()).unwrap();
        let room = w.start_room().id();
        let lamp = w.spawn_item("Lantern", ItemLocation::Room(room)).unwrap();

        assert!(matches!(
            w.move_item(&lamp, ItemLocation::Character(tiny.id())),
            Err(WorldError::CapacityExceeded { .. })
        ));
        assert_eq!(lamp.location(), ItemLocation::Room(room));
    }

    #[test]
    fn records_restore_with_inventory() {
        let w = world();
        lantern(&w);
        let c = w.create_character("Dana", "Password123").unwrap();
        let lamp = w.spawn_item("Lantern", ItemLocation::Character(c.id())).unwrap();
        let char_record = c.to_record();
        let item_record = lamp.to_record();

        let fresh = world();
        lantern(&fresh);
        let restored = fresh.restore_character(&char_record, None).unwrap();
        let restored_lamp = fresh.restore_item_instance(&item_record).unwrap();

        assert_eq!(restored.id(), c.id());
        assert!(fresh.authenticate("dana", "Password123").is_some());
        assert_eq!(restored.inventory().slot(restored_lamp.id()), Some(0));
        assert_eq!(
            fresh.registry().lookup_container(restored_lamp.id()).map(|k| k.id()),
            Some(restored.inventory().id())
        );
    }
}
