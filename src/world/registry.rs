//! Identifier → (entity, current container) bookkeeping.
//!
//! The registry is the single authority for "where is X right now". It never
//! guards entity contents, only identity and location.
//!
//! Lock order: container slot locks are always taken before the registry
//! lock. Placement and relocation run their registry update from inside the
//! container commit hooks, so a concurrent [`lookup_container`] sees either
//! the old container or the new one, never neither.
//!
//! [`lookup_container`]: EntityRegistry::lookup_container

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::container::ObjectContainer;
use super::errors::WorldError;
use super::sync::{read, write};
use super::types::{Entity, EntityId, EntityKind};

#[derive(Debug, Default)]
struct RegistryState {
    entities: HashMap<EntityId, Entity>,
    locations: HashMap<EntityId, Arc<ObjectContainer>>,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    state: RwLock<RegistryState>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity under its own id. Ids are never reused, so a second
    /// registration of the same id is an invariant violation.
    pub fn register(&self, entity: Entity) -> Result<(), WorldError> {
        let id = entity.id();
        let kind = entity.kind();
        let mut state = write(&self.state);
        if state.entities.contains_key(&id) {
            return Err(WorldError::DuplicateId(id));
        }
        state.entities.insert(id, entity);
        debug!("registry.register id={} kind={} total={}", id, kind, state.entities.len());
        Ok(())
    }

    /// Drop identity and location bookkeeping for `id`. The entity must already
    /// have been taken out of its container (see [`unplace`](Self::unplace)).
    pub fn deregister(&self, id: EntityId) -> Option<Entity> {
        let mut state = write(&self.state);
        state.locations.remove(&id);
        state.entities.remove(&id)
    }

    pub fn lookup(&self, id: EntityId) -> Option<Entity> {
        read(&self.state).entities.get(&id).cloned()
    }

    pub fn lookup_container(&self, id: EntityId) -> Option<Arc<ObjectContainer>> {
        read(&self.state).locations.get(&id).cloned()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        read(&self.state).entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        read(&self.state).entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids_of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        read(&self.state)
            .entities
            .values()
            .filter(|e| e.kind() == kind)
            .map(Entity::id)
            .collect()
    }

    /// First placement of a registered, not yet contained entity.
    pub fn place(&self, id: EntityId, container: &Arc<ObjectContainer>) -> Result<usize, WorldError> {
        container.add_then(id, |_| {
            let mut state = write(&self.state);
            if !state.entities.contains_key(&id) {
                return Err(WorldError::NotRegistered(id));
            }
            if state.locations.contains_key(&id) {
                return Err(WorldError::AlreadyContained(id));
            }
            state.locations.insert(id, Arc::clone(container));
            Ok(())
        })
    }

    /// Record the location of an id that `container` already holds (used when
    /// restoring containers from records).
    pub fn adopt(&self, id: EntityId, container: &Arc<ObjectContainer>) -> Result<(), WorldError> {
        if !container.contains(id) {
            return Err(WorldError::NotPresent(id));
        }
        let mut state = write(&self.state);
        if !state.entities.contains_key(&id) {
            return Err(WorldError::NotRegistered(id));
        }
        if let Some(existing) = state.locations.get(&id) {
            if existing.id() != container.id() {
                return Err(WorldError::AlreadyContained(id));
            }
        }
        state.locations.insert(id, Arc::clone(container));
        Ok(())
    }

    /// Atomically move `id` from its current container to `to`.
    pub fn relocate(&self, id: EntityId, to: &Arc<ObjectContainer>) -> Result<usize, WorldError> {
        self.relocate_with(id, to, |_| {})
    }

    /// [`relocate`](Self::relocate), running `moved` once the new location is
    /// recorded and while the container and registry locks are still held.
    /// `moved` may take a single entity lock and nothing else.
    pub fn relocate_with<F>(
        &self,
        id: EntityId,
        to: &Arc<ObjectContainer>,
        moved: F,
    ) -> Result<usize, WorldError>
    where
        F: FnOnce(usize),
    {
        let from = self.lookup_container(id).ok_or(WorldError::Uncontained(id))?;
        ObjectContainer::transfer(id, &from, to, |slot| {
            let mut state = write(&self.state);
            match state.locations.get(&id) {
                Some(current) if current.id() == from.id() => {}
                // Another mover won the race between our lookup and the lock.
                _ => return Err(WorldError::NotPresent(id)),
            }
            state.locations.insert(id, Arc::clone(to));
            moved(slot);
            Ok(())
        })
    }

    /// Remove `id` from its container and forget its location.
    pub fn unplace(&self, id: EntityId) -> Result<(), WorldError> {
        let container = self.lookup_container(id).ok_or(WorldError::Uncontained(id))?;
        container.remove_then(id, || {
            let mut state = write(&self.state);
            match state.locations.get(&id) {
                Some(current) if current.id() == container.id() => {
                    state.locations.remove(&id);
                    Ok(())
                }
                _ => Err(WorldError::NotPresent(id)),
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::item::Item;
    use crate::world::types::ContainerParent;
    use std::collections::HashMap;

    fn item_entity(name: &str) -> Entity {
        Entity::Item(Arc::new(Item::new(name, HashMap::new()).expect("item")))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = EntityRegistry::new();
        let entity = item_entity("lantern");
        let id = entity.id();
        registry.register(entity.clone()).unwrap();
        assert_eq!(registry.register(entity), Err(WorldError::DuplicateId(id)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn place_relocate_and_unplace_track_location() {
        let registry = EntityRegistry::new();
        let entity = item_entity("rope");
        let id = entity.id();
        registry.register(entity).unwrap();

        let a = Arc::new(ObjectContainer::new(2, ContainerParent::Other));
        let b = Arc::new(ObjectContainer::new(2, ContainerParent::Other));
        registry.place(id, &a).unwrap();
        assert_eq!(registry.place(id, &b), Err(WorldError::AlreadyContained(id)));
        assert!(b.is_empty(), "rejected placement leaves no trace");

        registry.relocate(id, &b).unwrap();
        assert_eq!(registry.lookup_container(id).map(|c| c.id()), Some(b.id()));
        assert!(!a.contains(id));

        registry.unplace(id).unwrap();
        assert!(registry.lookup_container(id).is_none());
        assert!(b.is_empty());
    }

    #[test]
    fn relocate_into_full_container_keeps_source() {
        let registry = EntityRegistry::new();
        let entity = item_entity("anvil");
        let id = entity.id();
        registry.register(entity).unwrap();
        let a = Arc::new(ObjectContainer::new(1, ContainerParent::Other));
        let full = Arc::new(ObjectContainer::new(0, ContainerParent::Other));
        registry.place(id, &a).unwrap();

        assert!(matches!(
            registry.relocate(id, &full),
            Err(WorldError::CapacityExceeded { .. })
        ));
        assert_eq!(registry.lookup_container(id).map(|c| c.id()), Some(a.id()));
        assert!(a.contains(id));
    }

    #[test]
    fn location_is_never_missing_during_moves() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        let registry = Arc::new(EntityRegistry::new());
        let entity = item_entity("coin");
        let id = entity.id();
        registry.register(entity).unwrap();
        let a = Arc::new(ObjectContainer::new(1, ContainerParent::Other));
        let b = Arc::new(ObjectContainer::new(1, ContainerParent::Other));
        registry.place(id, &a).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let observer = {
            let registry = registry.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut checks = 0u32;
                while !done.load(Ordering::Acquire) {
                    assert!(registry.lookup_container(id).is_some(), "entity vanished mid-move");
                    checks += 1;
                }
                checks
            })
        };
        for i in 0..500 {
            let to = if i % 2 == 0 { &b } else { &a };
            registry.relocate(id, to).unwrap();
        }
        done.store(true, Ordering::Release);
        observer.join().expect("observer");
    }
}
