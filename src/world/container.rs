//! Fixed-capacity slotted membership of entity identifiers.
//!
//! A container only knows which ids occupy which slots. The rule that an id
//! lives in at most one container world-wide belongs to
//! [`EntityRegistry`](super::registry::EntityRegistry), which drives every
//! placement through the `*_then` hooks below so its location index is updated
//! while the container lock is still held.

use std::sync::Mutex;

use super::errors::WorldError;
use super::records::ContainerRecord;
use super::sync::lock;
use super::types::{ContainerId, ContainerParent, EntityId};

/// Default capacity of a character inventory.
pub const INVENTORY_CAPACITY: usize = 35;

#[derive(Debug)]
pub struct ObjectContainer {
    id: ContainerId,
    capacity: usize,
    parent: ContainerParent,
    slots: Mutex<Vec<Option<EntityId>>>,
}

impl ObjectContainer {
    pub fn new(capacity: usize, parent: ContainerParent) -> Self {
        Self {
            id: ContainerId::generate(),
            capacity,
            parent,
            slots: Mutex::new(vec![None; capacity]),
        }
    }

    /// Rebuild from a record. Members are packed into slots in record order.
    pub fn from_record(record: &ContainerRecord, parent: ContainerParent) -> Result<Self, WorldError> {
        let container = Self::new(record.capacity, parent);
        {
            let mut slots = lock(&container.slots);
            for id in &record.members {
                insert(&mut slots, *id, record.capacity)?;
            }
        }
        Ok(container)
    }

    /// Fill an empty container from a record, keeping this container's
    /// capacity. Nothing changes on error.
    pub fn load_record(&self, record: &ContainerRecord) -> Result<(), WorldError> {
        let mut slots = lock(&self.slots);
        if let Some(occupant) = slots.iter().flatten().next() {
            return Err(WorldError::AlreadyPresent(*occupant));
        }
        let mut loaded = vec![None; self.capacity];
        for id in &record.members {
            insert(&mut loaded, *id, self.capacity)?;
        }
        *slots = loaded;
        Ok(())
    }

    pub fn to_record(&self) -> ContainerRecord {
        ContainerRecord {
            capacity: self.capacity,
            members: self.occupants(),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn parent(&self) -> ContainerParent {
        self.parent
    }

    /// Owning room id when this container is a room's contents.
    pub fn parent_room(&self) -> Option<EntityId> {
        match self.parent {
            ContainerParent::Room(id) => Some(id),
            _ => None,
        }
    }

    /// Put `id` in the lowest free slot and return that slot.
    pub fn add(&self, id: EntityId) -> Result<usize, WorldError> {
        self.add_then(id, |_| Ok(()))
    }

    /// Like [`add`](Self::add), running `commit` with the slot while the
    /// container is still locked. A failing `commit` rolls the add back.
    pub fn add_then<F>(&self, id: EntityId, commit: F) -> Result<usize, WorldError>
    where
        F: FnOnce(usize) -> Result<(), WorldError>,
    {
        let mut slots = lock(&self.slots);
        let slot = insert(&mut slots, id, self.capacity)?;
        if let Err(e) = commit(slot) {
            slots[slot] = None;
            return Err(e);
        }
        Ok(slot)
    }

    /// Free the slot held by `id` and return it.
    pub fn remove(&self, id: EntityId) -> Result<usize, WorldError> {
        self.remove_then(id, || Ok(()))
    }

    pub fn remove_then<F>(&self, id: EntityId, commit: F) -> Result<usize, WorldError>
    where
        F: FnOnce() -> Result<(), WorldError>,
    {
        let mut slots = lock(&self.slots);
        let slot = take(&mut slots, id)?;
        if let Err(e) = commit() {
            slots[slot] = Some(id);
            return Err(e);
        }
        Ok(slot)
    }

    /// Move `id` from `from` to `to` as one step.
    ///
    /// Both containers are locked in ascending id order. If the destination
    /// refuses the id (full, duplicate) or `commit` fails, the id goes back to
    /// its original source slot and the error is returned. `commit` receives
    /// the destination slot and runs with both locks held.
    pub fn transfer<F>(
        id: EntityId,
        from: &ObjectContainer,
        to: &ObjectContainer,
        commit: F,
    ) -> Result<usize, WorldError>
    where
        F: FnOnce(usize) -> Result<(), WorldError>,
    {
        if from.id == to.id {
            return from.slot(id).ok_or(WorldError::NotPresent(id));
        }

        let from_first = from.id < to.id;
        let (first, second) = if from_first { (from, to) } else { (to, from) };
        let mut first_slots = lock(&first.slots);
        let mut second_slots = lock(&second.slots);
        let (source, destination) = if from_first {
            (&mut *first_slots, &mut *second_slots)
        } else {
            (&mut *second_slots, &mut *first_slots)
        };

        let old_slot = take(source, id)?;
        let new_slot = match insert(destination, id, to.capacity) {
            Ok(slot) => slot,
            Err(e) => {
                source[old_slot] = Some(id);
                return Err(e);
            }
        };
        if let Err(e) = commit(new_slot) {
            destination[new_slot] = None;
            source[old_slot] = Some(id);
            return Err(e);
        }
        Ok(new_slot)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.slot(id).is_some()
    }

    pub fn slot(&self, id: EntityId) -> Option<usize> {
        lock(&self.slots).iter().position(|s| *s == Some(id))
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Occupants in slot order.
    pub fn occupants(&self) -> Vec<EntityId> {
        lock(&self.slots).iter().flatten().copied().collect()
    }

    /// Occupants in slot order, leaving out `exclude`.
    pub fn occupants_except(&self, exclude: Option<EntityId>) -> Vec<EntityId> {
        lock(&self.slots)
            .iter()
            .flatten()
            .copied()
            .filter(|id| Some(*id) != exclude)
            .collect()
    }
}

fn insert(slots: &mut [Option<EntityId>], id: EntityId, capacity: usize) -> Result<usize, WorldError> {
    if slots.iter().any(|s| *s == Some(id)) {
        return Err(WorldError::AlreadyPresent(id));
    }
    let slot = slots
        .iter()
        .position(Option::is_none)
        .ok_or(WorldError::CapacityExceeded { capacity })?;
    slots[slot] = Some(id);
    Ok(slot)
}

fn take(slots: &mut [Option<EntityId>], id: EntityId) -> Result<usize, WorldError> {
    let slot = slots
        .iter()
        .position(|s| *s == Some(id))
        .ok_or(WorldError::NotPresent(id))?;
    slots[slot] = None;
    Ok(slot)
}
