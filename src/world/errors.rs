use thiserror::Error;

use super::types::EntityId;

/// Errors raised by entities, containers, the registry and sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorldError {
    /// Attribute name outside the kind's whitelist.
    #[error("attribute name is invalid: {0}")]
    InvalidAttribute(String),

    /// Every slot of the container is occupied.
    #[error("container is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// The id already occupies a slot of this container.
    #[error("entity {0} is already in this container")]
    AlreadyPresent(EntityId),

    /// The id does not occupy any slot of this container.
    #[error("entity {0} is not in this container")]
    NotPresent(EntityId),

    /// Registration attempted with an id that is already registered.
    #[error("entity {0} is already registered")]
    DuplicateId(EntityId),

    #[error("entity {0} is not registered")]
    NotRegistered(EntityId),

    /// First placement attempted for an entity that already has a location.
    #[error("entity {0} is already contained elsewhere")]
    AlreadyContained(EntityId),

    /// An entity that must always be contained has no location.
    #[error("entity {0} has no container")]
    Uncontained(EntityId),

    #[error("character name is already taken: {0}")]
    NameTaken(String),

    #[error("invalid character name: {0}")]
    InvalidName(String),

    #[error("invalid password: {0}")]
    InvalidPassword(String),

    #[error("password hash failure: {0}")]
    PasswordHash(String),

    #[error("item template not found: {0}")]
    UnknownTemplate(String),

    #[error("item template already registered: {0}")]
    DuplicateTemplate(String),

    #[error("character {0} is already being played")]
    AlreadyPlaying(String),

    /// The destination refuses this character; the text says why.
    #[error("move refused: {0}")]
    MoveRefused(String),

    #[error("session already controls a character")]
    AlreadyAttached,

    #[error("session limit reached ({0})")]
    SessionLimit(usize),

    #[error("session is closed")]
    SessionClosed,
}

impl WorldError {
    /// Errors that mean shared state is no longer trustworthy for the operation
    /// that found them. The command pipeline aborts the offending session.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            WorldError::DuplicateId(_)
                | WorldError::NotRegistered(_)
                | WorldError::AlreadyContained(_)
                | WorldError::Uncontained(_)
        )
    }

    /// Text shown to the acting player.
    pub fn user_message(&self) -> String {
        match self {
            WorldError::InvalidAttribute(_) => "That attribute name is invalid.".to_string(),
            WorldError::CapacityExceeded { .. } => "There is no room for that.".to_string(),
            WorldError::AlreadyPresent(_) => "That is already there.".to_string(),
            WorldError::NotPresent(_) => "That isn't here.".to_string(),
            WorldError::NameTaken(name) => format!("The name '{}' is already taken.", name),
            WorldError::InvalidName(reason) => format!("That name cannot be used: {}", reason),
            WorldError::InvalidPassword(reason) => format!("That password cannot be used: {}", reason),
            WorldError::UnknownTemplate(_) => "No such item exists.".to_string(),
            WorldError::AlreadyPlaying(name) => format!("{} is already being played.", name),
            WorldError::MoveRefused(reason) => reason.clone(),
            WorldError::AlreadyAttached => "You are already playing a character.".to_string(),
            WorldError::SessionLimit(_) => {
                "All available sessions are in use, please try again later.".to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}
