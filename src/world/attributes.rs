//! Static attribute whitelists and per-kind defaults.
//!
//! These tables are read-only and consulted without locking.

use super::types::EntityKind;

pub const ATTRIBUTE_PERMISSIONS: &str = "permissions";
pub const ATTRIBUTE_TITLE: &str = "title";
pub const ATTRIBUTE_PICTURE: &str = "picture";
pub const ATTRIBUTE_DESCRIPTION: &str = "description";
pub const ATTRIBUTE_CHANNELS: &str = "channels";
pub const ATTRIBUTE_AREA: &str = "area";
pub const ATTRIBUTE_SCRIPT: &str = "script";
/// Room kind. `track` rooms refuse entry to anyone but ghosts.
pub const ATTRIBUTE_TYPE: &str = "type";

/// Temp attribute that lets a character pass through move checks.
pub const TEMP_GHOST: &str = "ghost";
pub const ROOM_TYPE_TRACK: &str = "track";

pub const DIRECTIONS: &[&str] = &["north", "south", "east", "west", "up", "down"];

pub const CHARACTER_ATTRIBUTES: &[&str] = &[
    ATTRIBUTE_PICTURE,
    ATTRIBUTE_TITLE,
    ATTRIBUTE_PERMISSIONS,
    ATTRIBUTE_DESCRIPTION,
    ATTRIBUTE_CHANNELS,
    "gender",
];

pub const ITEM_ATTRIBUTES: &[&str] = &[
    ATTRIBUTE_PICTURE,
    ATTRIBUTE_DESCRIPTION,
    "short_description",
    "rarity",
];

pub const ROOM_ATTRIBUTES: &[&str] = &[
    ATTRIBUTE_TITLE,
    ATTRIBUTE_DESCRIPTION,
    ATTRIBUTE_AREA,
    ATTRIBUTE_SCRIPT,
    ATTRIBUTE_TYPE,
    "north",
    "south",
    "east",
    "west",
    "up",
    "down",
];

/// Whitelist for an entity kind. Item templates and instances share one.
pub fn whitelist(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Character => CHARACTER_ATTRIBUTES,
        EntityKind::Item | EntityKind::ItemInstance => ITEM_ATTRIBUTES,
        EntityKind::Room => ROOM_ATTRIBUTES,
    }
}

pub fn is_valid(kind: EntityKind, name: &str) -> bool {
    whitelist(kind).contains(&name)
}

/// Value a character reports for an attribute it has never set.
pub fn character_default(name: &str) -> &'static str {
    match name {
        ATTRIBUTE_DESCRIPTION => "They look like an ordinary traveller.",
        ATTRIBUTE_CHANNELS => "general",
        _ => "",
    }
}

pub fn room_default(name: &str) -> &'static str {
    match name {
        ATTRIBUTE_TITLE => "An Unremarkable Place",
        ATTRIBUTE_DESCRIPTION => "There is nothing special here.",
        ATTRIBUTE_AREA => "wilderness",
        _ => "",
    }
}
