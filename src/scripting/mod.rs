//! Script hook boundary.
//!
//! The world never embeds an interpreter. A [`ScriptEngine`] is plugged in
//! through [`World::with_script_engine`](crate::world::World::with_script_engine)
//! and gets a [`HostApi`] with a small, stable callback surface taking
//! primitive arguments. Host calls answer with a value or one of the
//! negative error codes below.
//!
//! **Sandbox limits:**
//! - Max messages per invocation: [`MAX_MESSAGES_PER_INVOCATION`]
//! - Engine failures are logged and counted, never shown to the player
//!   whose action triggered the hook

use log::{debug, error};
use std::cell::Cell;
use thiserror::Error;

use crate::logutil::escape_log;
use crate::metrics;
use crate::world::attributes;
use crate::world::types::{EntityId, EntityKind};
use crate::world::World;

pub const HOST_OK: i32 = 0;
/// The named character or room does not exist.
pub const ERR_ACTOR_NOT_FOUND: i32 = -1;
/// Bad argument, unknown attribute, or message budget spent.
pub const ERR_VALIDATION: i32 = -2;

pub const MAX_MESSAGES_PER_INVOCATION: u8 = 3;

/// Hook fired when a character enters a room with a `script` attribute.
pub const HOOK_CHARACTER_ENTERED: &str = "character_entered";
/// Fired on the room being left, before the arrival hooks run.
pub const HOOK_CHARACTER_LEFT: &str = "character_left";
/// Fired on the first room of an area a character walks (or logs) into.
pub const HOOK_AREA_ENTERED: &str = "area_entered";
pub const HOOK_AREA_LEFT: &str = "area_left";
/// Hook fired when an instance of a scripted item template is picked up.
pub const HOOK_ITEM_TAKEN: &str = "item_taken";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script {script} failed to compile: {reason}")]
    Compile { script: String, reason: String },

    #[error("script {script} failed in {function}: {reason}")]
    Runtime {
        script: String,
        function: String,
        reason: String,
    },

    #[error("script not found: {0}")]
    NotFound(String),
}

/// One hook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub script: String,
    pub function: String,
    /// Name of the character whose action fired the hook.
    pub invoker: String,
    pub room: EntityId,
}

pub trait ScriptEngine: Send + Sync {
    fn invoke(&self, host: &HostApi<'_>, invocation: &ScriptInvocation) -> Result<(), ScriptError>;
}

/// Callbacks available to a running script. Lives for a single invocation.
pub struct HostApi<'w> {
    world: &'w World,
    invocation: &'w ScriptInvocation,
    messages_sent: Cell<u8>,
}

impl<'w> HostApi<'w> {
    pub fn new(world: &'w World, invocation: &'w ScriptInvocation) -> Self {
        Self {
            world,
            invocation,
            messages_sent: Cell::new(0),
        }
    }

    pub fn invoker_name(&self) -> &str {
        &self.invocation.invoker
    }

    pub fn room_id(&self) -> String {
        self.invocation.room.to_string()
    }

    /// Show `text` to every online character in the room. Returns the number
    /// of characters reached.
    pub fn emit_to_room(&self, room: &str, text: &str) -> i32 {
        if self.messages_sent.get() >= MAX_MESSAGES_PER_INVOCATION {
            debug!(
                "script.budget script={} function={} limit={}",
                self.invocation.script, self.invocation.function, MAX_MESSAGES_PER_INVOCATION
            );
            return ERR_VALIDATION;
        }
        let Ok(room_id) = room.parse::<EntityId>() else {
            return ERR_VALIDATION;
        };
        let Some(room) = self.world.room(room_id) else {
            return ERR_ACTOR_NOT_FOUND;
        };
        self.messages_sent.set(self.messages_sent.get() + 1);
        let mut reached = 0;
        for character in self.world.characters_in(room.here(), true, None) {
            if character.notify(text).is_delivered() {
                reached += 1;
            }
        }
        reached
    }

    pub fn read_character_attribute(&self, name: &str, attribute: &str) -> Result<String, i32> {
        let character = self.world.character_by_name(name).ok_or(ERR_ACTOR_NOT_FOUND)?;
        if !attributes::is_valid(EntityKind::Character, attribute) {
            return Err(ERR_VALIDATION);
        }
        Ok(character.attribute(attribute))
    }

    pub fn write_character_attribute(&self, name: &str, attribute: &str, value: &str) -> i32 {
        let Some(character) = self.world.character_by_name(name) else {
            return ERR_ACTOR_NOT_FOUND;
        };
        match character.set_attribute(attribute, value) {
            Ok(()) => HOST_OK,
            Err(_) => ERR_VALIDATION,
        }
    }
}

/// Run one hook if an engine is installed. Returns whether it completed;
/// failures are logged here and go no further.
pub fn run_script(world: &World, invocation: &ScriptInvocation) -> bool {
    let Some(engine) = world.script_engine() else {
        debug!(
            "script.skip script={} function={} reason=no_engine",
            invocation.script, invocation.function
        );
        return false;
    };
    let host = HostApi::new(world, invocation);
    match engine.invoke(&host, invocation) {
        Ok(()) => true,
        Err(e) => {
            metrics::inc_script_failures();
            error!(
                "script.error script={} function={} invoker={} error={}",
                invocation.script,
                invocation.function,
                escape_log(&invocation.invoker),
                escape_log(&e.to_string())
            );
            false
        }
    }
}
