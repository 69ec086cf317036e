//! Built-in command set.
//!
//! Every handler follows the same shape: read arguments from the context,
//! touch entities through their own accessors, then queue messages. No
//! handler holds an entity lock while notifying.

use log::{info, warn};

use super::{Command, CommandArgument, CommandContext, CommandManager, Permission};
use crate::logutil::escape_log;
use crate::scripting::{self, ScriptInvocation, HOOK_ITEM_TAKEN};
use crate::world::attributes::{self, ATTRIBUTE_CHANNELS, ATTRIBUTE_DESCRIPTION, DIRECTIONS};
use crate::world::errors::WorldError;
use crate::world::types::{EntityKind, ItemLocation};
use crate::world::MoveMessages;

/// Channels every character may join.
pub const CHANNELS: &[&str] = &["general", "trade", "help"];

/// Permission required for the `character` tools.
pub const CAN_CHATTR: &str = "CAN_CHATTR";

/// Temp attribute holding the name of the last character who whispered.
const TEMP_REPLY_TO: &str = "reply_to";

type HandlerResult = Result<(), WorldError>;

pub fn register_builtin(m: &mut CommandManager) {
    m.register(
        Command::leaf("login", "Log in to an existing character.", login)
            .permission(Permission::RequireNoCharacter)
            .argument(CommandArgument::required("character"))
            .argument(CommandArgument::required("password").no_log()),
    );
    m.register(
        Command::leaf("create", "Create a new character.", create)
            .permission(Permission::RequireNoCharacter)
            .argument(CommandArgument::required("character"))
            .argument(CommandArgument::required("password").no_log()),
    );
    m.register(
        Command::leaf("password", "Change your password.", password)
            .permission(Permission::RequireCharacter)
            .argument(CommandArgument::required("current").no_log())
            .argument(CommandArgument::required("new").no_log()),
    );
    m.register(
        Command::leaf("look", "Look around, or at something.", look)
            .alt_name("l")
            .permission(Permission::RequireCharacter)
            .argument(CommandArgument::optional("target").remaining()),
    );
    m.register(
        Command::leaf("say", "Say something to everyone in the room.", say)
            .permission(Permission::RequireCharacter)
            .argument(CommandArgument::required("text").remaining()),
    );
    m.register(
        Command::leaf("move", "Move in a direction.", walk)
            .alt_name("go")
            .permission(Permission::RequireCharacter)
            .argument(CommandArgument::required("direction")),
    );
    for dir in DIRECTIONS {
        let short = &dir[..1];
        m.register(
            Command::alias(dir, &format!("Move {}.", dir), &format!("move {}", dir))
                .alt_name(short)
                .permission(Permission::RequireCharacter)
                .hidden(),
        );
    }
    m.register(
        Command::leaf("inventory", "Show what you are carrying.", inventory)
            .alt_name("i")
            .permission(Permission::RequireCharacter),
    );
    m.register(
        Command::leaf("get", "Pick up an item.", get)
            .alt_name("take")
            .permission(Permission::RequireCharacter)
            .argument(CommandArgument::required("item").remaining()),
    );
    m.register(
        Command::leaf("drop", "Drop an item you are carrying.", drop_item)
            .permission(Permission::RequireCharacter)
            .argument(CommandArgument::required("item").remaining()),
    );
    m.register(
        Command::branch("character", "Inspect and edit characters.")
            .permission(Permission::Require(CAN_CHATTR.to_string()))
            .child(
                Command::leaf("get", "Read a character attribute.", character_get)
                    .argument(CommandArgument::required("character"))
                    .argument(CommandArgument::required("attribute")),
            )
            .child(
                Command::leaf("set", "Set a character attribute.", character_set)
                    .argument(CommandArgument::required("character"))
                    .argument(CommandArgument::required("attribute"))
                    .argument(CommandArgument::optional("value").remaining()),
            ),
    );
    m.register(
        Command::branch("channel", "Talk on channels.")
            .permission(Permission::RequireCharacter)
            .child(Command::leaf("list", "List channels.", channel_list))
            .child(
                Command::leaf("join", "Join a channel.", channel_join)
                    .argument(CommandArgument::required("channel")),
            )
            .child(
                Command::leaf("leave", "Leave a channel.", channel_leave)
                    .argument(CommandArgument::required("channel")),
            )
            .child(
                Command::leaf("say", "Say something on a channel.", channel_say)
                    .argument(CommandArgument::required("channel"))
                    .argument(CommandArgument::required("text").remaining()),
            ),
    );
    m.register(
        Command::alias("g", "Talk on the general channel.", "channel say general")
            .permission(Permission::RequireCharacter),
    );
    m.register(
        Command::leaf("whisper", "Whisper privately to someone online.", whisper)
            .permission(Permission::RequireCharacter)
            .argument(CommandArgument::required("character"))
            .argument(CommandArgument::required("text").remaining()),
    );
    m.register(
        Command::leaf("reply", "Reply to the last whisper.", reply)
            .permission(Permission::RequireCharacter)
            .argument(CommandArgument::required("text").remaining()),
    );
    m.register(Command::leaf("who", "List who is online.", who));
    m.register(Command::leaf("help", "List available commands.", help));
    m.register(Command::leaf("quit", "Disconnect.", quit).alt_name("logout"));
}

fn login(ctx: &CommandContext<'_>) -> HandlerResult {
    let name = ctx.args.get("character");
    let Some(character) = ctx.world.authenticate(name, ctx.args.get("password")) else {
        warn!(
            target: "security",
            "login.failed session={} peer={} name={}",
            ctx.session.id(),
            escape_log(ctx.session.peer()),
            escape_log(name)
        );
        ctx.reply("Invalid character name or password.");
        return Ok(());
    };
    ctx.world.attach_character(ctx.session, &character)?;
    info!(
        target: "security",
        "login.ok session={} peer={} name={}",
        ctx.session.id(),
        escape_log(ctx.session.peer()),
        escape_log(character.name())
    );
    ctx.reply(format!("Welcome back, {}.", character.name()));
    ctx.world.character_logged_in(&character);
    Ok(())
}

fn create(ctx: &CommandContext<'_>) -> HandlerResult {
    let character = ctx
        .world
        .create_character(ctx.args.get("character"), ctx.args.get("password"))?;
    ctx.world.attach_character(ctx.session, &character)?;
    ctx.reply(format!("Welcome, {}. Your character has been created.", character.name()));
    ctx.world.character_logged_in(&character);
    Ok(())
}

fn password(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    if !actor.check_password(ctx.world.hasher(), ctx.args.get("current")) {
        warn!(
            target: "security",
            "password.change_failed name={}",
            escape_log(actor.name())
        );
        ctx.reply("Your current password is incorrect.");
        return Ok(());
    }
    let new = ctx.args.get("new");
    crate::validation::validate_password(new)
        .map_err(|e| WorldError::InvalidPassword(e.to_string()))?;
    actor.set_password(ctx.world.hasher(), new)?;
    info!(target: "security", "password.changed name={}", escape_log(actor.name()));
    ctx.reply("Your password has been changed.");
    Ok(())
}

fn look(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let room = ctx
        .world
        .room_of(actor.id())
        .ok_or(WorldError::Uncontained(actor.id()))?;
    let target = ctx.args.get("target");
    if target.is_empty() {
        ctx.reply(ctx.world.describe_room(&room, Some(actor.id())));
        return Ok(());
    }

    if let Some(other) = ctx
        .world
        .characters_in(room.here(), false, None)
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(target))
    {
        ctx.reply(format!(
            "{}\n{}",
            other.display_name_with_title(),
            other.attribute(ATTRIBUTE_DESCRIPTION)
        ));
        return Ok(());
    }
    let item = ctx
        .world
        .find_item_in(room.here(), target)
        .or_else(|| ctx.world.find_item_in(actor.inventory(), target));
    match item {
        Some(item) => {
            let description = item.attribute(ATTRIBUTE_DESCRIPTION);
            if description.is_empty() {
                ctx.reply(format!("You see nothing special about the {}.", item.name()));
            } else {
                ctx.reply(description);
            }
        }
        None => ctx.reply("You don't see that here."),
    }
    Ok(())
}

fn say(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let room = ctx
        .world
        .room_of(actor.id())
        .ok_or(WorldError::Uncontained(actor.id()))?;
    let text = ctx.args.get("text");
    ctx.reply(format!("You say, \"{}\"", text));
    let heard = format!("{} says, \"{}\"", actor.name(), text);
    for other in ctx.world.characters_in(room.here(), true, Some(actor.id())) {
        other.notify(heard.clone());
    }
    Ok(())
}

fn opposite(direction: &str) -> &'static str {
    match direction {
        "north" => "south",
        "south" => "north",
        "east" => "west",
        "west" => "east",
        "up" => "below",
        "down" => "above",
        _ => "somewhere",
    }
}

fn walk(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let direction = ctx.args.get("direction").to_lowercase();
    let room = ctx
        .world
        .room_of(actor.id())
        .ok_or(WorldError::Uncontained(actor.id()))?;
    let Some(destination) = room.exit(&direction).and_then(|id| ctx.world.room(id)) else {
        ctx.reply("You cannot go that way.");
        return Ok(());
    };
    let from = match direction.as_str() {
        "up" | "down" => opposite(&direction).to_string(),
        _ => format!("the {}", opposite(&direction)),
    };
    ctx.world.move_character(
        actor,
        &destination,
        MoveMessages {
            to_mover: None,
            to_old_room: format!("{} left heading {}.", actor.name(), direction),
            to_new_room: format!("{} arrived from {}.", actor.name(), from),
        },
    )?;
    ctx.reply(ctx.world.describe_room(&destination, Some(actor.id())));
    Ok(())
}

fn inventory(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let bag = actor.inventory();
    let items = ctx.world.items_in(bag);
    if items.is_empty() {
        ctx.reply("You are not carrying anything.");
        return Ok(());
    }
    let names: Vec<&str> = items.iter().map(|i| i.name()).collect();
    ctx.reply(format!(
        "You are carrying ({}/{}): {}",
        bag.len(),
        bag.capacity(),
        names.join(", ")
    ));
    Ok(())
}

fn get(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let room = ctx
        .world
        .room_of(actor.id())
        .ok_or(WorldError::Uncontained(actor.id()))?;
    let Some(item) = ctx.world.find_item_in(room.here(), ctx.args.get("item")) else {
        ctx.reply("You don't see that here.");
        return Ok(());
    };
    if actor.inventory().is_full() {
        ctx.reply("You cannot carry any more.");
        return Ok(());
    }
    ctx.world
        .move_item(&item, ItemLocation::Character(actor.id()))?;
    ctx.reply(format!("You pick up the {}.", item.name()));
    let seen = format!("{} picks up a {}.", actor.name(), item.name());
    for other in ctx.world.characters_in(room.here(), true, Some(actor.id())) {
        other.notify(seen.clone());
    }
    if let Some(script) = item.template().script() {
        scripting::run_script(
            ctx.world,
            &ScriptInvocation {
                script: script.to_string(),
                function: HOOK_ITEM_TAKEN.to_string(),
                invoker: actor.name().to_string(),
                room: room.id(),
            },
        );
    }
    Ok(())
}

fn drop_item(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let room = ctx
        .world
        .room_of(actor.id())
        .ok_or(WorldError::Uncontained(actor.id()))?;
    let Some(item) = ctx.world.find_item_in(actor.inventory(), ctx.args.get("item")) else {
        ctx.reply("You aren't carrying that.");
        return Ok(());
    };
    ctx.world.move_item(&item, ItemLocation::Room(room.id()))?;
    ctx.reply(format!("You drop the {}.", item.name()));
    let seen = format!("{} drops a {}.", actor.name(), item.name());
    for other in ctx.world.characters_in(room.here(), true, Some(actor.id())) {
        other.notify(seen.clone());
    }
    Ok(())
}

fn character_get(ctx: &CommandContext<'_>) -> HandlerResult {
    let Some(target) = ctx.world.character_by_name(ctx.args.get("character")) else {
        ctx.reply("That character doesn't exist.");
        return Ok(());
    };
    let attribute = ctx.args.get("attribute").to_lowercase();
    if !attributes::is_valid(EntityKind::Character, &attribute) {
        return Err(WorldError::InvalidAttribute(attribute));
    }
    ctx.reply(format!(
        "{}'s {} is \"{}\".",
        target.name(),
        attribute,
        target.attribute(&attribute)
    ));
    Ok(())
}

fn character_set(ctx: &CommandContext<'_>) -> HandlerResult {
    let Some(target) = ctx.world.character_by_name(ctx.args.get("character")) else {
        ctx.reply("That character doesn't exist.");
        return Ok(());
    };
    let attribute = ctx.args.get("attribute").to_lowercase();
    let value = ctx.args.get("value");
    target.set_attribute(&attribute, value)?;
    info!(
        target: "mushcore::commands",
        "character.set by={} target={} attribute={}",
        ctx.character.as_ref().map(|c| c.name()).unwrap_or("-"),
        escape_log(target.name()),
        attribute
    );
    if value.is_empty() {
        ctx.reply(format!("{}'s {} has been cleared.", target.name(), attribute));
    } else {
        ctx.reply(format!("{}'s {} is now \"{}\".", target.name(), attribute, value));
    }
    Ok(())
}

fn joined_channels(channels: &str) -> Vec<String> {
    channels.split_whitespace().map(str::to_lowercase).collect()
}

fn known_channel(name: &str) -> Option<&'static str> {
    CHANNELS.iter().copied().find(|c| c.eq_ignore_ascii_case(name))
}

fn channel_list(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let joined = joined_channels(&actor.attribute(ATTRIBUTE_CHANNELS));
    let rows: Vec<String> = CHANNELS
        .iter()
        .map(|c| {
            if joined.iter().any(|j| j == c) {
                format!("  {} (joined)", c)
            } else {
                format!("  {}", c)
            }
        })
        .collect();
    ctx.reply(format!("Channels:\n{}", rows.join("\n")));
    Ok(())
}

fn channel_join(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let Some(channel) = known_channel(ctx.args.get("channel")) else {
        ctx.reply("That channel doesn't exist.");
        return Ok(());
    };
    let mut joined = joined_channels(&actor.attribute(ATTRIBUTE_CHANNELS));
    if joined.iter().any(|j| j == channel) {
        ctx.reply(format!("You are already in {}.", channel));
        return Ok(());
    }
    joined.push(channel.to_string());
    actor.set_attribute(ATTRIBUTE_CHANNELS, &joined.join(" "))?;
    ctx.reply(format!("You joined {}.", channel));
    Ok(())
}

fn channel_leave(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let Some(channel) = known_channel(ctx.args.get("channel")) else {
        ctx.reply("That channel doesn't exist.");
        return Ok(());
    };
    let joined = joined_channels(&actor.attribute(ATTRIBUTE_CHANNELS));
    if !joined.iter().any(|j| j == channel) {
        ctx.reply("You are not in that channel.");
        return Ok(());
    }
    let rest: Vec<String> = joined.into_iter().filter(|j| j != channel).collect();
    // An empty value reads back as the default list; a blank keeps it empty.
    let value = if rest.is_empty() { " ".to_string() } else { rest.join(" ") };
    actor.set_attribute(ATTRIBUTE_CHANNELS, &value)?;
    ctx.reply(format!("You left {}.", channel));
    Ok(())
}

fn channel_say(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let Some(channel) = known_channel(ctx.args.get("channel")) else {
        ctx.reply("That channel doesn't exist.");
        return Ok(());
    };
    if !joined_channels(&actor.attribute(ATTRIBUTE_CHANNELS))
        .iter()
        .any(|j| j == channel)
    {
        ctx.reply("You are not in that channel.");
        return Ok(());
    }
    let line = format!("[{}] {}: {}", channel, actor.name(), ctx.args.get("text"));
    for listener in ctx.world.sessions().online_characters() {
        if joined_channels(&listener.attribute(ATTRIBUTE_CHANNELS))
            .iter()
            .any(|j| j == channel)
        {
            listener.notify(line.clone());
        }
    }
    Ok(())
}

fn whisper_to(ctx: &CommandContext<'_>, name: &str, text: &str) -> HandlerResult {
    let actor = ctx.actor()?;
    let target = ctx
        .world
        .character_by_name(name)
        .filter(|c| c.is_online() && c.id() != actor.id());
    let Some(target) = target else {
        ctx.reply("No one by that name is online.");
        return Ok(());
    };
    target.notify(format!("{} whispers, \"{}\"", actor.name(), text));
    target.set_temp_attribute(TEMP_REPLY_TO, actor.name());
    ctx.reply(format!("You whisper to {}, \"{}\"", target.name(), text));
    Ok(())
}

fn whisper(ctx: &CommandContext<'_>) -> HandlerResult {
    whisper_to(ctx, ctx.args.get("character"), ctx.args.get("text"))
}

fn reply(ctx: &CommandContext<'_>) -> HandlerResult {
    let actor = ctx.actor()?;
    let target = actor.temp_attribute(TEMP_REPLY_TO);
    if target.is_empty() {
        ctx.reply("No one has whispered to you yet.");
        return Ok(());
    }
    whisper_to(ctx, &target, ctx.args.get("text"))
}

fn who(ctx: &CommandContext<'_>) -> HandlerResult {
    let online = ctx.world.sessions().online_characters();
    if online.is_empty() {
        ctx.reply("No one is online.");
        return Ok(());
    }
    let names: Vec<String> = online.iter().map(|c| c.display_name_with_title()).collect();
    ctx.reply(format!("Online ({}):\n  {}", names.len(), names.join("\n  ")));
    Ok(())
}

fn help(ctx: &CommandContext<'_>) -> HandlerResult {
    let character = ctx.character.as_deref();
    let rows: Vec<String> = ctx
        .world
        .commands()
        .commands()
        .iter()
        .filter(|c| !c.is_hidden() && c.check_permission(character))
        .map(|c| format!("  {} - {}", c.name(), c.help()))
        .collect();
    ctx.reply(format!(
        "Commands (add --help to any command for its syntax):\n{}",
        rows.join("\n")
    ));
    Ok(())
}

fn quit(ctx: &CommandContext<'_>) -> HandlerResult {
    ctx.world.disconnect(ctx.session);
    Ok(())
}
