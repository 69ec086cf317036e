//! # Command Tree
//!
//! Commands are registered once at startup and never mutated afterwards, so
//! resolution reads them without locking. Each [`Command`] body is exactly
//! one of:
//!
//! - **Leaf** - an ordered argument list plus a handler
//! - **Branch** - child commands (`/character get ...`)
//! - **Alias** - a command string resolved again from the top
//!
//! Resolution itself lives in [`manager::CommandManager`].

pub mod builtin;
pub mod manager;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::session::PlayerSession;
use crate::world::character::Character;
use crate::world::errors::WorldError;
use crate::world::World;

pub use manager::{CommandManager, Invocation, Resolution, ResolveError};

/// Handlers run synchronously on the connection's task and report
/// failures through [`WorldError`].
pub type Handler = fn(&CommandContext<'_>) -> Result<(), WorldError>;

/// How unknown and forbidden commands are reported to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Both read "That's an invalid command.", so probing reveals nothing.
    #[default]
    Uniform,
    /// Forbidden commands read "You cannot use that command."
    Distinct,
}

pub const ERR_INVALID: &str = "That's an invalid command.";
pub const ERR_NO_PERMS: &str = "You cannot use that command.";

/// Who may see and run a command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    None,
    RequireNoCharacter,
    RequireCharacter,
    /// A named permission listed in the character's `permissions` attribute.
    Require(String),
}

impl Permission {
    pub fn allows(&self, character: Option<&Character>) -> bool {
        match self {
            Permission::None => true,
            Permission::RequireNoCharacter => character.is_none(),
            Permission::RequireCharacter => character.is_some(),
            Permission::Require(name) => character.is_some_and(|c| c.has_permission(name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgument {
    pub name: String,
    pub optional: bool,
    /// Takes every token from this position on, joined by single spaces.
    pub remaining: bool,
    /// Left out of the command log.
    pub no_log: bool,
}

impl CommandArgument {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            optional: false,
            remaining: false,
            no_log: false,
        }
    }

    pub fn optional(name: &str) -> Self {
        Self {
            optional: true,
            ..Self::required(name)
        }
    }

    pub fn remaining(mut self) -> Self {
        self.remaining = true;
        self
    }

    pub fn no_log(mut self) -> Self {
        self.no_log = true;
        self
    }
}

pub enum CommandBody {
    Leaf {
        arguments: Vec<CommandArgument>,
        handler: Handler,
    },
    Branch {
        children: Vec<Command>,
    },
    Alias {
        target: String,
    },
}

pub struct Command {
    name: String,
    alt_names: Vec<String>,
    help: String,
    hidden: bool,
    permission: Permission,
    body: CommandBody,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            CommandBody::Leaf { arguments, .. } => format!("leaf({} args)", arguments.len()),
            CommandBody::Branch { children } => format!("branch({} children)", children.len()),
            CommandBody::Alias { target } => format!("alias({})", target),
        };
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("permission", &self.permission)
            .field("body", &body)
            .finish()
    }
}

/// Body of a command under construction. Only leaves take arguments and
/// only branches take children; the builder methods exist per body.
pub struct Leaf {
    arguments: Vec<CommandArgument>,
    handler: Handler,
}

pub struct Branch {
    children: Vec<Command>,
}

pub struct Alias {
    target: String,
}

impl From<Leaf> for CommandBody {
    fn from(leaf: Leaf) -> Self {
        CommandBody::Leaf {
            arguments: leaf.arguments,
            handler: leaf.handler,
        }
    }
}

impl From<Branch> for CommandBody {
    fn from(branch: Branch) -> Self {
        CommandBody::Branch {
            children: branch.children,
        }
    }
}

impl From<Alias> for CommandBody {
    fn from(alias: Alias) -> Self {
        CommandBody::Alias { target: alias.target }
    }
}

/// Builder returned by [`Command::leaf`], [`Command::branch`] and
/// [`Command::alias`].
pub struct CommandBuilder<B> {
    name: String,
    alt_names: Vec<String>,
    help: String,
    hidden: bool,
    permission: Permission,
    body: B,
}

impl<B: Into<CommandBody>> CommandBuilder<B> {
    fn new(name: &str, help: &str, body: B) -> Self {
        Self {
            name: name.to_lowercase(),
            alt_names: Vec::new(),
            help: help.to_string(),
            hidden: false,
            permission: Permission::None,
            body,
        }
    }

    pub fn alt_name(mut self, alt: &str) -> Self {
        self.alt_names.push(alt.to_lowercase());
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn build(self) -> Command {
        Command {
            name: self.name,
            alt_names: self.alt_names,
            help: self.help,
            hidden: self.hidden,
            permission: self.permission,
            body: self.body.into(),
        }
    }
}

impl CommandBuilder<Leaf> {
    pub fn argument(mut self, argument: CommandArgument) -> Self {
        self.body.arguments.push(argument);
        self
    }
}

impl CommandBuilder<Branch> {
    pub fn child(mut self, command: impl Into<Command>) -> Self {
        self.body.children.push(command.into());
        self
    }
}

impl<B: Into<CommandBody>> From<CommandBuilder<B>> for Command {
    fn from(builder: CommandBuilder<B>) -> Self {
        builder.build()
    }
}

impl Command {
    pub fn leaf(name: &str, help: &str, handler: Handler) -> CommandBuilder<Leaf> {
        CommandBuilder::new(
            name,
            help,
            Leaf {
                arguments: Vec::new(),
                handler,
            },
        )
    }

    pub fn branch(name: &str, help: &str) -> CommandBuilder<Branch> {
        CommandBuilder::new(name, help, Branch { children: Vec::new() })
    }

    /// `target` is resolved from the top of the tree, with any tokens typed
    /// after the alias appended to it.
    pub fn alias(name: &str, help: &str, target: &str) -> CommandBuilder<Alias> {
        CommandBuilder::new(
            name,
            help,
            Alias {
                target: target.to_string(),
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alt_names(&self) -> &[String] {
        &self.alt_names
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn body(&self) -> &CommandBody {
        &self.body
    }

    pub fn arguments(&self) -> &[CommandArgument] {
        match &self.body {
            CommandBody::Leaf { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Case-insensitive match on the name or any alternate name.
    pub fn matches(&self, token: &str) -> bool {
        self.name.eq_ignore_ascii_case(token)
            || self.alt_names.iter().any(|a| a.eq_ignore_ascii_case(token))
    }

    pub fn check_permission(&self, character: Option<&Character>) -> bool {
        self.permission.allows(character)
    }

    /// Usage text for a leaf reached through `path`.
    pub fn usage(&self, path: &[String]) -> String {
        let mut syntax = format!("Syntax: /{}", path.join(" "));
        for arg in self.arguments() {
            let label = if arg.remaining {
                format!("{}...", arg.name)
            } else {
                arg.name.clone()
            };
            if arg.optional {
                syntax.push_str(&format!(" [{}]", label));
            } else {
                syntax.push_str(&format!(" <{}>", label));
            }
        }
        format!("{}\n{}", self.help, syntax)
    }

    /// Children listing for a branch reached through `path`. Children the
    /// actor may not use, and hidden children, are left out.
    pub fn listing(&self, character: Option<&Character>, path: &[String]) -> String {
        let CommandBody::Branch { children } = &self.body else {
            return self.usage(path);
        };
        let rows: Vec<String> = children
            .iter()
            .filter(|c| !c.hidden && c.check_permission(character))
            .map(|c| format!("  {} - {}", c.name, c.help))
            .collect();
        if rows.is_empty() {
            return "There are no sub-commands available.".to_string();
        }
        format!(
            "{}\nSyntax: /{} <sub-command>\nSub-commands:\n{}",
            self.help,
            path.join(" "),
            rows.join("\n")
        )
    }
}

/// Arguments bound by name. Missing optional arguments read as "".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    values: HashMap<String, String>,
}

impl CommandArgs {
    pub(crate) fn insert(&mut self, name: &str, value: String) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a handler sees for one invocation.
pub struct CommandContext<'a> {
    pub world: &'a World,
    pub command: &'a Command,
    /// Matched names from the root, e.g. `["character", "set"]`.
    pub path: &'a [String],
    pub session: &'a Arc<PlayerSession>,
    pub character: Option<Arc<Character>>,
    pub args: &'a CommandArgs,
}

impl CommandContext<'_> {
    /// Reply to the invoking session.
    pub fn reply(&self, text: impl Into<String>) {
        self.session.send(text);
    }

    /// The acting character. Handlers behind `RequireCharacter` may rely on
    /// it; anything else gets `SessionClosed` once the character is gone.
    pub fn actor(&self) -> Result<&Arc<Character>, WorldError> {
        self.character.as_ref().ok_or(WorldError::SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &CommandContext<'_>) -> Result<(), WorldError> {
        Ok(())
    }

    #[test]
    fn permission_descriptors() {
        let plain = Character::new("Plain", 35);
        let admin = Character::new("Admin", 35);
        admin.set_attribute("permissions", "CAN_CHATTR").unwrap();

        assert!(Permission::None.allows(None));
        assert!(Permission::RequireNoCharacter.allows(None));
        assert!(!Permission::RequireNoCharacter.allows(Some(&plain)));
        assert!(!Permission::RequireCharacter.allows(None));
        let chattr = Permission::Require("CAN_CHATTR".into());
        assert!(!chattr.allows(None), "a named permission implies a character");
        assert!(!chattr.allows(Some(&plain)));
        assert!(chattr.allows(Some(&admin)));
    }

    #[test]
    fn usage_marks_optional_and_remaining() {
        let cmd = Command::leaf("whisper", "Whisper to someone.", noop)
            .argument(CommandArgument::required("target"))
            .argument(CommandArgument::optional("text").remaining())
            .build();
        let path = vec!["whisper".to_string()];
        assert_eq!(
            cmd.usage(&path),
            "Whisper to someone.\nSyntax: /whisper <target> [text...]"
        );
    }

    #[test]
    fn listing_hides_hidden_and_forbidden_children() {
        let cmd = Command::branch("character", "Manage characters.")
            .child(Command::leaf("list", "List characters.", noop))
            .child(Command::leaf("debug", "Debug dump.", noop).hidden())
            .child(
                Command::leaf("set", "Set an attribute.", noop)
                    .permission(Permission::Require("CAN_CHATTR".into())),
            )
            .build();
        let listing = cmd.listing(None, &["character".to_string()]);
        assert!(listing.contains("list - List characters."));
        assert!(!listing.contains("debug"));
        assert!(!listing.contains("set"));
    }

    #[test]
    fn builders_produce_matching_bodies() {
        let branch: Command = Command::branch("channel", "Channels.")
            .child(Command::leaf("list", "List.", noop))
            .child(Command::alias("l", "List.", "channel list"))
            .into();
        let CommandBody::Branch { children } = branch.body() else {
            panic!("branch builder built {:?}", branch);
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(children[1].body(), CommandBody::Alias { target } if target == "channel list"));

        let leaf = Command::leaf("say", "Speak.", noop)
            .argument(CommandArgument::required("text").remaining())
            .build();
        assert_eq!(leaf.arguments().len(), 1);
        assert!(Command::branch("empty", "").build().arguments().is_empty());
    }

    #[test]
    fn args_default_to_empty() {
        let mut args = CommandArgs::default();
        args.insert("item", "lantern".into());
        assert_eq!(args.get("item"), "lantern");
        assert_eq!(args.get("missing"), "");
    }
}
