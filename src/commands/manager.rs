//! Resolution of typed input against the registered command tree.
//!
//! 1. Split on whitespace; match the first token case-insensitively.
//! 2. A failed permission check stops resolution.
//! 3. Branches list their children when nothing (or only `--help`) follows,
//!    otherwise descend.
//! 4. Leaves bind the remaining tokens to their argument list.
//! 5. Aliases restart from the top on their target, bounded by
//!    `max_alias_depth`.
//!
//! No state survives between invocations.

use log::{debug, error, info, warn};
use std::sync::Arc;
use thiserror::Error;

use super::{
    Command, CommandArgs, CommandBody, CommandContext, ErrorPolicy, Handler, ERR_INVALID,
    ERR_NO_PERMS,
};
use crate::config::CommandsConfig;
use crate::logutil::{escape_log, redact_args};
use crate::metrics;
use crate::session::PlayerSession;
use crate::world::character::Character;
use crate::world::World;

const HELP_FLAG: &str = "--help";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("empty input")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("permission denied for command: {0}")]
    PermissionDenied(String),

    /// Alias chain longer than `max_alias_depth`; a registration mistake.
    #[error("alias chain exceeded depth {depth}")]
    AliasLoop { depth: usize },
}

impl ResolveError {
    pub fn user_message(&self, policy: ErrorPolicy) -> &'static str {
        match (self, policy) {
            (ResolveError::PermissionDenied(_), ErrorPolicy::Distinct) => ERR_NO_PERMS,
            _ => ERR_INVALID,
        }
    }
}

/// A resolved leaf, ready to run.
pub struct Invocation<'m> {
    pub command: &'m Command,
    pub handler: Handler,
    pub path: Vec<String>,
    pub args: CommandArgs,
}

impl std::fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("path", &self.path)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Resolution<'m> {
    Execute(Invocation<'m>),
    /// Listing or usage text for the invoking session.
    Help(String),
}

pub struct CommandManager {
    commands: Vec<Command>,
    error_policy: ErrorPolicy,
    max_alias_depth: usize,
}

impl CommandManager {
    pub fn new(config: &CommandsConfig) -> Self {
        Self {
            commands: Vec::new(),
            error_policy: config.error_policy,
            max_alias_depth: config.max_alias_depth,
        }
    }

    /// Register a top-level command. Registration happens before the world is
    /// shared; the tree is read-only afterwards.
    pub fn register(&mut self, command: impl Into<Command>) {
        let command = command.into();
        if let Some(existing) = self
            .commands
            .iter()
            .find(|c| c.matches(command.name()) || command.alt_names().iter().any(|a| c.matches(a)))
        {
            warn!(
                target: "mushcore::commands",
                "command.register shadowed name={} by_existing={}",
                command.name(),
                existing.name()
            );
        }
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    pub fn resolve(&self, character: Option<&Character>, input: &str) -> Result<Resolution<'_>, ResolveError> {
        self.resolve_at_depth(character, input, 0)
    }

    fn resolve_at_depth(
        &self,
        character: Option<&Character>,
        input: &str,
        depth: usize,
    ) -> Result<Resolution<'_>, ResolveError> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        let Some((first, mut rest)) = tokens.split_first() else {
            return Err(ResolveError::Empty);
        };
        let mut head = *first;
        let mut level: &[Command] = &self.commands;
        let mut path: Vec<String> = Vec::new();

        loop {
            let Some(command) = level.iter().find(|c| c.matches(head)) else {
                path.push(head.to_lowercase());
                return Err(ResolveError::Unknown(path.join(" ")));
            };
            path.push(command.name().to_string());
            if !command.check_permission(character) {
                return Err(ResolveError::PermissionDenied(path.join(" ")));
            }

            match command.body() {
                CommandBody::Branch { children } => match rest {
                    [] | [HELP_FLAG] => {
                        return Ok(Resolution::Help(command.listing(character, &path)));
                    }
                    [next, tail @ ..] => {
                        level = children;
                        head = *next;
                        rest = tail;
                    }
                },
                CommandBody::Leaf { handler, .. } => {
                    return Ok(bind(command, *handler, path, rest));
                }
                CommandBody::Alias { target } => {
                    if depth >= self.max_alias_depth {
                        error!(
                            target: "mushcore::commands",
                            "command.alias_loop alias={} target={} depth={}",
                            command.name(),
                            escape_log(target),
                            depth
                        );
                        return Err(ResolveError::AliasLoop { depth });
                    }
                    let expanded = if rest.is_empty() {
                        target.clone()
                    } else {
                        format!("{} {}", target, rest.join(" "))
                    };
                    return self.resolve_at_depth(character, &expanded, depth + 1);
                }
            }
        }
    }

    /// Resolve and run one line of player input, sending any reply to
    /// `session`.
    pub fn process(&self, world: &World, session: &Arc<PlayerSession>, input: &str) {
        if !session.is_active() {
            return;
        }
        session.touch();
        let character = session.character();
        let actor = character
            .as_ref()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "-".to_string());

        let invocation = match self.resolve(character.as_deref(), input) {
            Ok(Resolution::Execute(invocation)) => invocation,
            Ok(Resolution::Help(text)) => {
                session.send(text);
                return;
            }
            Err(ResolveError::Empty) => return,
            Err(e) => {
                metrics::inc_commands_rejected();
                debug!(
                    target: "mushcore::commands",
                    "command.reject session={} character={} reason={}",
                    session.id(),
                    escape_log(&actor),
                    escape_log(&e.to_string())
                );
                session.send(e.user_message(self.error_policy));
                return;
            }
        };

        info!(
            target: "mushcore::commands",
            "command.exec session={} character={} command={} args=[{}]",
            session.id(),
            escape_log(&actor),
            invocation.path.join("."),
            redact_args(
                invocation
                    .command
                    .arguments()
                    .iter()
                    .map(|a| (a.name.as_str(), invocation.args.get(&a.name), a.no_log))
            )
        );
        metrics::inc_commands_executed();

        let ctx = CommandContext {
            world,
            command: invocation.command,
            path: &invocation.path,
            session,
            character,
            args: &invocation.args,
        };
        if let Err(e) = (invocation.handler)(&ctx) {
            if e.is_invariant_violation() {
                metrics::inc_invariant_violations();
                error!(
                    target: "mushcore::commands",
                    "command.invariant session={} character={} command={} error={}",
                    session.id(),
                    escape_log(&actor),
                    invocation.path.join("."),
                    e
                );
                world.disconnect(session);
            } else {
                session.send(e.user_message());
            }
        }
    }
}

fn bind<'m>(command: &'m Command, handler: Handler, path: Vec<String>, tokens: &[&str]) -> Resolution<'m> {
    if tokens.last() == Some(&HELP_FLAG) {
        return Resolution::Help(command.usage(&path));
    }
    let mut args = CommandArgs::default();
    for (pos, arg) in command.arguments().iter().enumerate() {
        if !arg.optional && pos >= tokens.len() {
            return Resolution::Help(command.usage(&path));
        }
        let value = if arg.remaining {
            tokens.get(pos..).map(|t| t.join(" ")).unwrap_or_default()
        } else {
            tokens.get(pos).map(|t| t.to_string()).unwrap_or_default()
        };
        args.insert(&arg.name, value);
    }
    Resolution::Execute(Invocation {
        command,
        handler,
        path,
        args,
    })
}
