//! Character name and password validation.
//!
//! Names are single command tokens (input is split on whitespace), so the
//! rules are stricter than a free-form display name.

/// Name validation errors with player-facing messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("names must be at least {min} characters")]
    TooShort { min: usize },

    #[error("names can be at most {max} characters")]
    TooLong { max: usize },

    #[error("names must start with a letter")]
    MustStartWithLetter,

    #[error("names may only contain letters, digits, '_' and '-' (found {chars})")]
    InvalidCharacters { chars: String },

    #[error("that name is reserved")]
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("passwords must be at least {min} characters")]
    TooShort { min: usize },

    #[error("passwords can be at most {max} characters")]
    TooLong { max: usize },
}

pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 20;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Command words and system terms that would read ambiguously as a name.
const RESERVED_NAMES: &[&str] = &[
    "admin", "administrator", "root", "system", "sysop", "operator", "guest", "anonymous",
    "login", "create", "look", "say", "move", "inventory", "get", "drop", "character",
    "channel", "whisper", "who", "quit", "help", "someone", "everyone",
];

/// Validate a character name; returns it unchanged when acceptable.
pub fn validate_character_name(name: &str) -> Result<&str, NameError> {
    let count = name.chars().count();
    if count < NAME_MIN_LENGTH {
        return Err(NameError::TooShort { min: NAME_MIN_LENGTH });
    }
    if count > NAME_MAX_LENGTH {
        return Err(NameError::TooLong { max: NAME_MAX_LENGTH });
    }
    if !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(NameError::MustStartWithLetter);
    }

    let mut invalid: Vec<char> = name
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        .collect();
    if !invalid.is_empty() {
        invalid.sort_unstable();
        invalid.dedup();
        let chars = invalid
            .iter()
            .map(|c| {
                if c.is_control() || c.is_whitespace() {
                    format!("\\u{{{:04x}}}", *c as u32)
                } else {
                    format!("'{}'", c)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(NameError::InvalidCharacters { chars });
    }

    let lower = name.to_lowercase();
    if RESERVED_NAMES.contains(&lower.as_str()) {
        return Err(NameError::Reserved);
    }
    Ok(name)
}

pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let count = password.chars().count();
    if count < PASSWORD_MIN_LENGTH {
        return Err(PasswordError::TooShort { min: PASSWORD_MIN_LENGTH });
    }
    if count > PASSWORD_MAX_LENGTH {
        return Err(PasswordError::TooLong { max: PASSWORD_MAX_LENGTH });
    }
    Ok(())
}
