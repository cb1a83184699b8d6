//! Shell-like splitting of `Resource` command strings.
//!
//! Task resources are authored as a single command line (for example
//! `"node runners/slack.js --post"`). The subprocess executor needs that
//! string as an argv vector, so this module tokenizes it with shell quoting
//! rules: single and double quotes group words, and a backslash escapes the
//! next character outside single quotes.

use thiserror::Error;

/// Errors raised while splitting a command string.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("unterminated quote in command '{0}'")]
    UnterminatedQuote(String),

    #[error("trailing backslash in command '{0}'")]
    TrailingEscape(String),
}

/// Split a command string into argv tokens.
///
/// Quotes are removed from the resulting tokens and backslash escapes are
/// resolved, so the output is suitable to hand to a process spawner directly.
///
/// # Example
/// ```rust
/// use wkflws_util::shell_lexing::split_command;
///
/// let argv = split_command("runner --label 'some value'").unwrap();
/// assert_eq!(argv, vec!["runner", "--label", "some value"]);
/// ```
pub fn split_command(input: &str) -> Result<Vec<String>, SplitError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(character) = chars.next() {
        match character {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => return Err(SplitError::UnterminatedQuote(input.to_string())),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => current.push(escaped),
                            None => return Err(SplitError::UnterminatedQuote(input.to_string())),
                        },
                        Some(inner) => current.push(inner),
                        None => return Err(SplitError::UnterminatedQuote(input.to_string())),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(SplitError::TrailingEscape(input.to_string())),
                }
            }
            character if character.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            character => {
                in_token = true;
                current.push(character);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}
