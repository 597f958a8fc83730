//! Environment variable expansion for configuration files.
//!
//! Config text is expanded before it is parsed:
//!
//! - `${VAR}` is replaced with the value of VAR and fails if VAR is unset
//! - `${VAR:-default}` uses "default" if VAR is unset or empty
//!
//! A `$` not followed by `{` is kept as is.

use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvExpandError {
    #[error("unclosed environment variable reference starting at position {position}: ${{{prefix}...")]
    Unclosed { position: usize, prefix: String },
    #[error("empty environment variable name in ${{}}")]
    EmptyName,
    #[error("invalid environment variable name '{name}': {problem}")]
    InvalidName { name: String, problem: &'static str },
    #[error("environment variable '{0}' is not set; use ${{{0}:-default}} to provide a default")]
    Unset(String),
}

/// Expand references against the process environment.
pub fn expand_env_vars(text: &str) -> Result<Cow<'_, str>, EnvExpandError> {
    expand_with(text, |name| std::env::var(name).ok())
}

/// Expand references, resolving variable names through `lookup`.
pub fn expand_with<F>(text: &str, lookup: F) -> Result<Cow<'_, str>, EnvExpandError>
where
    F: Fn(&str) -> Option<String>,
{
    if !text.contains("${") {
        return Ok(Cow::Borrowed(text));
    }

    let mut result = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' || !matches!(chars.peek(), Some(&(_, '{'))) {
            result.push(c);
            continue;
        }
        chars.next();

        let mut content = String::new();
        let mut depth = 1;
        let mut closed = false;
        for (_, ch) in chars.by_ref() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        closed = true;
                        break;
                    }
                }
                _ => {}
            }
            content.push(ch);
        }

        if !closed {
            return Err(EnvExpandError::Unclosed {
                position: i,
                prefix: content.chars().take(20).collect(),
            });
        }
        result.push_str(&expand_reference(&content, &lookup)?);
    }

    Ok(Cow::Owned(result))
}

/// Expand the content between `${` and `}`.
fn expand_reference<F>(content: &str, lookup: &F) -> Result<String, EnvExpandError>
where
    F: Fn(&str) -> Option<String>,
{
    match content.split_once(":-") {
        Some((name, default)) => {
            validate_var_name(name)?;
            Ok(lookup(name)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string()))
        }
        None => {
            validate_var_name(content)?;
            lookup(content).ok_or_else(|| EnvExpandError::Unset(content.to_string()))
        }
    }
}

fn validate_var_name(name: &str) -> Result<(), EnvExpandError> {
    let Some(first) = name.chars().next() else {
        return Err(EnvExpandError::EmptyName);
    };
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(EnvExpandError::InvalidName {
            name: name.to_string(),
            problem: "must start with a letter or underscore",
        });
    }
    if name.chars().any(|c| !c.is_ascii_alphanumeric() && c != '_') {
        return Err(EnvExpandError::InvalidName {
            name: name.to_string(),
            problem: "contains an invalid character",
        });
    }
    Ok(())
}
