//! `${VAR}` / `${VAR:-default}` expansion for configuration text.
//!
//! Expansion runs on the raw file text before it is parsed, so it works the
//! same for TOML and YAML configs. A `$` not followed by `{` is left alone.

use std::borrow::Cow;

use anyhow::{bail, Result};

/// Expand references from the process environment.
///
/// `${VAR}` fails when `VAR` is unset. `${VAR:-default}` falls back to
/// `default` when `VAR` is unset or empty.
pub fn expand_env_vars(text: &str) -> Result<Cow<'_, str>> {
    expand_with(text, |name| std::env::var(name).ok())
}

/// Expand references using `lookup` to resolve variable names.
pub fn expand_with<F>(text: &str, lookup: F) -> Result<Cow<'_, str>>
where
    F: Fn(&str) -> Option<String>,
{
    if !text.contains("${") {
        return Ok(Cow::Borrowed(text));
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let body_start = open + 2;
        let Some(len) = rest[body_start..].find('}') else {
            let offset = text.len() - rest.len() + open;
            bail!("Unclosed environment variable reference at byte {offset}");
        };
        let body = &rest[body_start..body_start + len];
        out.push_str(&resolve(body, &lookup)?);
        rest = &rest[body_start + len + 1..];
    }
    out.push_str(rest);

    Ok(Cow::Owned(out))
}

fn resolve<F>(body: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let (name, default) = match body.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (body, None),
    };
    check_name(name)?;

    match (lookup(name), default) {
        (Some(value), Some(_)) if !value.is_empty() => Ok(value),
        (_, Some(default)) => Ok(default.to_string()),
        (Some(value), None) => Ok(value),
        (None, None) => bail!(
            "Environment variable '{name}' is not set. Use ${{{name}:-default}} to provide a default."
        ),
    }
}

fn check_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    match chars.next() {
        None => bail!("Empty environment variable name in ${{}}"),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            bail!("Invalid environment variable name '{name}': must start with a letter or underscore")
        }
        Some(_) => {}
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        bail!("Invalid environment variable name '{name}': contains '{bad}'");
    }
    Ok(())
}
