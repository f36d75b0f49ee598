//! `$name` / `${name}` template substitution for proxy config files
//!
//! Substitution is strict: every placeholder must have a value, `$$` is a
//! literal dollar, and a `$` not followed by a valid identifier is an error.
//! Identifiers are ASCII letters, digits and `_`, not starting with a digit.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Position as `line:column`, 1-based, for error messages.
fn position(text: &str, offset: usize) -> String {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    format!("{line}:{column}")
}

fn lookup<'a>(vars: &'a BTreeMap<String, String>, name: &str) -> Result<&'a str> {
    vars.get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::Template(format!("unknown variable: {name}")))
}

pub fn render_template(text: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let offset = text.len() - rest.len() + idx;
        let after = &rest[idx + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| {
                Error::Template(format!("unterminated placeholder at {}", position(text, offset)))
            })?;
            let name = &braced[..end];
            let valid = name.chars().next().is_some_and(is_ident_start)
                && name.chars().all(is_ident_char);
            if !valid {
                return Err(Error::Template(format!(
                    "invalid placeholder at {}",
                    position(text, offset)
                )));
            }
            out.push_str(lookup(vars, name)?);
            rest = &braced[end + 1..];
        } else if after.chars().next().is_some_and(is_ident_start) {
            let len = after
                .find(|c: char| !is_ident_char(c))
                .unwrap_or(after.len());
            out.push_str(lookup(vars, &after[..len])?);
            rest = &after[len..];
        } else {
            return Err(Error::Template(format!(
                "invalid placeholder at {}",
                position(text, offset)
            )));
        }
    }
    out.push_str(rest);
    Ok(out)
}

pub fn render_template_file(path: &Path, vars: &BTreeMap<String, String>) -> Result<String> {
    let text = std::fs::read_to_string(path)?;
    render_template(&text, vars).map_err(|e| match e {
        Error::Template(msg) => Error::Template(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Write `content` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
