//! User-configured label rewriting.
//!
//! Custom data sources carry an ordered list of regex -> replacement rules
//! that are applied to every name entering their sink. Only the first
//! matching rule applies; replacements use the regex crate's `$1` capture
//! syntax.

use std::borrow::Cow;

use regex::Regex;

use crate::domain::errors::ConfigError;

#[derive(Debug, Default)]
pub struct NameMunger {
    rules: Vec<(Regex, String)>,
}

impl NameMunger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rewrite rule. Rules are tried in insertion order.
    ///
    /// # Errors
    /// `ConfigError::InvalidRegex` if the pattern does not compile.
    pub fn add_rule(&mut self, pattern: &str, replacement: &str) -> Result<(), ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        self.rules.push((regex, replacement.to_string()));
        Ok(())
    }

    /// Rewrite `name` through the first matching rule.
    ///
    /// Names starting with `[` are synthetic labels (`[Other]`, `[None]`,
    /// `[Unmapped]`, ...) and pass through untouched, as does any name no
    /// rule matches.
    #[must_use]
    pub fn munge<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if name.starts_with('[') {
            return Cow::Borrowed(name);
        }

        for (regex, replacement) in &self.rules {
            if let Some(captures) = regex.captures(name) {
                let mut rewritten = String::new();
                captures.expand(replacement, &mut rewritten);
                return Cow::Owned(rewritten);
            }
        }

        Cow::Borrowed(name)
    }
}
