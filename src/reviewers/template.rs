//! Team name templates.
//!
//! Team names in `REVIEWERS.yml` may embed `{{ team_name }}`, which is
//! replaced with the configured team prefix when a rule is evaluated.

use serde::Deserialize;
use std::fmt;

use crate::error::{OrgError, Result};

const PLACEHOLDER: &str = "team_name";

/// Evaluation-time values for team templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamContext {
    /// Replaces `{{ team_name }}`.
    pub prefix: Option<String>,
}

impl TeamContext {
    /// Context with a team prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    TeamName,
}

/// A team name that may reference the team prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct TeamTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl TeamTemplate {
    /// Parse a template, rejecting unknown or unterminated placeholders.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut rest = raw.as_str();

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| OrgError::InvalidTemplate(raw.clone()))?;
            if after[..end].trim() != PLACEHOLDER {
                return Err(OrgError::InvalidTemplate(raw.clone()));
            }
            segments.push(Segment::TeamName);
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        if segments.is_empty() {
            return Err(OrgError::InvalidTemplate(raw));
        }

        Ok(Self { raw, segments })
    }

    /// Whether the template references the team prefix.
    pub fn is_templated(&self) -> bool {
        self.segments.contains(&Segment::TeamName)
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substitute the prefix and normalise the result into a team slug.
    pub fn resolve(&self, ctx: &TeamContext) -> Result<String> {
        let mut name = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => name.push_str(text),
                Segment::TeamName => {
                    let prefix = ctx.prefix.as_deref().filter(|p| !p.trim().is_empty());
                    let prefix = prefix.ok_or_else(|| {
                        OrgError::InvalidConfig(format!(
                            "team '{}' uses {{{{ team_name }}}} but no team name is configured",
                            self.raw
                        ))
                    })?;
                    name.push_str(prefix);
                }
            }
        }
        Ok(slugify(&name))
    }
}

impl TryFrom<String> for TeamTemplate {
    type Error = OrgError;

    fn try_from(value: String) -> Result<Self> {
        TeamTemplate::parse(value)
    }
}

impl fmt::Display for TeamTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Turn a team display name into the slug GitHub assigns it.
pub fn slugify(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

/// Resolve a list of templates.
pub fn resolve_all(templates: &[TeamTemplate], ctx: &TeamContext) -> Result<Vec<String>> {
    templates.iter().map(|t| t.resolve(ctx)).collect()
}
