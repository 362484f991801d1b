//! Name/namespace selectors inside a permission claim.
//!
//! Two shapes live here: [`ResourceSelector`] is the raw form carried by
//! Export and Binding objects, where the wildcard may be spelled `""` or
//! `"*"`. [`ClaimSelector`] is the normalized form the matcher works on.
//! [`Pattern::from_raw`] is the only place the wildcard spelling is
//! interpreted; [`crate::loader`] applies it when claims are loaded.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// The canonical wildcard token used when rendering a [`Pattern::Any`].
pub const WILDCARD: &str = "*";

/// A single field pattern: either any value or one exact value.
///
/// Build it with [`Pattern::from_raw`] or [`Pattern::exact`]. `Exact` never
/// holds `""` or `"*"`; those spellings are `Any`, and serde reads them
/// back that way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pattern {
    Any,
    Exact(String),
}

impl Pattern {
    /// Normalize a raw field value. Both `""` and `"*"` mean "any".
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() || raw == WILDCARD {
            Pattern::Any
        } else {
            Pattern::Exact(raw.to_string())
        }
    }

    /// A pattern for one value, normalized like [`Pattern::from_raw`]:
    /// `exact("*")` is [`Pattern::Any`].
    pub fn exact(value: impl Into<String>) -> Self {
        Self::from_raw(&value.into())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Pattern::Any)
    }

    /// Does this pattern accept `value`?
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Exact(expected) => expected == value,
        }
    }

    /// Does this pattern accept an absent value (a cluster-scoped namespace)?
    pub fn accepts_absent(&self) -> bool {
        self.is_any()
    }

    /// The narrower of two patterns, or `None` when they accept disjoint sets.
    pub fn intersect(&self, other: &Pattern) -> Option<Pattern> {
        match (self, other) {
            (Pattern::Any, p) | (p, Pattern::Any) => Some(p.clone()),
            (Pattern::Exact(a), Pattern::Exact(b)) if a == b => Some(self.clone()),
            _ => None,
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Pattern::Any => write!(f, "{WILDCARD}"),
            Pattern::Exact(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Pattern::from_raw(&raw))
    }
}

/// A normalized name/namespace rule. Both fields must accept for a match.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClaimSelector {
    #[schema(value_type = String)]
    pub name: Pattern,
    #[schema(value_type = String)]
    pub namespace: Pattern,
}

impl ClaimSelector {
    pub fn new(name: Pattern, namespace: Pattern) -> Self {
        Self { name, namespace }
    }

    /// A selector accepting every name in every namespace.
    pub fn any() -> Self {
        Self::new(Pattern::Any, Pattern::Any)
    }

    pub fn is_universal(&self) -> bool {
        self.name.is_any() && self.namespace.is_any()
    }

    /// AND of the name and namespace checks. A missing namespace only
    /// satisfies a wildcard namespace pattern.
    pub fn accepts(&self, name: &str, namespace: Option<&str>) -> bool {
        let namespace_ok = match namespace {
            Some(ns) => self.namespace.accepts(ns),
            None => self.namespace.accepts_absent(),
        };
        namespace_ok && self.name.accepts(name)
    }

    /// Field-wise intersection, or `None` if nothing can satisfy both.
    pub fn intersect(&self, other: &ClaimSelector) -> Option<ClaimSelector> {
        Some(ClaimSelector {
            name: self.name.intersect(&other.name)?,
            namespace: self.namespace.intersect(&other.namespace)?,
        })
    }
}

impl Display for ClaimSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The raw selector carried on Export and Binding objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct ResourceSelector {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl ResourceSelector {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}
