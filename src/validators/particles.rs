//! XSD Particle Schema Components
//!
//! This module implements the occurrence algebra and the particle sum type.
//! Particles are the nodes of a content model: element declarations, model
//! groups, references to named groups, and element wildcards.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cParticles

use serde::{Deserialize, Serialize};
use std::fmt;

use super::elements::ElementDecl;
use super::groups::ModelGroup;
use super::wildcards::AnyElement;
use crate::namespaces::QName;

/// A count of occurrences: a non-negative integer or `unbounded`.
///
/// Arithmetic saturates at `unbounded`, with `unbounded * 0 = 0`. Every finite
/// value orders below `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "OccursRepr", into = "OccursRepr")]
pub enum Occurs {
    /// A finite count
    Count(u64),
    /// No upper bound
    Unbounded,
}

impl Occurs {
    /// Zero occurrences
    pub const ZERO: Occurs = Occurs::Count(0);
    /// One occurrence
    pub const ONE: Occurs = Occurs::Count(1);

    /// Saturating addition
    pub fn add(self, other: Occurs) -> Occurs {
        match (self, other) {
            (Occurs::Count(a), Occurs::Count(b)) => a.checked_add(b).map_or(Occurs::Unbounded, Occurs::Count),
            _ => Occurs::Unbounded,
        }
    }

    /// Saturating multiplication; zero absorbs `unbounded`
    pub fn mul(self, other: Occurs) -> Occurs {
        match (self, other) {
            (Occurs::Count(0), _) | (_, Occurs::Count(0)) => Occurs::ZERO,
            (Occurs::Count(a), Occurs::Count(b)) => a.checked_mul(b).map_or(Occurs::Unbounded, Occurs::Count),
            _ => Occurs::Unbounded,
        }
    }

    /// Check for zero
    pub fn is_zero(&self) -> bool {
        *self == Occurs::ZERO
    }

    /// Check for one
    pub fn is_one(&self) -> bool {
        *self == Occurs::ONE
    }

    /// Check for unbounded
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Occurs::Unbounded)
    }

    /// The finite count, if any
    pub fn count(&self) -> Option<u64> {
        match self {
            Occurs::Count(n) => Some(*n),
            Occurs::Unbounded => None,
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Occurs::ONE
    }
}

impl From<u64> for Occurs {
    fn from(n: u64) -> Self {
        Occurs::Count(n)
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occurs::Count(n) => write!(f, "{}", n),
            Occurs::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Interchange form of [`Occurs`]: a number or the string `"unbounded"`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum OccursRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<OccursRepr> for Occurs {
    type Error = String;

    fn try_from(repr: OccursRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            OccursRepr::Number(n) => Ok(Occurs::Count(n)),
            OccursRepr::Text(s) if s.trim() == "unbounded" => Ok(Occurs::Unbounded),
            OccursRepr::Text(s) => s
                .trim()
                .parse::<u64>()
                .map(Occurs::Count)
                .map_err(|_| format!("invalid occurrence value '{}'", s)),
        }
    }
}

impl From<Occurs> for OccursRepr {
    fn from(occurs: Occurs) -> Self {
        match occurs {
            Occurs::Count(n) => OccursRepr::Number(n),
            Occurs::Unbounded => OccursRepr::Text("unbounded".to_string()),
        }
    }
}

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    /// Minimum number of occurrences (default 1)
    #[serde(rename = "min_occurs", default = "one")]
    pub min: u64,
    /// Maximum number of occurrences (default 1)
    #[serde(rename = "max_occurs", default)]
    pub max: Occurs,
}

fn one() -> u64 {
    1
}

impl Occurrence {
    /// Create new occurrence bounds
    pub fn new(min: u64, max: Occurs) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self::new(1, Occurs::ONE)
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self::new(0, Occurs::ONE)
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self::new(0, Occurs::Unbounded)
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self::new(1, Occurs::Unbounded)
    }

    /// Empty (0, 0)
    pub fn empty() -> Self {
        Self::new(0, Occurs::ZERO)
    }

    /// minOccurs as an [`Occurs`]
    pub fn min_occurs(&self) -> Occurs {
        Occurs::Count(self.min)
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle is empty (maxOccurs == 0)
    pub fn is_empty(&self) -> bool {
        self.max.is_zero()
    }

    /// Check if particle has maxOccurs == 1
    pub fn is_single(&self) -> bool {
        self.max.is_one()
    }

    /// Check if particle can have multiple occurrences
    pub fn is_multiple(&self) -> bool {
        self.max > Occurs::ONE
    }

    /// Check for the default (1, 1) bounds
    pub fn is_once(&self) -> bool {
        self.min == 1 && self.max.is_one()
    }

    /// Structural check: `maxOccurs >= 1` unless both are zero, and
    /// `maxOccurs >= minOccurs` when bounded.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.max.is_zero() {
            return if self.min == 0 {
                Ok(())
            } else {
                Err(format!("maxOccurs is 0 but minOccurs is {}", self.min))
            };
        }
        if self.max < self.min_occurs() {
            return Err(format!(
                "maxOccurs ({}) must be >= minOccurs ({})",
                self.max, self.min
            ));
        }
        Ok(())
    }

    /// Check if this range lies within `other`: min not lower, max not higher
    pub fn has_occurs_restriction(&self, other: &Occurrence) -> bool {
        if self.min < other.min {
            return false;
        }
        if self.is_empty() {
            return true;
        }
        self.max <= other.max
    }

    /// Multiply both bounds by a factor range
    pub fn scale(&self, factor: &Occurrence) -> Occurrence {
        Occurrence {
            min: Occurs::Count(self.min)
                .mul(Occurs::Count(factor.min))
                .count()
                .unwrap_or(u64::MAX),
            max: self.max.mul(factor.max),
        }
    }
}

impl Default for Occurrence {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.min, self.max)
    }
}

/// Reference to a named model group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    /// Referenced group name
    #[serde(rename = "ref")]
    pub name: QName,
    /// Occurrence of the reference; overrides the group's own
    #[serde(flatten)]
    pub occurs: Occurrence,
}

impl GroupRef {
    /// Reference a named group once
    pub fn new(name: QName) -> Self {
        Self {
            name,
            occurs: Occurrence::once(),
        }
    }
}

/// A content-model node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "particle", rename_all = "snake_case")]
pub enum Particle {
    /// Element declaration or element reference
    Element(ElementDecl),
    /// Sequence, choice or all
    Group(ModelGroup),
    /// Reference to a named group
    GroupRef(GroupRef),
    /// Element wildcard
    Any(AnyElement),
}

impl Particle {
    /// Occurrence bounds of this particle
    pub fn occurs(&self) -> Occurrence {
        match self {
            Particle::Element(e) => e.occurs,
            Particle::Group(g) => g.occurs,
            Particle::GroupRef(r) => r.occurs,
            Particle::Any(a) => a.occurs,
        }
    }

    /// Short description used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            Particle::Element(e) => format!("element '{}'", e.name),
            Particle::Group(g) => format!("{} group", g.kind),
            Particle::GroupRef(r) => format!("group reference '{}'", r.name),
            Particle::Any(_) => "wildcard".to_string(),
        }
    }
}

impl From<ElementDecl> for Particle {
    fn from(decl: ElementDecl) -> Self {
        Particle::Element(decl)
    }
}

impl From<ModelGroup> for Particle {
    fn from(group: ModelGroup) -> Self {
        Particle::Group(group)
    }
}

impl From<AnyElement> for Particle {
    fn from(any: AnyElement) -> Self {
        Particle::Any(any)
    }
}

impl From<GroupRef> for Particle {
    fn from(group_ref: GroupRef) -> Self {
        Particle::GroupRef(group_ref)
    }
}
