//! Facet engine
//!
//! Checks the facets of one simple-type restriction against its base:
//! applicability, value space, mutual consistency and inheritance. The same
//! machinery computes the facets in effect on any simple type (the builtin
//! implied facets plus every restriction step down the chain) and validates
//! lexical values against them, which is how `default`/`fixed` values and
//! enumerations are checked.
//!
//! Reference: https://www.w3.org/TR/xmlschema-2/#rf-facets

use std::cmp::Ordering;

use crate::error::{schema_error, ErrorKind, SchemaError};

use super::builtins::BuiltinType;
use super::facets::{Facet, FacetEntry, FacetKind, FacetValue, WhiteSpace};
use super::globals::{Context, Schema};
use super::helpers::binary_length;
use super::patterns::{compile_pattern, compile_pattern_set, translate_pattern};
use super::simple_types::SimpleDerivation;
use super::types::{TypeHandle, Variety};
use super::values::{decimal_digits, parse_value, Value};

/// Nesting bound for value validation through list items and union members
const MAX_VALUE_DEPTH: usize = 64;

// =============================================================================
// Effective facets
// =============================================================================

/// A length or digits facet value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count {
    /// Value
    pub value: u64,
    /// `fixed="true"`
    pub fixed: bool,
}

/// A range facet value
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    /// Lexical form
    pub lexical: String,
    /// Typed value, when the primitive is ordered and the lexical is valid
    pub value: Option<Value>,
    /// Inclusive or exclusive
    pub inclusive: bool,
    /// `fixed="true"`
    pub fixed: bool,
}

impl Bound {
    fn kind(&self, lower: bool) -> FacetKind {
        match (lower, self.inclusive) {
            (true, true) => FacetKind::MinInclusive,
            (true, false) => FacetKind::MinExclusive,
            (false, true) => FacetKind::MaxInclusive,
            (false, false) => FacetKind::MaxExclusive,
        }
    }

    fn compare(&self, other: &Bound) -> Option<Ordering> {
        match (&self.value, &other.value) {
            (Some(a), Some(b)) => a.partial_compare(b),
            _ => None,
        }
    }
}

/// The facets in effect on a simple type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetSet {
    /// `length`
    pub length: Option<Count>,
    /// `minLength`
    pub min_length: Option<Count>,
    /// `maxLength`
    pub max_length: Option<Count>,
    /// `totalDigits`
    pub total_digits: Option<Count>,
    /// `fractionDigits`
    pub fraction_digits: Option<Count>,
    /// `minInclusive` or `minExclusive`
    pub min: Option<Bound>,
    /// `maxInclusive` or `maxExclusive`
    pub max: Option<Bound>,
    /// `whiteSpace` and its fixed flag
    pub white_space: Option<(WhiteSpace, bool)>,
    /// Patterns, one group per derivation step (ORed within a step, ANDed
    /// across steps)
    pub patterns: Vec<Vec<String>>,
    /// Enumeration of the nearest step that has one
    pub enumeration: Option<Vec<String>>,
}

impl FacetSet {
    /// Overlay the facets of one restriction step
    fn apply(&mut self, facets: &[Facet]) {
        let mut patterns = Vec::new();
        let mut enumeration = Vec::new();
        for facet in facets {
            let count = facet.count().map(|value| Count {
                value,
                fixed: facet.fixed,
            });
            let bound = |inclusive| Bound {
                lexical: facet.value.trim().to_string(),
                value: match &facet.typed {
                    FacetValue::Ordered(v) => Some(v.clone()),
                    _ => None,
                },
                inclusive,
                fixed: facet.fixed,
            };
            match facet.kind {
                FacetKind::Length => self.length = count,
                FacetKind::MinLength => self.min_length = count,
                FacetKind::MaxLength => self.max_length = count,
                FacetKind::TotalDigits => self.total_digits = count,
                FacetKind::FractionDigits => self.fraction_digits = count,
                FacetKind::MinInclusive => self.min = Some(bound(true)),
                FacetKind::MinExclusive => self.min = Some(bound(false)),
                FacetKind::MaxInclusive => self.max = Some(bound(true)),
                FacetKind::MaxExclusive => self.max = Some(bound(false)),
                FacetKind::WhiteSpace => {
                    if let FacetValue::WhiteSpace(ws) = facet.typed {
                        self.white_space = Some((ws, facet.fixed));
                    }
                }
                FacetKind::Pattern => patterns.push(facet.value.clone()),
                FacetKind::Enumeration => enumeration.push(match &facet.typed {
                    FacetValue::Lexical(normalized) => normalized.clone(),
                    _ => facet.value.clone(),
                }),
            }
        }
        if !patterns.is_empty() {
            self.patterns.push(patterns);
        }
        if !enumeration.is_empty() {
            self.enumeration = Some(enumeration);
        }
    }

    /// White space mode in effect; preserve when unconstrained
    pub fn white_space_mode(&self) -> WhiteSpace {
        self.white_space.map(|(ws, _)| ws).unwrap_or(WhiteSpace::Preserve)
    }
}

/// Compute the facets in effect on a simple type: the implied facets of its
/// builtin ancestors, then every restriction step from the root down
pub fn effective_facets(schema: &Schema, handle: TypeHandle<'_>) -> FacetSet {
    let mut set = FacetSet::default();
    let ancestors = handle.ancestors(schema);
    let variety = handle.variety(schema);

    if let Some(builtin) = handle.builtin_ancestor(schema) {
        if !builtin.is_any_simple_type() {
            set.white_space = Some((builtin.white_space, false));
        }
        let primitive = builtin.primitive_type();
        let implied: Vec<Facet> = builtin
            .implied_facets_chain()
            .into_iter()
            .filter_map(|(kind, value)| bind(Facet::new(kind, value), primitive, WhiteSpace::Collapse).ok())
            .collect();
        set.apply(&implied);
    }
    if variety == Some(Variety::List) {
        set.white_space = Some((WhiteSpace::Collapse, true));
    }

    for step in ancestors.iter().rev() {
        let TypeHandle::Simple(st) = step else {
            continue;
        };
        let SimpleDerivation::Restriction { facets, .. } = &st.derivation else {
            continue;
        };
        let Some(base) = step.base(schema) else {
            continue;
        };
        let primitive = base.primitive(schema);
        let white_space = set.white_space_mode();
        let bound: Vec<Facet> = facets
            .iter()
            .filter_map(|entry| entry.to_facet().ok())
            .filter_map(|facet| bind(facet, primitive, white_space).ok())
            .collect();
        set.apply(&bound);
    }
    set
}

// =============================================================================
// Materialization
// =============================================================================

/// Bind the typed value of a facet against the primitive of its base
fn bind(mut facet: Facet, primitive: Option<&'static BuiltinType>, white_space: WhiteSpace) -> Result<Facet, SchemaError> {
    let value_error = |reason: String| {
        schema_error(
            ErrorKind::FacetValueSpace,
            format!("invalid {} value '{}': {}", facet.kind, facet.value, reason),
        )
    };
    facet.typed = match facet.kind {
        FacetKind::Length
        | FacetKind::MinLength
        | FacetKind::MaxLength
        | FacetKind::TotalDigits
        | FacetKind::FractionDigits => {
            let n: u64 = facet
                .value
                .trim()
                .parse()
                .map_err(|_| value_error("not a non-negative integer".to_string()))?;
            if facet.kind == FacetKind::TotalDigits && n == 0 {
                return Err(value_error("must be a positive integer".to_string()));
            }
            FacetValue::Count(n)
        }
        FacetKind::WhiteSpace => {
            FacetValue::WhiteSpace(WhiteSpace::from_str(&facet.value).map_err(|e| value_error(e.to_string()))?)
        }
        FacetKind::Pattern => FacetValue::Pattern(translate_pattern(&facet.value)?),
        FacetKind::Enumeration => FacetValue::Lexical(white_space.normalize(&facet.value)),
        FacetKind::MinInclusive | FacetKind::MinExclusive | FacetKind::MaxInclusive | FacetKind::MaxExclusive => {
            match primitive {
                Some(p) => match parse_value(p.name, &white_space.normalize(&facet.value)) {
                    Ok(Some(v)) => FacetValue::Ordered(v),
                    Ok(None) => FacetValue::Lexical(facet.value.clone()),
                    Err(reason) => return Err(value_error(reason)),
                },
                None => FacetValue::Lexical(facet.value.clone()),
            }
        }
    };
    Ok(facet)
}

/// Convert a raw facet entry into a typed facet against `base`.
///
/// Deferred facets are bound first; conversion failures are facet errors.
pub fn materialize(schema: &Schema, base: TypeHandle<'_>, entry: &FacetEntry) -> Result<Facet, SchemaError> {
    let facet = entry.to_facet()?;
    let white_space = effective_facets(schema, base).white_space_mode();
    if facet.kind.is_range() {
        if let Some(builtin) = base.builtin_ancestor(schema) {
            builtin.validate(&facet.value).map_err(|e| {
                schema_error(
                    ErrorKind::FacetValueSpace,
                    format!("invalid {} value '{}': {}", facet.kind, facet.value, e),
                )
            })?;
        }
    }
    bind(facet, base.primitive(schema), white_space)
}

// =============================================================================
// Value validation
// =============================================================================

/// Normalize a lexical value per the white space facet of a type
pub fn normalize_value(schema: &Schema, handle: TypeHandle<'_>, lexical: &str) -> String {
    match handle.content_simple_type(schema) {
        Some(simple) => effective_facets(schema, simple).white_space_mode().normalize(lexical),
        None => lexical.to_string(),
    }
}

/// Validate a lexical value against a simple type, or a complex type with
/// simple content. Complex types with other content accept any value.
pub fn validate_value(schema: &Schema, handle: TypeHandle<'_>, lexical: &str) -> Result<(), String> {
    validate_at_depth(schema, handle, lexical, false, 0)
}

/// Validate against `handle` without its enumeration
fn validate_without_enumeration(schema: &Schema, handle: TypeHandle<'_>, lexical: &str) -> Result<(), String> {
    validate_at_depth(schema, handle, lexical, true, 0)
}

fn validate_at_depth(
    schema: &Schema,
    handle: TypeHandle<'_>,
    lexical: &str,
    skip_enumeration: bool,
    depth: usize,
) -> Result<(), String> {
    if depth > MAX_VALUE_DEPTH {
        return Err(format!("type nesting of {} is too deep", handle.display_name()));
    }
    let Some(simple) = handle.content_simple_type(schema) else {
        return Ok(());
    };
    let Some(variety) = simple.variety(schema) else {
        return Ok(());
    };
    let facets = effective_facets(schema, simple);
    let value = facets.white_space_mode().normalize(lexical);

    let length = match variety {
        Variety::Atomic => {
            let builtin = simple
                .builtin_ancestor(schema)
                .ok_or_else(|| format!("{} has no builtin ancestor", simple.display_name()))?;
            builtin.validate(&value).map_err(|e| e.to_string())?;
            check_range(&facets, builtin, &value)?;
            check_digits(&facets, builtin, &value)?;
            binary_length(builtin.primitive, &value).unwrap_or_else(|| value.chars().count())
        }
        Variety::List => {
            let item = simple
                .item_type(schema)
                .ok_or_else(|| format!("item type of {} not found", simple.display_name()))?;
            let items: Vec<&str> = value.split(' ').filter(|s| !s.is_empty()).collect();
            for token in &items {
                validate_at_depth(schema, item, token, false, depth + 1)?;
            }
            items.len()
        }
        Variety::Union => {
            let members = simple.member_types(schema);
            let accepted = members
                .iter()
                .any(|m| validate_at_depth(schema, *m, &value, false, depth + 1).is_ok());
            if !accepted {
                return Err(format!("'{}' is not valid for any member of {}", value, simple.display_name()));
            }
            value.chars().count()
        }
    };

    check_length(&facets, length, &value)?;

    for group in &facets.patterns {
        match compile_pattern_set(group.iter().map(String::as_str)) {
            Ok(re) if !re.is_match(&value) => {
                return Err(format!("'{}' does not match pattern '{}'", value, group.join("|")));
            }
            Ok(_) => {}
            Err(e) => tracing::trace!(error = %e, "pattern of an ancestor does not compile"),
        }
    }

    if !skip_enumeration {
        if let Some(enumeration) = &facets.enumeration {
            if !enumeration.iter().any(|e| e == &value) {
                return Err(format!("'{}' is not in the enumeration of {}", value, simple.display_name()));
            }
        }
    }
    Ok(())
}

fn check_range(facets: &FacetSet, builtin: &BuiltinType, value: &str) -> Result<(), String> {
    if facets.min.is_none() && facets.max.is_none() {
        return Ok(());
    }
    let Ok(Some(typed)) = parse_value(builtin.primitive, value) else {
        return Ok(());
    };
    if let Some(min) = facets.min.as_ref().and_then(|b| b.value.as_ref().map(|v| (b, v))) {
        match typed.partial_compare(min.1) {
            Some(Ordering::Less) => return Err(format!("'{}' is below {} {}", value, min.0.kind(true), min.0.lexical)),
            Some(Ordering::Equal) if !min.0.inclusive => {
                return Err(format!("'{}' is not above minExclusive {}", value, min.0.lexical))
            }
            _ => {}
        }
    }
    if let Some(max) = facets.max.as_ref().and_then(|b| b.value.as_ref().map(|v| (b, v))) {
        match typed.partial_compare(max.1) {
            Some(Ordering::Greater) => {
                return Err(format!("'{}' is above {} {}", value, max.0.kind(false), max.0.lexical))
            }
            Some(Ordering::Equal) if !max.0.inclusive => {
                return Err(format!("'{}' is not below maxExclusive {}", value, max.0.lexical))
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_digits(facets: &FacetSet, builtin: &BuiltinType, value: &str) -> Result<(), String> {
    if builtin.primitive != "decimal" {
        return Ok(());
    }
    let (total, fraction) = decimal_digits(value);
    if let Some(limit) = facets.total_digits {
        if total as u64 > limit.value {
            return Err(format!("'{}' has more than {} total digits", value, limit.value));
        }
    }
    if let Some(limit) = facets.fraction_digits {
        if fraction as u64 > limit.value {
            return Err(format!("'{}' has more than {} fraction digits", value, limit.value));
        }
    }
    Ok(())
}

fn check_length(facets: &FacetSet, length: usize, value: &str) -> Result<(), String> {
    let length = length as u64;
    if let Some(exact) = facets.length {
        if length != exact.value {
            return Err(format!("'{}' has length {}, expected {}", value, length, exact.value));
        }
    }
    if let Some(min) = facets.min_length {
        if length < min.value {
            return Err(format!("'{}' is shorter than minLength {}", value, min.value));
        }
    }
    if let Some(max) = facets.max_length {
        if length > max.value {
            return Err(format!("'{}' is longer than maxLength {}", value, max.value));
        }
    }
    Ok(())
}

// =============================================================================
// Restriction checks
// =============================================================================

fn applies(cx: &Context<'_>, base: TypeHandle<'_>, variety: Variety, facet: &Facet) -> Result<(), SchemaError> {
    let admitted = match variety {
        Variety::Union => matches!(facet.kind, FacetKind::Pattern | FacetKind::Enumeration | FacetKind::WhiteSpace),
        Variety::List => {
            facet.kind.is_length()
                || matches!(facet.kind, FacetKind::Pattern | FacetKind::Enumeration | FacetKind::WhiteSpace)
        }
        Variety::Atomic => match base.builtin_ancestor(cx.schema) {
            Some(builtin) => {
                if facet.kind == FacetKind::FractionDigits
                    && builtin.is_integer_derived()
                    && facet.count() != Some(0)
                {
                    return Err(schema_error(
                        ErrorKind::FacetApplicability,
                        format!(
                            "fractionDigits must be 0 on integer-derived base {}",
                            base.display_name()
                        ),
                    ));
                }
                builtin.admits_facet(facet.kind)
            }
            None => true,
        },
    };
    if admitted {
        Ok(())
    } else {
        Err(schema_error(
            ErrorKind::FacetApplicability,
            format!("facet {} is not applicable to {} base {}", facet.kind, variety, base.display_name()),
        ))
    }
}

/// Check the facets of a restriction of `base`
pub fn check_restriction_facets(
    cx: &Context<'_>,
    base: TypeHandle<'_>,
    entries: &[FacetEntry],
    errors: &mut Vec<SchemaError>,
) {
    let Some(variety) = base.variety(cx.schema) else {
        return;
    };

    // applicability and value space
    let mut facets = Vec::new();
    for entry in entries {
        let facet = match entry.to_facet() {
            Ok(facet) => facet,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        if let Err(e) = applies(cx, base, variety, &facet) {
            errors.push(e);
            continue;
        }
        if facet.kind == FacetKind::Pattern {
            if let Err(e) = compile_pattern(&facet.value) {
                errors.push(e);
                continue;
            }
        }
        match materialize(cx.schema, base, entry) {
            Ok(facet) => facets.push(facet),
            Err(e) => errors.push(e),
        }
    }

    for kind in FacetKind::ALL {
        if !kind.is_repeatable() && facets.iter().filter(|f| f.kind == kind).count() > 1 {
            errors.push(schema_error(
                ErrorKind::FacetConsistency,
                format!("facet {} is specified more than once", kind),
            ));
        }
    }

    for facet in facets.iter().filter(|f| f.kind == FacetKind::Enumeration) {
        if let Err(reason) = validate_without_enumeration(cx.schema, base, &facet.value) {
            errors.push(schema_error(
                ErrorKind::FacetValueSpace,
                format!("enumeration value '{}' is not valid for base {}: {}", facet.value, base.display_name(), reason),
            ));
        }
    }

    check_consistency(&facets, variety, errors);

    let base_set = effective_facets(cx.schema, base);
    let mut derived = FacetSet::default();
    derived.apply(&facets);
    check_inheritance(&derived, &base_set, errors);
}

fn present(facets: &[Facet], kind: FacetKind) -> bool {
    facets.iter().any(|f| f.kind == kind)
}

fn consistency_error(message: String) -> SchemaError {
    schema_error(ErrorKind::FacetConsistency, message)
}

fn check_consistency(facets: &[Facet], variety: Variety, errors: &mut Vec<SchemaError>) {
    use FacetKind::*;

    if present(facets, MinInclusive) && present(facets, MinExclusive) {
        errors.push(consistency_error("minInclusive and minExclusive cannot both be specified".into()));
    }
    if present(facets, MaxInclusive) && present(facets, MaxExclusive) {
        errors.push(consistency_error("maxInclusive and maxExclusive cannot both be specified".into()));
    }
    if present(facets, Length) {
        if present(facets, MaxLength) || (present(facets, MinLength) && variety != Variety::List) {
            errors.push(consistency_error("length cannot be combined with minLength or maxLength".into()));
        }
    }

    let mut set = FacetSet::default();
    set.apply(facets);

    if let (Some(min), Some(max)) = (&set.min, &set.max) {
        match min.compare(max) {
            Some(Ordering::Greater) => errors.push(consistency_error(format!(
                "{} must be <= {} ({} > {})",
                min.kind(true),
                max.kind(false),
                min.lexical,
                max.lexical
            ))),
            Some(Ordering::Equal) if !min.inclusive || !max.inclusive => errors.push(consistency_error(format!(
                "{} must be < {} ({} = {})",
                min.kind(true),
                max.kind(false),
                min.lexical,
                max.lexical
            ))),
            None => tracing::trace!(min = %min.lexical, max = %max.lexical, "range bounds not comparable"),
            _ => {}
        }
    }
    if let (Some(min), Some(max)) = (set.min_length, set.max_length) {
        if min.value > max.value {
            errors.push(consistency_error(format!(
                "minLength must be <= maxLength ({} > {})",
                min.value, max.value
            )));
        }
    }
    if let (Some(length), Some(min)) = (set.length, set.min_length) {
        if min.value > length.value {
            errors.push(consistency_error(format!(
                "minLength must be <= length ({} > {})",
                min.value, length.value
            )));
        }
    }
    if let (Some(fraction), Some(total)) = (set.fraction_digits, set.total_digits) {
        if fraction.value > total.value {
            errors.push(consistency_error(format!(
                "fractionDigits must be <= totalDigits ({} > {})",
                fraction.value, total.value
            )));
        }
    }
}

fn inheritance_error(message: String) -> SchemaError {
    schema_error(ErrorKind::FacetInheritance, message)
}

fn check_count(
    name: &str,
    derived: Option<Count>,
    base: Option<Count>,
    accept: impl Fn(u64, u64) -> bool,
    relation: &str,
    errors: &mut Vec<SchemaError>,
) {
    let (Some(derived), Some(base)) = (derived, base) else {
        return;
    };
    if base.fixed && derived.value != base.value {
        errors.push(inheritance_error(format!(
            "{} is fixed to {} in the base type, got {}",
            name, base.value, derived.value
        )));
    } else if !accept(derived.value, base.value) {
        errors.push(inheritance_error(format!(
            "{} {} must be {} the base value {}",
            name, derived.value, relation, base.value
        )));
    }
}

fn check_inheritance(derived: &FacetSet, base: &FacetSet, errors: &mut Vec<SchemaError>) {
    // length family
    check_count("length", derived.length, base.length, |d, b| d == b, "equal to", errors);
    check_count("minLength", derived.min_length, base.length, |d, b| d == b, "equal to length", errors);
    check_count("maxLength", derived.max_length, base.length, |d, b| d == b, "equal to length", errors);
    check_count("minLength", derived.min_length, base.min_length, |d, b| d >= b, ">=", errors);
    check_count("minLength", derived.min_length, base.max_length, |d, b| d <= b, "<= maxLength", errors);
    check_count("maxLength", derived.max_length, base.max_length, |d, b| d <= b, "<=", errors);
    check_count("maxLength", derived.max_length, base.min_length, |d, b| d >= b, ">= minLength", errors);
    check_count("length", derived.length, base.min_length, |d, b| d >= b, ">= minLength", errors);
    check_count("length", derived.length, base.max_length, |d, b| d <= b, "<= maxLength", errors);

    // digits
    check_count("totalDigits", derived.total_digits, base.total_digits, |d, b| d <= b, "<=", errors);
    check_count("fractionDigits", derived.fraction_digits, base.fraction_digits, |d, b| d <= b, "<=", errors);
    check_count("fractionDigits", derived.fraction_digits, base.total_digits, |d, b| d <= b, "<= totalDigits", errors);

    // range
    if let Some(min) = &derived.min {
        if let Some(base_min) = &base.min {
            check_bound(min, base_min, true, errors);
        }
        if let Some(base_max) = &base.max {
            check_cross(min, base_max, true, errors);
        }
    }
    if let Some(max) = &derived.max {
        if let Some(base_max) = &base.max {
            check_bound(max, base_max, false, errors);
        }
        if let Some(base_min) = &base.min {
            check_cross(max, base_min, false, errors);
        }
    }

    // enumeration: lexical subset
    if let (Some(values), Some(base_values)) = (&derived.enumeration, &base.enumeration) {
        for value in values {
            if !base_values.contains(value) {
                errors.push(inheritance_error(format!(
                    "enumeration value '{}' is not in the base enumeration",
                    value
                )));
            }
        }
    }

    // whiteSpace may only tighten
    if let (Some((ws, _)), Some((base_ws, base_fixed))) = (derived.white_space, base.white_space) {
        if ws < base_ws {
            errors.push(inheritance_error(format!(
                "whiteSpace '{}' is looser than the base whiteSpace '{}'",
                ws, base_ws
            )));
        } else if base_fixed && ws != base_ws {
            errors.push(inheritance_error(format!(
                "whiteSpace is fixed to '{}' in the base type, got '{}'",
                base_ws, ws
            )));
        }
    }
}

/// A derived bound against the base bound of the same side
fn check_bound(derived: &Bound, base: &Bound, lower: bool, errors: &mut Vec<SchemaError>) {
    if base.fixed && (derived.inclusive != base.inclusive || derived.lexical != base.lexical) {
        errors.push(inheritance_error(format!(
            "{} is fixed to {} in the base type",
            base.kind(lower),
            base.lexical
        )));
        return;
    }
    let Some(ordering) = derived.compare(base) else {
        tracing::trace!(derived = %derived.lexical, base = %base.lexical, "facet values not comparable");
        return;
    };
    let relaxed = match (lower, ordering) {
        (true, Ordering::Less) | (false, Ordering::Greater) => true,
        (_, Ordering::Equal) => derived.inclusive && !base.inclusive,
        _ => false,
    };
    if relaxed {
        errors.push(inheritance_error(format!(
            "{} {} is looser than the base {} {}",
            derived.kind(lower),
            derived.lexical,
            base.kind(lower),
            base.lexical
        )));
    }
}

/// A derived bound against the base bound of the opposite side
fn check_cross(derived: &Bound, base: &Bound, lower: bool, errors: &mut Vec<SchemaError>) {
    let Some(ordering) = derived.compare(base) else {
        tracing::trace!(derived = %derived.lexical, base = %base.lexical, "facet values not comparable");
        return;
    };
    let outside = match (lower, ordering) {
        (true, Ordering::Greater) | (false, Ordering::Less) => true,
        (_, Ordering::Equal) => !derived.inclusive || !base.inclusive,
        _ => false,
    };
    if outside {
        errors.push(inheritance_error(format!(
            "{} {} is outside the base {} {}",
            derived.kind(lower),
            derived.lexical,
            base.kind(!lower),
            base.lexical
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::namespaces::QName;
    use crate::validators::builders::SchemaBuilder;

    fn facet(kind: FacetKind, value: &str) -> FacetEntry {
        Facet::new(kind, value).into()
    }

    fn check(schema: &Schema, base: &QName, entries: Vec<FacetEntry>) -> Vec<ErrorKind> {
        let limits = Limits::default();
        let cx = Context::new(schema, &limits);
        let mut errors = Vec::new();
        let base = schema.lookup_type(base).unwrap();
        check_restriction_facets(&cx, base, &entries, &mut errors);
        errors.into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_min_greater_than_max() {
        let schema = Schema::default();
        let limits = Limits::default();
        let cx = Context::new(&schema, &limits);
        let mut errors = Vec::new();
        let base = TypeHandle::builtin("decimal").unwrap();
        let entries = vec![facet(FacetKind::MinInclusive, "100"), facet(FacetKind::MaxInclusive, "50")];
        check_restriction_facets(&cx, base, &entries, &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::FacetConsistency);
        assert!(errors[0].message.contains("minInclusive must be <= maxInclusive"));
    }

    #[test]
    fn test_exclusive_bounds_must_leave_room() {
        let schema = Schema::default();
        let kinds = check(&schema, &QName::xsd("decimal"), vec![
            facet(FacetKind::MinExclusive, "5"),
            facet(FacetKind::MaxInclusive, "5"),
        ]);
        assert_eq!(kinds, [ErrorKind::FacetConsistency]);
        let kinds = check(&schema, &QName::xsd("decimal"), vec![
            facet(FacetKind::MinInclusive, "5"),
            facet(FacetKind::MaxInclusive, "5"),
        ]);
        assert!(kinds.is_empty());
    }

    #[test]
    fn test_implied_bounds_are_inherited() {
        let schema = Schema::default();
        assert_eq!(
            check(&schema, &QName::xsd("positiveInteger"), vec![facet(FacetKind::MinInclusive, "0")]),
            [ErrorKind::FacetInheritance]
        );
        assert_eq!(
            check(&schema, &QName::xsd("byte"), vec![facet(FacetKind::MaxInclusive, "200")]),
            [ErrorKind::FacetInheritance]
        );
        assert!(check(&schema, &QName::xsd("byte"), vec![facet(FacetKind::MaxInclusive, "100")]).is_empty());
    }

    #[test]
    fn test_inclusive_over_exclusive_is_relaxation() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("Below10", QName::xsd("decimal"), vec![Facet::new(FacetKind::MaxExclusive, "10")])
            .build();
        let base = QName::new("urn:x", "Below10");
        assert_eq!(
            check(&schema, &base, vec![facet(FacetKind::MaxInclusive, "10")]),
            [ErrorKind::FacetInheritance]
        );
        assert!(check(&schema, &base, vec![facet(FacetKind::MaxExclusive, "10")]).is_empty());
        assert!(check(&schema, &base, vec![facet(FacetKind::MaxInclusive, "9.99")]).is_empty());
        assert_eq!(
            check(&schema, &base, vec![facet(FacetKind::MinInclusive, "10")]),
            [ErrorKind::FacetInheritance]
        );
    }

    #[test]
    fn test_applicability() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_list("Ints", QName::xsd("int"))
            .simple_union("Either", vec![QName::xsd("int"), QName::xsd("date")])
            .build();
        assert_eq!(
            check(&schema, &QName::xsd("boolean"), vec![facet(FacetKind::Length, "1")]),
            [ErrorKind::FacetApplicability]
        );
        assert_eq!(
            check(&schema, &QName::xsd("string"), vec![facet(FacetKind::MaxInclusive, "z")]),
            [ErrorKind::FacetApplicability]
        );
        assert_eq!(
            check(&schema, &QName::xsd("int"), vec![facet(FacetKind::FractionDigits, "2")]),
            [ErrorKind::FacetApplicability]
        );
        assert!(check(&schema, &QName::xsd("int"), vec![facet(FacetKind::FractionDigits, "0")]).is_empty());
        assert_eq!(
            check(&schema, &QName::new("urn:x", "Ints"), vec![facet(FacetKind::MinInclusive, "1")]),
            [ErrorKind::FacetApplicability]
        );
        assert!(check(&schema, &QName::new("urn:x", "Ints"), vec![facet(FacetKind::MaxLength, "3")]).is_empty());
        assert_eq!(
            check(&schema, &QName::new("urn:x", "Either"), vec![facet(FacetKind::MaxLength, "3")]),
            [ErrorKind::FacetApplicability]
        );
    }

    #[test]
    fn test_value_space() {
        let schema = Schema::default();
        assert_eq!(
            check(&schema, &QName::xsd("date"), vec![facet(FacetKind::MinInclusive, "yesterday")]),
            [ErrorKind::FacetValueSpace]
        );
        assert_eq!(
            check(&schema, &QName::xsd("string"), vec![facet(FacetKind::MaxLength, "-1")]),
            [ErrorKind::FacetValueSpace]
        );
        assert_eq!(
            check(&schema, &QName::xsd("int"), vec![facet(FacetKind::Enumeration, "x")]),
            [ErrorKind::FacetValueSpace]
        );
        assert_eq!(
            check(&schema, &QName::xsd("string"), vec![facet(FacetKind::Pattern, "[a-")]),
            [ErrorKind::PatternSyntax]
        );
        assert_eq!(
            check(&schema, &QName::xsd("string"), vec![facet(FacetKind::WhiteSpace, "squash")]),
            [ErrorKind::FacetValueSpace]
        );
    }

    #[test]
    fn test_length_rules() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("Short", QName::xsd("string"), vec![Facet::new(FacetKind::MaxLength, "5")])
            .build();
        let base = QName::new("urn:x", "Short");
        assert_eq!(
            check(&schema, &base, vec![facet(FacetKind::MaxLength, "6")]),
            [ErrorKind::FacetInheritance]
        );
        assert_eq!(
            check(&schema, &base, vec![facet(FacetKind::MinLength, "6")]),
            [ErrorKind::FacetInheritance]
        );
        assert_eq!(
            check(&Schema::default(), &QName::xsd("string"), vec![
                facet(FacetKind::MinLength, "4"),
                facet(FacetKind::MaxLength, "3"),
            ]),
            [ErrorKind::FacetConsistency]
        );
        assert_eq!(
            check(&schema, &QName::xsd("string"), vec![facet(FacetKind::Length, "4"), facet(FacetKind::MaxLength, "5")]),
            [ErrorKind::FacetConsistency]
        );
    }

    #[test]
    fn test_fixed_and_white_space() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("Pinned", QName::xsd("string"), vec![Facet::new(FacetKind::MaxLength, "5").fixed()])
            .build();
        assert_eq!(
            check(&schema, &QName::new("urn:x", "Pinned"), vec![facet(FacetKind::MaxLength, "4")]),
            [ErrorKind::FacetInheritance]
        );
        assert_eq!(
            check(&schema, &QName::xsd("token"), vec![facet(FacetKind::WhiteSpace, "preserve")]),
            [ErrorKind::FacetInheritance]
        );
        assert!(check(&schema, &QName::xsd("string"), vec![facet(FacetKind::WhiteSpace, "collapse")]).is_empty());
    }

    #[test]
    fn test_enumeration_subset() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("Color", QName::xsd("token"), vec![
                Facet::new(FacetKind::Enumeration, "red"),
                Facet::new(FacetKind::Enumeration, "green"),
            ])
            .build();
        let base = QName::new("urn:x", "Color");
        assert!(check(&schema, &base, vec![facet(FacetKind::Enumeration, "red")]).is_empty());
        assert_eq!(
            check(&schema, &base, vec![facet(FacetKind::Enumeration, "blue")]),
            [ErrorKind::FacetInheritance]
        );
    }

    #[test]
    fn test_duplicate_facet() {
        let schema = Schema::default();
        assert_eq!(
            check(&schema, &QName::xsd("string"), vec![facet(FacetKind::MaxLength, "3"), facet(FacetKind::MaxLength, "3")]),
            [ErrorKind::FacetConsistency]
        );
    }

    #[test]
    fn test_duration_bounds_not_comparable() {
        let schema = Schema::default();
        // P1M and P30D have no defined order; the pair is skipped
        assert!(check(&schema, &QName::xsd("duration"), vec![
            facet(FacetKind::MinInclusive, "P1M"),
            facet(FacetKind::MaxInclusive, "P30D"),
        ])
        .is_empty());
        assert_eq!(
            check(&schema, &QName::xsd("duration"), vec![
                facet(FacetKind::MinInclusive, "P2M"),
                facet(FacetKind::MaxInclusive, "P1M"),
            ]),
            [ErrorKind::FacetConsistency]
        );
    }

    #[test]
    fn test_nan_is_not_comparable() {
        let schema = Schema::default();
        assert!(check(&schema, &QName::xsd("double"), vec![
            facet(FacetKind::MinInclusive, "NaN"),
            facet(FacetKind::MaxInclusive, "1"),
        ])
        .is_empty());
    }

    #[test]
    fn test_deferred_facet_binding() {
        let schema = Schema::default();
        let entries = vec![FacetEntry::from(crate::validators::facets::DeferredFacet::new("maxLength", "2"))];
        assert!(check(&schema, &QName::xsd("string"), entries).is_empty());
        let entries = vec![FacetEntry::from(crate::validators::facets::DeferredFacet::new("bogus", "2"))];
        assert_eq!(check(&schema, &QName::xsd("string"), entries), [ErrorKind::FacetApplicability]);

        let bound = materialize(&schema, TypeHandle::builtin("int").unwrap(), &facet(FacetKind::MaxInclusive, " 7 ")).unwrap();
        assert!(matches!(bound.typed, FacetValue::Ordered(Value::Decimal(_))));
    }

    #[test]
    fn test_validate_value() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("Small", QName::xsd("int"), vec![Facet::new(FacetKind::MaxInclusive, "9")])
            .simple_list("Smalls", QName::new("urn:x", "Small"))
            .simple_union("NumOrDate", vec![QName::xsd("int"), QName::xsd("date")])
            .simple_restriction("Code", QName::xsd("string"), vec![
                Facet::new(FacetKind::Pattern, "[A-Z]{3}"),
                Facet::new(FacetKind::Length, "3"),
            ])
            .build();
        let t = |local: &str| schema.lookup_type(&QName::new("urn:x", local)).unwrap();
        assert!(validate_value(&schema, t("Small"), " 7 ").is_ok());
        assert!(validate_value(&schema, t("Small"), "10").is_err());
        assert!(validate_value(&schema, t("Smalls"), "1 2  3").is_ok());
        assert!(validate_value(&schema, t("Smalls"), "1 22").is_err());
        assert!(validate_value(&schema, t("NumOrDate"), "2024-01-31").is_ok());
        assert!(validate_value(&schema, t("NumOrDate"), "soon").is_err());
        assert!(validate_value(&schema, t("Code"), "ABC").is_ok());
        assert!(validate_value(&schema, t("Code"), "abc").is_err());
        assert!(validate_value(&schema, TypeHandle::builtin("byte").unwrap(), "128").is_err());
        assert!(validate_value(&schema, TypeHandle::builtin("NMTOKENS").unwrap(), "").is_err());
        assert!(validate_value(&schema, TypeHandle::builtin("decimal").unwrap(), "1.50").is_ok());
    }

    #[test]
    fn test_effective_facets_merge_chain() {
        let schema = SchemaBuilder::new("urn:x")
            .simple_restriction("A", QName::xsd("unsignedByte"), vec![Facet::new(FacetKind::MinInclusive, "10")])
            .simple_restriction("B", QName::new("urn:x", "A"), vec![Facet::new(FacetKind::Pattern, "\\d+")])
            .build();
        let set = effective_facets(&schema, schema.lookup_type(&QName::new("urn:x", "B")).unwrap());
        assert_eq!(set.min.as_ref().unwrap().lexical, "10");
        assert_eq!(set.max.as_ref().unwrap().lexical, "255");
        assert_eq!(set.fraction_digits.map(|c| c.value), Some(0));
        assert_eq!(set.patterns.len(), 1);
        assert_eq!(set.white_space_mode(), WhiteSpace::Collapse);
    }
}
