//! Validator helper functions
//!
//! This module provides the lexical validators used by the builtin-type
//! catalog. Validators see the value after whitespace normalization and check
//! the lexical space only; value ranges of derived builtins (`byte`,
//! `positiveInteger`, ...) are expressed as implied facets instead.

use crate::error::{Error, Result};
use crate::names::{is_valid_name, is_valid_ncname, is_valid_nmtoken, is_valid_qname};
use base64::Engine;
use std::collections::HashMap;

use super::values;

/// XSD final attribute values
pub const XSD_FINAL_ATTRIBUTE_VALUES: &[&str] = &["restriction", "extension", "list", "union"];

lazy_static::lazy_static! {
    /// XSD boolean value mapping
    pub static ref XSD_BOOLEAN_MAP: HashMap<&'static str, bool> = {
        let mut m = HashMap::new();
        m.insert("false", false);
        m.insert("0", false);
        m.insert("true", true);
        m.insert("1", true);
        m
    };

    static ref INTEGER_REGEX: regex::Regex = regex::Regex::new(r"^[+-]?\d+$").unwrap();
    static ref LANGUAGE_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").unwrap();
    static ref HEX_BINARY_REGEX: regex::Regex = regex::Regex::new(r"^([0-9a-fA-F]{2})*$").unwrap();
    static ref URI_SCHEME_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap();
}

fn invalid(value: &str, type_name: &str) -> Error {
    Error::Value(format!("'{}' is not a valid value of xs:{}", value, type_name))
}

// =============================================================================
// String Validators
// =============================================================================

/// Validate an xs:string value (every string is valid)
pub fn string_validator(_value: &str) -> Result<()> {
    Ok(())
}

/// Validate an xs:normalizedString value
pub fn normalized_string_validator(value: &str) -> Result<()> {
    if value.contains(['\t', '\n', '\r']) {
        return Err(invalid(value, "normalizedString"));
    }
    Ok(())
}

/// Validate an xs:token value
pub fn token_validator(value: &str) -> Result<()> {
    if value.contains(['\t', '\n', '\r'])
        || value.starts_with(' ')
        || value.ends_with(' ')
        || value.contains("  ")
    {
        return Err(invalid(value, "token"));
    }
    Ok(())
}

/// Validate an xs:language value
pub fn language_validator(value: &str) -> Result<()> {
    if !LANGUAGE_REGEX.is_match(value) {
        return Err(invalid(value, "language"));
    }
    Ok(())
}

/// Validate an xs:Name value
pub fn name_validator(value: &str) -> Result<()> {
    if !is_valid_name(value) {
        return Err(invalid(value, "Name"));
    }
    Ok(())
}

/// Validate an xs:NCName value (also ID, IDREF, ENTITY)
pub fn ncname_validator(value: &str) -> Result<()> {
    if !is_valid_ncname(value) {
        return Err(invalid(value, "NCName"));
    }
    Ok(())
}

/// Validate an xs:NMTOKEN value
pub fn nmtoken_validator(value: &str) -> Result<()> {
    if !is_valid_nmtoken(value) {
        return Err(invalid(value, "NMTOKEN"));
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validate an xs:decimal value
pub fn decimal_validator(value: &str) -> Result<()> {
    values::parse_decimal(value).map(|_| ()).map_err(Error::Value)
}

/// Validate the lexical form of xs:integer and its derivations
pub fn integer_validator(value: &str) -> Result<()> {
    if !INTEGER_REGEX.is_match(value) {
        return Err(invalid(value, "integer"));
    }
    Ok(())
}

/// Validate an xs:float or xs:double value
pub fn float_validator(value: &str) -> Result<()> {
    values::parse_float(value).map(|_| ()).map_err(Error::Value)
}

/// Validate an xs:boolean value
pub fn boolean_validator(value: &str) -> Result<()> {
    if !XSD_BOOLEAN_MAP.contains_key(value) {
        return Err(invalid(value, "boolean"));
    }
    Ok(())
}

// =============================================================================
// Date/Time Validators
// =============================================================================

/// Validate an xs:duration value
pub fn duration_validator(value: &str) -> Result<()> {
    values::parse_duration(value).map(|_| ()).map_err(Error::Value)
}

macro_rules! datetime_validator {
    ($(#[$doc:meta])* $name:ident, $primitive:literal) => {
        $(#[$doc])*
        pub fn $name(value: &str) -> Result<()> {
            values::parse_value($primitive, value).map(|_| ()).map_err(Error::Value)
        }
    };
}

datetime_validator!(
    /// Validate an xs:dateTime value
    datetime_validator, "dateTime"
);
datetime_validator!(
    /// Validate an xs:date value
    date_validator, "date"
);
datetime_validator!(
    /// Validate an xs:time value
    time_validator, "time"
);
datetime_validator!(
    /// Validate an xs:gYearMonth value
    gyear_month_validator, "gYearMonth"
);
datetime_validator!(
    /// Validate an xs:gYear value
    gyear_validator, "gYear"
);
datetime_validator!(
    /// Validate an xs:gMonthDay value
    gmonth_day_validator, "gMonthDay"
);
datetime_validator!(
    /// Validate an xs:gDay value
    gday_validator, "gDay"
);
datetime_validator!(
    /// Validate an xs:gMonth value
    gmonth_validator, "gMonth"
);

// =============================================================================
// Binary Validators
// =============================================================================

/// Validate a hex binary value
pub fn hex_binary_validator(value: &str) -> Result<()> {
    if !HEX_BINARY_REGEX.is_match(value) {
        return Err(invalid(value, "hexBinary"));
    }
    Ok(())
}

/// Validate a base64 binary value
pub fn base64_binary_validator(value: &str) -> Result<()> {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Ok(());
    }
    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map(|_| ())
        .map_err(|_| invalid(value, "base64Binary"))
}

/// Length of a binary value in octets, used by the length facets
pub fn binary_length(primitive: &str, value: &str) -> Option<usize> {
    match primitive {
        "hexBinary" => Some(value.len() / 2),
        "base64Binary" => {
            let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(&cleaned)
                .ok()
                .map(|bytes| bytes.len())
        }
        _ => None,
    }
}

// =============================================================================
// URI and QName Validators
// =============================================================================

/// Validate an xs:anyURI value.
///
/// Relative references are accepted; anything carrying a scheme must parse
/// as an absolute URL.
pub fn any_uri_validator(value: &str) -> Result<()> {
    if value.contains(['<', '>', '"', '{', '}', '|', '\\', '^', '`']) {
        return Err(invalid(value, "anyURI"));
    }
    if URI_SCHEME_REGEX.is_match(value) {
        url::Url::parse(value).map_err(|_| invalid(value, "anyURI"))?;
    }
    Ok(())
}

/// Validate an xs:QName or xs:NOTATION lexical value
pub fn qname_validator(value: &str) -> Result<()> {
    if !is_valid_qname(value) {
        return Err(invalid(value, "QName"));
    }
    Ok(())
}

/// Validator for a value no type accepts
pub fn error_type_validator(value: &str) -> Result<()> {
    Err(Error::Value(format!("no value is allowed here, got '{}'", value)))
}

// =============================================================================
// Boolean Conversions
// =============================================================================

/// Convert XSD boolean string to Rust bool
pub fn boolean_to_rust(value: &str) -> Result<bool> {
    XSD_BOOLEAN_MAP
        .get(value)
        .copied()
        .ok_or_else(|| Error::Value(format!("'{}' is not a valid boolean value", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_family() {
        assert!(normalized_string_validator("a b").is_ok());
        assert!(normalized_string_validator("a\tb").is_err());
        assert!(token_validator("a b").is_ok());
        assert!(token_validator(" a").is_err());
        assert!(token_validator("a  b").is_err());
        assert!(language_validator("en-US").is_ok());
        assert!(language_validator("toolonglanguage").is_err());
    }

    #[test]
    fn test_numeric_lexical() {
        assert!(integer_validator("-42").is_ok());
        assert!(integer_validator("1.0").is_err());
        assert!(decimal_validator("1.0").is_ok());
        assert!(float_validator("1e10").is_ok());
        assert!(float_validator("NaN").is_ok());
        assert!(boolean_validator("1").is_ok());
        assert!(boolean_validator("yes").is_err());
    }

    #[test]
    fn test_binary() {
        assert!(hex_binary_validator("0FB7").is_ok());
        assert!(hex_binary_validator("0FB").is_err());
        assert!(base64_binary_validator("aGVsbG8=").is_ok());
        assert!(base64_binary_validator("!!").is_err());
        assert_eq!(binary_length("hexBinary", "0FB7"), Some(2));
        assert_eq!(binary_length("base64Binary", "aGVsbG8="), Some(5));
    }

    #[test]
    fn test_uri_and_qname() {
        assert!(any_uri_validator("http://example.com/a").is_ok());
        assert!(any_uri_validator("../relative/path").is_ok());
        assert!(any_uri_validator("urn:isbn:0451450523").is_ok());
        assert!(any_uri_validator("a<b").is_err());
        assert!(qname_validator("xs:string").is_ok());
        assert!(qname_validator("1bad").is_err());
    }

    #[test]
    fn test_dates() {
        assert!(date_validator("2024-02-29").is_ok());
        assert!(date_validator("2023-02-29").is_err());
        assert!(gyear_validator("2024Z").is_ok());
        assert!(duration_validator("P1Y2M").is_ok());
    }
}
