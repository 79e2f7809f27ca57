//! Typed value space for ordered XSD primitives
//!
//! Range facets compare values of the base type's primitive: arbitrary
//! precision decimals, IEEE floats, durations and the date/time family.
//! Floats with NaN, durations whose month and second parts disagree, and
//! date/times with mixed timezone presence are only partially ordered; the
//! comparison then answers `None`.
//!
//! Calendar arithmetic goes through `chrono`, so date/time years are limited
//! to its range (about +/-262143).

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const TZ: &str = r"(Z|[+-]\d{2}:\d{2})?";

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap());
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?|-?INF|NaN)$").unwrap()
});
static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)D)?(T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
        .unwrap()
});
static DATETIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(-?\d{{4,}})-(\d{{2}})-(\d{{2}})T(\d{{2}}):(\d{{2}}):(\d{{2}}(?:\.\d+)?){}$",
        TZ
    ))
    .unwrap()
});
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(-?\d{{4,}})-(\d{{2}})-(\d{{2}}){}$", TZ)).unwrap()
});
static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(\d{{2}}):(\d{{2}}):(\d{{2}}(?:\.\d+)?){}$", TZ)).unwrap()
});
static GYEARMONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(-?\d{{4,}})-(\d{{2}}){}$", TZ)).unwrap()
});
static GYEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(-?\d{{4,}}){}$", TZ)).unwrap());
static GMONTHDAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^--(\d{{2}})-(\d{{2}}){}$", TZ)).unwrap());
static GDAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^---(\d{{2}}){}$", TZ)).unwrap());
static GMONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^--(\d{{2}})(?:--)?{}$", TZ)).unwrap());

/// Member of the date/time primitive family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    /// xs:dateTime
    DateTime,
    /// xs:date
    Date,
    /// xs:time
    Time,
    /// xs:gYearMonth
    GYearMonth,
    /// xs:gYear
    GYear,
    /// xs:gMonthDay
    GMonthDay,
    /// xs:gDay
    GDay,
    /// xs:gMonth
    GMonth,
}

impl DateTimeKind {
    /// Map a primitive local name to its kind
    pub fn from_primitive(name: &str) -> Option<Self> {
        match name {
            "dateTime" => Some(Self::DateTime),
            "date" => Some(Self::Date),
            "time" => Some(Self::Time),
            "gYearMonth" => Some(Self::GYearMonth),
            "gYear" => Some(Self::GYear),
            "gMonthDay" => Some(Self::GMonthDay),
            "gDay" => Some(Self::GDay),
            "gMonth" => Some(Self::GMonth),
            _ => None,
        }
    }
}

/// A date/time value placed on a timeline of seconds
#[derive(Debug, Clone, PartialEq)]
pub struct DateTimeValue {
    /// Which primitive the value belongs to
    pub kind: DateTimeKind,
    /// Seconds since 0001-01-01T00:00:00 in local time, missing fields filled
    /// from 1972-01-01T00:00:00
    pub local_seconds: BigDecimal,
    /// Timezone offset in minutes, if present
    pub timezone: Option<i32>,
}

impl DateTimeValue {
    fn utc_seconds(&self) -> BigDecimal {
        match self.timezone {
            Some(tz) => self.local_seconds.clone() - BigDecimal::from(i64::from(tz) * 60),
            None => self.local_seconds.clone(),
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        if self.kind != other.kind {
            return None;
        }
        const FOURTEEN_HOURS: i64 = 14 * 3600;
        match (self.timezone.is_some(), other.timezone.is_some()) {
            (true, true) | (false, false) => Some(self.utc_seconds().cmp(&other.utc_seconds())),
            (true, false) => {
                let p = self.utc_seconds();
                let q = &other.local_seconds;
                if p < q.clone() - BigDecimal::from(FOURTEEN_HOURS) {
                    Some(Ordering::Less)
                } else if p > q.clone() + BigDecimal::from(FOURTEEN_HOURS) {
                    Some(Ordering::Greater)
                } else {
                    None
                }
            }
            (false, true) => other.compare(self).map(Ordering::reverse),
        }
    }
}

/// An XSD duration split into its month and second components
#[derive(Debug, Clone, PartialEq)]
pub struct Duration {
    /// Years and months, as months
    pub months: BigDecimal,
    /// Days, hours, minutes and seconds, as seconds
    pub seconds: BigDecimal,
}

impl Duration {
    /// Partial order: comparable only when both components agree in direction
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let m = self.months.cmp(&other.months);
        let s = self.seconds.cmp(&other.seconds);
        match (m, s) {
            (Ordering::Equal, s) => Some(s),
            (m, Ordering::Equal) => Some(m),
            (m, s) if m == s => Some(m),
            _ => None,
        }
    }
}

/// A typed value of an ordered primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// xs:decimal and its derivations
    Decimal(BigDecimal),
    /// xs:float
    Float(f64),
    /// xs:double
    Double(f64),
    /// xs:duration
    Duration(Duration),
    /// The date/time family
    DateTime(DateTimeValue),
}

impl Value {
    /// Compare two values; `None` when the pair is not ordered
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) | (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Duration(a), Value::Duration(b)) => a.compare(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.compare(b),
            _ => None,
        }
    }

    /// Check for a NaN float or double
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Float(f) | Value::Double(f) if f.is_nan())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Float(v) | Value::Double(v) => write!(f, "{}", v),
            Value::Duration(d) => write!(f, "duration({} months, {} s)", d.months, d.seconds),
            Value::DateTime(dt) => write!(f, "{:?}@{}", dt.kind, dt.local_seconds),
        }
    }
}

/// Parse a lexical form as a value of the given ordered primitive.
///
/// Returns `Ok(None)` for primitives without an order (string, boolean, ...).
pub fn parse_value(primitive: &str, lexical: &str) -> Result<Option<Value>, String> {
    let lexical = lexical.trim();
    match primitive {
        "decimal" => parse_decimal(lexical).map(|d| Some(Value::Decimal(d))),
        "float" => parse_float(lexical).map(|v| Some(Value::Float(v))),
        "double" => parse_float(lexical).map(|v| Some(Value::Double(v))),
        "duration" => parse_duration(lexical).map(|d| Some(Value::Duration(d))),
        other => match DateTimeKind::from_primitive(other) {
            Some(kind) => parse_datetime(kind, lexical).map(|v| Some(Value::DateTime(v))),
            None => Ok(None),
        },
    }
}

/// Parse an xs:decimal lexical form
pub fn parse_decimal(lexical: &str) -> Result<BigDecimal, String> {
    if !DECIMAL_RE.is_match(lexical) {
        return Err(format!("'{}' is not a valid decimal", lexical));
    }
    let mut text = lexical.trim_start_matches('+').to_string();
    if text.ends_with('.') {
        text.push('0');
    }
    if text.starts_with('.') {
        text.insert(0, '0');
    } else if text.starts_with("-.") {
        text.insert(1, '0');
    }
    BigDecimal::from_str(&text).map_err(|e| format!("'{}' is not a valid decimal: {}", lexical, e))
}

/// Parse an xs:float or xs:double lexical form
pub fn parse_float(lexical: &str) -> Result<f64, String> {
    if !FLOAT_RE.is_match(lexical) {
        return Err(format!("'{}' is not a valid floating-point value", lexical));
    }
    match lexical {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => lexical
            .parse::<f64>()
            .map_err(|e| format!("'{}' is not a valid floating-point value: {}", lexical, e)),
    }
}

fn component(text: Option<regex::Match<'_>>) -> Result<BigDecimal, String> {
    match text {
        Some(m) => BigDecimal::from_str(m.as_str()).map_err(|e| format!("duration component '{}': {}", m.as_str(), e)),
        None => Ok(BigDecimal::from(0)),
    }
}

/// Parse an xs:duration lexical form
pub fn parse_duration(lexical: &str) -> Result<Duration, String> {
    let caps = DURATION_RE
        .captures(lexical)
        .ok_or_else(|| format!("'{}' is not a valid duration", lexical))?;
    let has_date = (2..=4).any(|i| caps.get(i).is_some());
    let has_time = (6..=8).any(|i| caps.get(i).is_some());
    if caps.get(5).is_some() && !has_time {
        return Err(format!("'{}' is not a valid duration: 'T' without time components", lexical));
    }
    if !has_date && !has_time {
        return Err(format!("'{}' is not a valid duration: no components", lexical));
    }
    let months = component(caps.get(2))? * BigDecimal::from(12) + component(caps.get(3))?;
    let seconds = component(caps.get(4))? * BigDecimal::from(86_400)
        + component(caps.get(6))? * BigDecimal::from(3_600)
        + component(caps.get(7))? * BigDecimal::from(60)
        + component(caps.get(8))?;
    if caps.get(1).is_some() {
        Ok(Duration {
            months: -months,
            seconds: -seconds,
        })
    } else {
        Ok(Duration { months, seconds })
    }
}

fn parse_u32(text: &str) -> Result<u32, String> {
    text.parse::<u32>().map_err(|e| format!("'{}': {}", text, e))
}

fn parse_year(text: &str) -> Result<i32, String> {
    let digits = text.trim_start_matches('-');
    if digits.len() > 4 && digits.starts_with('0') {
        return Err(format!("year '{}' has leading zeros", text));
    }
    if digits.chars().all(|c| c == '0') {
        return Err("year 0000 is not allowed".to_string());
    }
    let out_of_range = || {
        format!(
            "year '{}' is outside the supported range {}..={}",
            text,
            NaiveDate::MIN.year(),
            NaiveDate::MAX.year()
        )
    };
    let year = text.parse::<i32>().map_err(|_| out_of_range())?;
    if !(NaiveDate::MIN.year()..=NaiveDate::MAX.year()).contains(&year) {
        return Err(out_of_range());
    }
    Ok(year)
}

fn parse_timezone(text: Option<regex::Match<'_>>) -> Result<Option<i32>, String> {
    let Some(m) = text else {
        return Ok(None);
    };
    let tz = m.as_str();
    if tz == "Z" {
        return Ok(Some(0));
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let hours = parse_u32(&tz[1..3])? as i32;
    let minutes = parse_u32(&tz[4..6])? as i32;
    if minutes > 59 || hours > 14 || (hours == 14 && minutes != 0) {
        return Err(format!("timezone '{}' out of range", tz));
    }
    Ok(Some(sign * (hours * 60 + minutes)))
}

struct Fields {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: BigDecimal,
}

impl Default for Fields {
    fn default() -> Self {
        Fields {
            year: 1972,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: BigDecimal::from(0),
        }
    }
}

fn set_time(fields: &mut Fields, h: &str, m: &str, s: &str) -> Result<(), String> {
    fields.hour = parse_u32(h)?;
    fields.minute = parse_u32(m)?;
    fields.second = BigDecimal::from_str(s).map_err(|e| format!("seconds '{}': {}", s, e))?;
    if fields.hour == 24 {
        if fields.minute != 0 || fields.second != BigDecimal::from(0) {
            return Err("hour 24 is only allowed as 24:00:00".to_string());
        }
    } else if fields.hour > 23 {
        return Err(format!("hour {} out of range", fields.hour));
    }
    if fields.minute > 59 || fields.second >= BigDecimal::from(60) {
        return Err("minute or second out of range".to_string());
    }
    Ok(())
}

/// Parse a member of the date/time family
pub fn parse_datetime(kind: DateTimeKind, lexical: &str) -> Result<DateTimeValue, String> {
    let invalid = || format!("'{}' is not a valid {:?} value", lexical, kind);
    let re: &Regex = match kind {
        DateTimeKind::DateTime => &DATETIME_RE,
        DateTimeKind::Date => &DATE_RE,
        DateTimeKind::Time => &TIME_RE,
        DateTimeKind::GYearMonth => &GYEARMONTH_RE,
        DateTimeKind::GYear => &GYEAR_RE,
        DateTimeKind::GMonthDay => &GMONTHDAY_RE,
        DateTimeKind::GDay => &GDAY_RE,
        DateTimeKind::GMonth => &GMONTH_RE,
    };
    let caps = re.captures(lexical).ok_or_else(invalid)?;
    let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");
    let mut fields = Fields::default();
    let tz_index = match kind {
        DateTimeKind::DateTime => {
            fields.year = parse_year(group(1))?;
            fields.month = parse_u32(group(2))?;
            fields.day = parse_u32(group(3))?;
            set_time(&mut fields, group(4), group(5), group(6))?;
            7
        }
        DateTimeKind::Date => {
            fields.year = parse_year(group(1))?;
            fields.month = parse_u32(group(2))?;
            fields.day = parse_u32(group(3))?;
            4
        }
        DateTimeKind::Time => {
            set_time(&mut fields, group(1), group(2), group(3))?;
            4
        }
        DateTimeKind::GYearMonth => {
            fields.year = parse_year(group(1))?;
            fields.month = parse_u32(group(2))?;
            3
        }
        DateTimeKind::GYear => {
            fields.year = parse_year(group(1))?;
            2
        }
        DateTimeKind::GMonthDay => {
            fields.month = parse_u32(group(1))?;
            fields.day = parse_u32(group(2))?;
            3
        }
        DateTimeKind::GDay => {
            fields.day = parse_u32(group(1))?;
            2
        }
        DateTimeKind::GMonth => {
            fields.month = parse_u32(group(1))?;
            2
        }
    };
    let timezone = parse_timezone(caps.get(tz_index))?;
    let date = NaiveDate::from_ymd_opt(fields.year, fields.month, fields.day).ok_or_else(invalid)?;
    let days = i64::from(date.num_days_from_ce());
    let local_seconds = BigDecimal::from(days * 86_400)
        + BigDecimal::from(i64::from(fields.hour) * 3_600 + i64::from(fields.minute) * 60)
        + fields.second;
    Ok(DateTimeValue {
        kind,
        local_seconds,
        timezone,
    })
}

/// Count total and fraction digits of a decimal lexical form, ignoring
/// sign, leading zeros and trailing fractional zeros
pub fn decimal_digits(lexical: &str) -> (usize, usize) {
    let text = lexical.trim().trim_start_matches(['+', '-']);
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text, ""));
    let frac_part = frac_part.trim_end_matches('0');
    let digits = format!("{}{}", int_part, frac_part);
    let total = digits.trim_start_matches('0').len().max(1);
    (total, frac_part.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(primitive: &str, lexical: &str) -> Value {
        parse_value(primitive, lexical).unwrap().unwrap()
    }

    #[test]
    fn test_decimal_values() {
        assert_eq!(v("decimal", "100").partial_compare(&v("decimal", "50")), Some(Ordering::Greater));
        assert_eq!(v("decimal", "+1.50").partial_compare(&v("decimal", "1.5")), Some(Ordering::Equal));
        assert!(parse_decimal(".5").is_ok());
        assert!(parse_decimal("5.").is_ok());
        assert!(parse_decimal("1e5").is_err());
        assert!(parse_decimal("abc").is_err());
    }

    #[test]
    fn test_decimals_beyond_machine_precision() {
        let big = v("decimal", "123456789012345678901234567890123");
        let bigger = v("decimal", "123456789012345678901234567890124");
        assert_eq!(big.partial_compare(&bigger), Some(Ordering::Less));

        let low = v("decimal", "0.1234567890123456789012345678901234567890");
        let high = v("decimal", "0.1234567890123456789012345678901234567891");
        assert_eq!(high.partial_compare(&low), Some(Ordering::Greater));
        assert_eq!(
            v("decimal", "-99999999999999999999999999999999.5").partial_compare(&v("decimal", "0")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_float_nan_is_unordered() {
        let nan = v("float", "NaN");
        assert!(nan.is_nan());
        assert_eq!(nan.partial_compare(&v("float", "1.0")), None);
        assert_eq!(v("double", "-INF").partial_compare(&v("double", "1e300")), Some(Ordering::Less));
        assert!(parse_float("+INF").is_err());
        assert!(parse_float("inf").is_err());
    }

    #[test]
    fn test_duration_partial_order() {
        let one_month = v("duration", "P1M");
        let thirty_days = v("duration", "P30D");
        let one_year = v("duration", "P1Y");
        assert_eq!(one_month.partial_compare(&thirty_days), None);
        assert_eq!(one_year.partial_compare(&one_month), Some(Ordering::Greater));
        assert_eq!(
            v("duration", "P1Y1D").partial_compare(&v("duration", "P1Y")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            v("duration", "-P1D").partial_compare(&v("duration", "PT1H")),
            Some(Ordering::Less)
        );
        assert!(parse_duration("P").is_err());
        assert!(parse_duration("P1DT").is_err());
        assert!(parse_duration("PT1.5S").is_ok());
    }

    #[test]
    fn test_datetime_ordering() {
        assert_eq!(
            v("date", "2002-10-10").partial_compare(&v("date", "2002-10-11")),
            Some(Ordering::Less)
        );
        assert_eq!(
            v("dateTime", "2002-10-10T12:00:00-05:00").partial_compare(&v("dateTime", "2002-10-10T17:00:00Z")),
            Some(Ordering::Equal)
        );
        assert_eq!(
            v("dateTime", "2002-10-10T12:00:00Z").partial_compare(&v("dateTime", "2002-10-10T12:00:00")),
            None
        );
        assert_eq!(
            v("dateTime", "2002-10-09T00:00:00Z").partial_compare(&v("dateTime", "2002-10-10T16:00:00")),
            Some(Ordering::Less)
        );
        assert!(parse_value("date", "2001-02-29").is_err());
        assert!(parse_value("gMonthDay", "--02-29").is_ok());
        assert!(parse_value("time", "24:00:00").is_ok());
        assert!(parse_value("gYear", "0000").is_err());
        assert!(parse_value("gYear", "262000").is_ok());
        let far = parse_value("gYear", "9999999999").unwrap_err();
        assert!(far.contains("outside the supported range"), "{}", far);
        assert!(parse_value("dateTime", "2002-10-10T12:00:00+15:00").is_err());
    }

    #[test]
    fn test_unordered_primitive() {
        assert_eq!(parse_value("string", "abc").unwrap(), None);
    }

    #[test]
    fn test_decimal_digits() {
        assert_eq!(decimal_digits("123.450"), (5, 2));
        assert_eq!(decimal_digits("-0.001"), (1, 3));
        assert_eq!(decimal_digits("000"), (1, 0));
        assert_eq!(decimal_digits("+12"), (2, 0));
    }
}
