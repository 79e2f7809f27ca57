//! XSD regular expressions
//!
//! XSD patterns are always anchored, have no `^`/`$` assertions, and add a
//! few escapes (`\i`, `\c`, `\p{IsBlock}`) and class subtraction
//! (`[a-z-[aeiou]]`). This module translates them into the syntax of the
//! `regex` crate and reports anything outside the XSD grammar as a
//! `PatternSyntax` error.

use regex::Regex;

use crate::error::{schema_error, ErrorKind, SchemaError};

const XML_WHITESPACE: &str = r"\x20\t\n\r";

const NAME_START_CLASS: &str = r":A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\u{200C}-\u{200D}\u{2070}-\u{218F}\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}\u{FDF0}-\u{FFFD}\u{10000}-\u{EFFFF}";

const NAME_EXTRA_CLASS: &str = r"\-.0-9\u{B7}\u{300}-\u{36F}\u{203F}-\u{2040}";

/// General categories (and their single-letter groups) accepted by `\p{..}`
const CATEGORIES: &[&str] = &[
    "L", "Lu", "Ll", "Lt", "Lm", "Lo", "M", "Mn", "Mc", "Me", "N", "Nd", "Nl", "No", "P", "Pc", "Pd",
    "Ps", "Pe", "Pi", "Pf", "Po", "Z", "Zs", "Zl", "Zp", "S", "Sm", "Sc", "Sk", "So", "C", "Cc", "Cf",
    "Co", "Cn",
];

/// Unicode blocks accepted by `\p{IsBlock}`
const BLOCKS: &[(&str, u32, u32)] = &[
    ("BasicLatin", 0x0000, 0x007F),
    ("Latin-1Supplement", 0x0080, 0x00FF),
    ("LatinExtended-A", 0x0100, 0x017F),
    ("LatinExtended-B", 0x0180, 0x024F),
    ("IPAExtensions", 0x0250, 0x02AF),
    ("SpacingModifierLetters", 0x02B0, 0x02FF),
    ("CombiningDiacriticalMarks", 0x0300, 0x036F),
    ("Greek", 0x0370, 0x03FF),
    ("Cyrillic", 0x0400, 0x04FF),
    ("Armenian", 0x0530, 0x058F),
    ("Hebrew", 0x0590, 0x05FF),
    ("Arabic", 0x0600, 0x06FF),
    ("Syriac", 0x0700, 0x074F),
    ("Thaana", 0x0780, 0x07BF),
    ("Devanagari", 0x0900, 0x097F),
    ("Bengali", 0x0980, 0x09FF),
    ("Thai", 0x0E00, 0x0E7F),
    ("Lao", 0x0E80, 0x0EFF),
    ("Tibetan", 0x0F00, 0x0FFF),
    ("Georgian", 0x10A0, 0x10FF),
    ("HangulJamo", 0x1100, 0x11FF),
    ("LatinExtendedAdditional", 0x1E00, 0x1EFF),
    ("GreekExtended", 0x1F00, 0x1FFF),
    ("GeneralPunctuation", 0x2000, 0x206F),
    ("SuperscriptsandSubscripts", 0x2070, 0x209F),
    ("CurrencySymbols", 0x20A0, 0x20CF),
    ("LetterlikeSymbols", 0x2100, 0x214F),
    ("NumberForms", 0x2150, 0x218F),
    ("Arrows", 0x2190, 0x21FF),
    ("MathematicalOperators", 0x2200, 0x22FF),
    ("BoxDrawing", 0x2500, 0x257F),
    ("GeometricShapes", 0x25A0, 0x25FF),
    ("MiscellaneousSymbols", 0x2600, 0x26FF),
    ("Dingbats", 0x2700, 0x27BF),
    ("CJKSymbolsandPunctuation", 0x3000, 0x303F),
    ("Hiragana", 0x3040, 0x309F),
    ("Katakana", 0x30A0, 0x30FF),
    ("CJKUnifiedIdeographs", 0x4E00, 0x9FFF),
    ("HangulSyllables", 0xAC00, 0xD7A3),
    ("PrivateUse", 0xE000, 0xF8FF),
    ("AlphabeticPresentationForms", 0xFB00, 0xFB4F),
    ("HalfwidthandFullwidthForms", 0xFF00, 0xFFEF),
    ("Specials", 0xFFF0, 0xFFFF),
];

fn syntax_error(pattern: &str, message: impl std::fmt::Display) -> SchemaError {
    schema_error(
        ErrorKind::PatternSyntax,
        format!("invalid pattern '{}': {}", pattern, message),
    )
}

/// Translate an XSD pattern into an anchored `regex` crate expression
pub fn translate_pattern(pattern: &str) -> Result<String, SchemaError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut translator = Translator {
        pattern,
        chars: &chars,
        pos: 0,
    };
    let body = translator.branch_list(0)?;
    if translator.pos < chars.len() {
        return Err(syntax_error(pattern, "unbalanced ')'"));
    }
    Ok(format!(r"\A(?:{})\z", body))
}

/// Translate and compile a single XSD pattern
pub fn compile_pattern(pattern: &str) -> Result<Regex, SchemaError> {
    let translated = translate_pattern(pattern)?;
    Regex::new(&translated).map_err(|e| syntax_error(pattern, e))
}

/// Compile the patterns of one derivation step; a value must match any one of them
pub fn compile_pattern_set<'p>(patterns: impl IntoIterator<Item = &'p str>) -> Result<Regex, SchemaError> {
    let mut branches = Vec::new();
    for pattern in patterns {
        branches.push(translate_pattern(pattern)?);
    }
    let joined = branches.join("|");
    Regex::new(&joined).map_err(|e| syntax_error(&joined, e))
}

struct Translator<'a> {
    pattern: &'a str,
    chars: &'a [char],
    pos: usize,
}

#[derive(PartialEq)]
enum Atom {
    None,
    Quantifiable,
    Quantified,
}

impl Translator<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn error(&self, message: impl std::fmt::Display) -> SchemaError {
        syntax_error(self.pattern, format!("{} at position {}", message, self.pos))
    }

    fn branch_list(&mut self, depth: usize) -> Result<String, SchemaError> {
        let mut out = String::new();
        let mut last = Atom::None;
        while let Some(c) = self.peek() {
            match c {
                ')' if depth > 0 => return Ok(out),
                ')' => return Err(self.error("unbalanced ')'")),
                '|' => {
                    self.pos += 1;
                    out.push('|');
                    last = Atom::None;
                }
                '(' => {
                    self.pos += 1;
                    if self.peek() == Some('?') {
                        return Err(self.error("'(?' constructs are not allowed"));
                    }
                    let inner = self.branch_list(depth + 1)?;
                    if self.next() != Some(')') {
                        return Err(self.error("missing ')'"));
                    }
                    out.push_str("(?:");
                    out.push_str(&inner);
                    out.push(')');
                    last = Atom::Quantifiable;
                }
                '*' | '+' | '?' | '{' => {
                    match last {
                        Atom::None => return Err(self.error(format!("quantifier '{}' without a target", c))),
                        Atom::Quantified => return Err(self.error(format!("quantifier '{}' follows a quantifier", c))),
                        Atom::Quantifiable => {}
                    }
                    if c == '{' {
                        out.push_str(&self.quantity()?);
                    } else {
                        self.pos += 1;
                        out.push(c);
                    }
                    last = Atom::Quantified;
                }
                '[' => {
                    self.pos += 1;
                    out.push_str(&self.char_class()?);
                    last = Atom::Quantifiable;
                }
                ']' | '}' => return Err(self.error(format!("unescaped '{}'", c))),
                '\\' => {
                    self.pos += 1;
                    out.push_str(&self.escape(false)?);
                    last = Atom::Quantifiable;
                }
                '.' => {
                    self.pos += 1;
                    out.push_str(r"[^\n\r]");
                    last = Atom::Quantifiable;
                }
                '^' | '$' => {
                    self.pos += 1;
                    out.push('\\');
                    out.push(c);
                    last = Atom::Quantifiable;
                }
                _ => {
                    self.pos += 1;
                    out.push(c);
                    last = Atom::Quantifiable;
                }
            }
        }
        if depth > 0 {
            return Err(self.error("missing ')'"));
        }
        Ok(out)
    }

    fn number(&mut self) -> Option<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect::<String>().parse().ok()
    }

    fn quantity(&mut self) -> Result<String, SchemaError> {
        self.pos += 1;
        let min = self.number().ok_or_else(|| self.error("quantity needs a lower bound"))?;
        let result = match self.next() {
            Some('}') => format!("{{{}}}", min),
            Some(',') => {
                if self.peek() == Some('}') {
                    self.pos += 1;
                    format!("{{{},}}", min)
                } else {
                    let max = self.number().ok_or_else(|| self.error("malformed quantity"))?;
                    if self.next() != Some('}') {
                        return Err(self.error("malformed quantity"));
                    }
                    if max < min {
                        return Err(self.error(format!("quantity {{{},{}}} has max < min", min, max)));
                    }
                    format!("{{{},{}}}", min, max)
                }
            }
            _ => return Err(self.error("malformed quantity")),
        };
        Ok(result)
    }

    /// Translate an escape; `in_class` selects the form usable inside `[...]`
    fn escape(&mut self, in_class: bool) -> Result<String, SchemaError> {
        let c = self.next().ok_or_else(|| self.error("dangling '\\'"))?;
        let class = |body: &str, negated: bool| {
            if negated {
                format!("[^{}]", body)
            } else if in_class {
                body.to_string()
            } else {
                format!("[{}]", body)
            }
        };
        let translated = match c {
            'n' => r"\n".to_string(),
            'r' => r"\r".to_string(),
            't' => r"\t".to_string(),
            '\\' | '|' | '.' | '-' | '^' | '?' | '*' | '+' | '{' | '}' | '(' | ')' | '[' | ']' => {
                format!("\\{}", c)
            }
            's' => class(XML_WHITESPACE, false),
            'S' => class(XML_WHITESPACE, true),
            'i' => class(NAME_START_CLASS, false),
            'I' => class(NAME_START_CLASS, true),
            'c' => class(&format!("{}{}", NAME_START_CLASS, NAME_EXTRA_CLASS), false),
            'C' => class(&format!("{}{}", NAME_START_CLASS, NAME_EXTRA_CLASS), true),
            'd' => r"\p{Nd}".to_string(),
            'D' => r"\P{Nd}".to_string(),
            'w' => r"[^\p{P}\p{Z}\p{C}]".to_string(),
            'W' => r"[\p{P}\p{Z}\p{C}]".to_string(),
            'p' | 'P' => self.property(c == 'P')?,
            other => return Err(self.error(format!("unknown escape '\\{}'", other))),
        };
        Ok(translated)
    }

    fn property(&mut self, negated: bool) -> Result<String, SchemaError> {
        if self.next() != Some('{') {
            return Err(self.error("'\\p' needs a '{...}' name"));
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != '}') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if self.next() != Some('}') {
            return Err(self.error("unterminated '\\p{'"));
        }
        if let Some(block) = name.strip_prefix("Is") {
            let (_, lo, hi) = BLOCKS
                .iter()
                .find(|(n, _, _)| *n == block)
                .ok_or_else(|| self.error(format!("unknown block 'Is{}'", block)))?;
            let caret = if negated { "^" } else { "" };
            return Ok(format!("[{}\\u{{{:X}}}-\\u{{{:X}}}]", caret, lo, hi));
        }
        if !CATEGORIES.contains(&name.as_str()) {
            return Err(self.error(format!("unknown category '{}'", name)));
        }
        Ok(format!("\\{}{{{}}}", if negated { 'P' } else { 'p' }, name))
    }

    fn class_char(&mut self) -> Result<String, SchemaError> {
        match self.next() {
            None => Err(self.error("unterminated character class")),
            Some('\\') => self.escape(true),
            Some('[') => Err(self.error("unescaped '[' in character class")),
            Some(c @ ('&' | '~' | '^')) => Ok(format!("\\{}", c)),
            Some(c) => Ok(c.to_string()),
        }
    }

    fn char_class(&mut self) -> Result<String, SchemaError> {
        let negated = self.peek() == Some('^');
        if negated {
            self.pos += 1;
        }
        let mut items = String::new();
        let mut first = true;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated character class")),
                Some(']') if !first => {
                    self.pos += 1;
                    break;
                }
                Some(']') => return Err(self.error("empty character class")),
                Some('-') if self.chars.get(self.pos + 1) == Some(&'[') => {
                    if first {
                        return Err(self.error("class subtraction without a base"));
                    }
                    self.pos += 2;
                    let subtracted = self.char_class()?;
                    if self.next() != Some(']') {
                        return Err(self.error("class subtraction must end the class"));
                    }
                    let base = if negated {
                        format!("[^{}]", items)
                    } else {
                        items
                    };
                    return Ok(format!("[{}--{}]", base, subtracted));
                }
                Some('-') if first || self.chars.get(self.pos + 1) == Some(&']') => {
                    self.pos += 1;
                    items.push_str(r"\-");
                }
                Some('-') => return Err(self.error("unescaped '-' in character class")),
                Some(_) => {
                    let start_pos = self.pos;
                    let start = self.class_char()?;
                    let is_single = self.pos - start_pos == 1 || (start.starts_with('\\') && start.len() == 2);
                    let is_range = is_single
                        && self.peek() == Some('-')
                        && !matches!(self.chars.get(self.pos + 1), Some(']') | Some('[') | None);
                    if is_range {
                        self.pos += 1;
                        let end = self.class_char()?;
                        let lo = range_endpoint(&start);
                        let hi = range_endpoint(&end);
                        match (lo, hi) {
                            (Some(lo), Some(hi)) if lo <= hi => {}
                            (Some(_), Some(_)) => return Err(self.error("character range is out of order")),
                            _ => return Err(self.error("invalid character range endpoint")),
                        }
                        items.push_str(&start);
                        items.push('-');
                        items.push_str(&end);
                    } else {
                        items.push_str(&start);
                    }
                }
            }
            first = false;
        }
        let caret = if negated { "^" } else { "" };
        Ok(format!("[{}{}]", caret, items))
    }
}

/// Character denoted by a translated single-character class item
fn range_endpoint(item: &str) -> Option<char> {
    let mut chars = item.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(c), None, _) => Some(c),
        (Some('\\'), Some('n'), None) => Some('\n'),
        (Some('\\'), Some('r'), None) => Some('\r'),
        (Some('\\'), Some('t'), None) => Some('\t'),
        (Some('\\'), Some(c), None) if !c.is_ascii_alphanumeric() => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, value: &str) -> bool {
        compile_pattern(pattern).unwrap().is_match(value)
    }

    #[test]
    fn test_anchoring() {
        assert!(matches("[0-9]{3}", "123"));
        assert!(!matches("[0-9]{3}", "1234"));
        assert!(!matches("a|b", "ab"));
    }

    #[test]
    fn test_literal_anchors_are_plain_chars() {
        assert!(matches("^a$", "^a$"));
        assert!(!matches("^a$", "a"));
    }

    #[test]
    fn test_multichar_escapes() {
        assert!(matches(r"\i\c*", "_abc-1.2"));
        assert!(!matches(r"\i\c*", "1abc"));
        assert!(matches(r"\s+", " \t\n"));
        assert!(matches(r"\d+", "0123"));
        assert!(matches(r"\w+", "héllo"));
        assert!(!matches(r"\w", "!"));
        assert!(matches(".", "x"));
        assert!(!matches(".", "\n"));
    }

    #[test]
    fn test_properties_and_blocks() {
        assert!(matches(r"\p{Lu}+", "ABC"));
        assert!(!matches(r"\p{Lu}", "a"));
        assert!(matches(r"\p{IsBasicLatin}+", "abc"));
        assert!(!matches(r"\p{IsBasicLatin}", "é"));
        assert!(matches(r"\P{IsBasicLatin}", "é"));
        assert!(compile_pattern(r"\p{IsNoSuchBlock}").is_err());
        assert!(compile_pattern(r"\p{Xx}").is_err());
    }

    #[test]
    fn test_class_subtraction() {
        assert!(matches("[a-z-[aeiou]]+", "bcd"));
        assert!(!matches("[a-z-[aeiou]]", "a"));
        assert!(matches("[^a-z-[0-9]]", "A"));
        assert!(!matches("[^a-z-[0-9]]", "5"));
    }

    #[test]
    fn test_class_literals() {
        assert!(matches("[-a]", "-"));
        assert!(matches("[a-]", "-"));
        assert!(matches("[&~^]+", "&~^"));
        assert!(matches(r"[\-\[\]]+", "-[]"));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["(?i)a", "a**", "a{2,1}", "[]", "(a", "a)", r"\q", "[z-a]", "*a", "a{,3}", r"\1"] {
            let err = compile_pattern(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::PatternSyntax, "pattern {}", bad);
        }
    }

    #[test]
    fn test_pattern_set_is_a_disjunction() {
        let re = compile_pattern_set(["[0-9]+", "[a-z]+"]).unwrap();
        assert!(re.is_match("123"));
        assert!(re.is_match("abc"));
        assert!(!re.is_match("a1"));
    }
}
