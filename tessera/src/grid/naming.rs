//! Address tokens for tiles.
//!
//! A scheme is a template such as `"tile_e{e}_r{r:02}_c{c:02}.tif"`. Each of
//! `{e}`, `{r}` and `{c}` appears exactly once; an optional `:N` zero-pads the
//! number to at least `N` digits. Parsing reads the whole digit run, which must
//! be at least `N` digits long for a padded placeholder.

use crate::error::{Error, Result};
use crate::grid::TileKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Step,
    Row,
    Col,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Field { axis: Axis, width: Option<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
    pattern: String,
    tokens: Vec<Token>,
}

impl NamingScheme {
    pub fn new(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidNamingScheme {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    let mut spec = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => spec.push(c),
                            None => return Err(invalid("unclosed '{'")),
                        }
                    }
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(parse_field(&spec).ok_or_else(|| {
                        invalid("placeholders are {e}, {r} or {c} with an optional :width")
                    })?);
                }
                '}' => return Err(invalid("unmatched '}'")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        for axis in [Axis::Step, Axis::Row, Axis::Col] {
            let count = tokens
                .iter()
                .filter(|t| matches!(t, Token::Field { axis: a, .. } if *a == axis))
                .count();
            if count != 1 {
                return Err(invalid("each of {e}, {r} and {c} must appear exactly once"));
            }
        }

        // Numbers are read greedily, so whatever follows must not start with a digit.
        for pair in tokens.windows(2) {
            if matches!(pair[0], Token::Field { .. }) {
                let ambiguous = match &pair[1] {
                    Token::Field { .. } => true,
                    Token::Literal(text) => text.starts_with(|c: char| c.is_ascii_digit()),
                };
                if ambiguous {
                    return Err(invalid(
                        "a placeholder must be followed by a non-digit separator",
                    ));
                }
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            tokens,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn format(&self, key: TileKey) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Field { axis, width } => {
                    let value = key_value(key, *axis);
                    let digits = match width {
                        Some(w) => format!("{:0width$}", value, width = *w),
                        None => value.to_string(),
                    };
                    out.push_str(&digits);
                }
            }
        }
        out
    }

    /// Recovers the key from a full address token, or `None` if it does not match.
    pub fn parse(&self, address: &str) -> Option<TileKey> {
        let mut rest = address;
        let mut key = TileKey { e: 0, r: 0, c: 0 };
        for token in &self.tokens {
            match token {
                Token::Literal(text) => rest = rest.strip_prefix(text.as_str())?,
                Token::Field { axis, width } => {
                    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
                    if digits == 0 || width.is_some_and(|w| digits < w) {
                        return None;
                    }
                    let value: u32 = rest[..digits].parse().ok()?;
                    match axis {
                        Axis::Step => key.e = value,
                        Axis::Row => key.r = value,
                        Axis::Col => key.c = value,
                    }
                    rest = &rest[digits..];
                }
            }
        }
        rest.is_empty().then_some(key)
    }
}

fn parse_field(spec: &str) -> Option<Token> {
    let (name, width) = match spec.split_once(':') {
        Some((name, width)) => {
            let width: usize = width.parse().ok()?;
            if width == 0 {
                return None;
            }
            (name, Some(width))
        }
        None => (spec, None),
    };
    let axis = match name {
        "e" => Axis::Step,
        "r" => Axis::Row,
        "c" => Axis::Col,
        _ => return None,
    };
    Some(Token::Field { axis, width })
}

fn key_value(key: TileKey, axis: Axis) -> u32 {
    match axis {
        Axis::Step => key.e,
        Axis::Row => key.r,
        Axis::Col => key.c,
    }
}
