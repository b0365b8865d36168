// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion of raw property text into typed fields.
//!
//! Property values arrive as text, in the "parsable" (`-p`) form of the
//! tools: byte counts are exact integers, but percentages keep their `%` and
//! ratios keep their `x` multiplier.
//!
//! The `-` sentinel, which the tools print when a property does not apply,
//! is not a number and is rejected by every numeric coercion.

use crate::ParseError;
use std::fmt;

/// The kind of number a property was expected to hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberKind {
    Unsigned,
    Percent,
    Ratio,
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NumberKind::Unsigned => "unsigned integer",
            NumberKind::Percent => "percentage",
            NumberKind::Ratio => "ratio",
        };
        write!(f, "{s}")
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed {kind} value: {value:?}")]
pub struct MalformedNumber {
    pub value: String,
    pub kind: NumberKind,
}

impl MalformedNumber {
    fn new(value: &str, kind: NumberKind) -> Self {
        Self { value: value.to_string(), kind }
    }
}

pub fn to_string(text: &str) -> String {
    text.to_string()
}

/// Parses a base-10, non-negative integer. Only ASCII digits are accepted,
/// so neither a sign nor surrounding whitespace is.
pub fn to_unsigned_int(text: &str) -> Result<u64, MalformedNumber> {
    let malformed = || MalformedNumber::new(text, NumberKind::Unsigned);
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    text.parse::<u64>().map_err(|_| malformed())
}

/// Parses the integer in front of the first `%`, or the whole text if there
/// is no `%` at all.
pub fn to_percent_int(text: &str) -> Result<u64, MalformedNumber> {
    let digits = match text.find('%') {
        Some(i) => &text[..i],
        None => text,
    };
    to_unsigned_int(digits)
        .map_err(|_| MalformedNumber::new(text, NumberKind::Percent))
}

/// Parses a ratio such as `1.23x`.
///
/// A single trailing non-digit (the multiplier suffix) is stripped first. If
/// the text already ends in a digit nothing is stripped, so `1.23` is
/// accepted as well.
pub fn to_ratio_float(text: &str) -> Result<f64, MalformedNumber> {
    let digits = match text.chars().next_back() {
        Some(c) if !c.is_ascii_digit() => &text[..text.len() - c.len_utf8()],
        _ => text,
    };
    digits
        .parse::<f64>()
        .map_err(|_| MalformedNumber::new(text, NumberKind::Ratio))
}

/// A field of `T` paired with the coercion which fills it.
pub enum Field<T> {
    Text(fn(&mut T) -> &mut String),
    Unsigned(fn(&mut T) -> &mut u64),
    Percent(fn(&mut T) -> &mut u64),
    Ratio(fn(&mut T) -> &mut f64),
}

impl<T> Field<T> {
    /// Coerces `raw` and stores it into the field of `target`.
    pub fn apply(&self, target: &mut T, raw: &str) -> Result<(), MalformedNumber> {
        match self {
            Field::Text(field) => *field(target) = to_string(raw),
            Field::Unsigned(field) => {
                let value = to_unsigned_int(raw)?;
                *field(target) = value;
            }
            Field::Percent(field) => {
                let value = to_percent_int(raw)?;
                *field(target) = value;
            }
            Field::Ratio(field) => {
                let value = to_ratio_float(raw)?;
                *field(target) = value;
            }
        }
        Ok(())
    }
}

/// One entry of a property schema: the name the tools know a property by,
/// and where its value goes.
pub struct Property<T> {
    pub name: &'static str,
    pub field: Field<T>,
}

/// Joins the names of a schema into the argument of `-o`, preserving order.
pub fn projection<T>(schema: &[Property<T>]) -> String {
    schema.iter().map(|p| p.name).collect::<Vec<_>>().join(",")
}

impl<T> Property<T> {
    fn apply(&self, target: &mut T, raw: &str) -> Result<(), ParseError> {
        self.field.apply(target, raw).map_err(|err| {
            ParseError::MalformedNumber { property: self.name.to_string(), err }
        })
    }
}

/// Stores each column of `row` into the field at the same position of
/// `schema`.
///
/// The row must have a column for every entry of the schema; trailing extra
/// columns are ignored.
pub(crate) fn apply_columns<T>(
    schema: &[Property<T>],
    target: &mut T,
    row: &[String],
) -> Result<(), ParseError> {
    if row.len() < schema.len() {
        return Err(ParseError::ShortRow {
            expected: schema.len(),
            found: row.len(),
        });
    }
    for (property, raw) in schema.iter().zip(row) {
        property.apply(target, raw)?;
    }
    Ok(())
}

/// Stores `raw` into the field named `name`.
///
/// Returns false, without error, for names the schema does not know.
pub(crate) fn apply_named<T>(
    schema: &[Property<T>],
    target: &mut T,
    name: &str,
    raw: &str,
) -> Result<bool, ParseError> {
    match schema.iter().find(|p| p.name == name) {
        Some(property) => {
            property.apply(target, raw)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
