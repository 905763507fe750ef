//! Field and number primitives for AT-style parameter lists
//!
//! A parameter list is split into fields on commas that are not inside a
//! double-quoted string. Index 0 always holds the command or notification
//! name (`%NCELLMEAS`), so the first parameter is at index 1.

use crate::error::DecodeError;

/// One comma-delimited field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    /// Field text with surrounding whitespace and quotes removed
    pub text: &'a str,
    /// Whether the field was a quoted string on the wire
    pub quoted: bool,
}

/// Tokenized parameter list
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    fields: Vec<Field<'a>>,
}

impl<'a> Fields<'a> {
    /// Tokenize a notification such as `%NCELLMEAS: 0,"00011B07",...`
    ///
    /// Everything before the first `:` becomes field 0.
    pub fn parse_notification(text: &'a str) -> Result<Self, DecodeError> {
        let text = text.trim_end_matches(&['\r', '\n'][..]);
        let (name, params) = text
            .split_once(':')
            .ok_or_else(|| DecodeError::malformed("missing ':' after notification name"))?;
        Self::parse_with_name(name.trim(), params)
    }

    /// Tokenize `params` with `name` as field 0
    pub fn parse_with_name(name: &'a str, params: &'a str) -> Result<Self, DecodeError> {
        let mut fields = Vec::with_capacity(char_frequency(params, ',') + 2);
        fields.push(Field {
            text: name,
            quoted: false,
        });

        if params.trim().is_empty() {
            return Ok(Self { fields });
        }

        let mut in_quotes = false;
        let mut start = 0;
        for (i, c) in params.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => {
                    fields.push(make_field(&params[start..i])?);
                    start = i + 1;
                }
                _ => {}
            }
        }
        if in_quotes {
            return Err(DecodeError::malformed("unterminated quoted string"));
        }
        fields.push(make_field(&params[start..])?);

        Ok(Self { fields })
    }

    /// Number of fields, including the name at index 0
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, idx: usize) -> Result<Field<'a>, DecodeError> {
        self.fields
            .get(idx)
            .copied()
            .ok_or_else(|| DecodeError::malformed(format!("missing field {idx}")))
    }

    /// Read an unquoted decimal integer
    pub fn int(&self, idx: usize, name: &'static str) -> Result<i64, DecodeError> {
        let field = self.get(idx)?;
        if field.quoted {
            return Err(DecodeError::malformed(format!(
                "{name} (field {idx}) must be numeric, got string"
            )));
        }
        str_to_int(field.text, 10)
            .map_err(|_| DecodeError::malformed(format!("{name} (field {idx}): {:?}", field.text)))
    }

    /// Read an unquoted decimal integer that must fit in an `i32`
    pub fn int32(&self, idx: usize, name: &'static str) -> Result<i32, DecodeError> {
        let value = self.int(idx, name)?;
        i32::try_from(value).map_err(|_| DecodeError::OutOfRange { field: name, value })
    }

    /// Read a quoted string
    pub fn string(&self, idx: usize, name: &'static str) -> Result<&'a str, DecodeError> {
        let field = self.get(idx)?;
        if !field.quoted {
            return Err(DecodeError::malformed(format!(
                "{name} (field {idx}) must be a quoted string"
            )));
        }
        Ok(field.text)
    }

    /// Read a quoted string holding a hexadecimal number
    pub fn hex_string(&self, idx: usize, name: &'static str) -> Result<i64, DecodeError> {
        let text = self.string(idx, name)?;
        str_to_int(text, 16)
            .map_err(|_| DecodeError::malformed(format!("{name} (field {idx}): {text:?}")))
    }

    /// Read a quoted PLMN string and split it into MCC and MNC
    pub fn plmn(&self, idx: usize) -> Result<(i32, i32), DecodeError> {
        split_plmn(self.string(idx, "plmn")?)
    }
}

fn make_field(raw: &str) -> Result<Field<'_>, DecodeError> {
    let raw = raw.trim();
    match raw.strip_prefix('"') {
        Some(rest) => {
            let text = rest
                .strip_suffix('"')
                .ok_or_else(|| DecodeError::malformed(format!("stray quote in {raw:?}")))?;
            if text.contains('"') {
                return Err(DecodeError::malformed(format!("stray quote in {raw:?}")));
            }
            Ok(Field { text, quoted: true })
        }
        None if raw.contains('"') => Err(DecodeError::malformed(format!("stray quote in {raw:?}"))),
        None => Ok(Field {
            text: raw,
            quoted: false,
        }),
    }
}

/// Strict string to integer conversion
///
/// The whole string must be consumed: no empty input, no trailing characters.
/// An optional leading sign is accepted.
pub fn str_to_int(text: &str, radix: u32) -> Result<i64, DecodeError> {
    let digits = text.strip_prefix(&['+', '-'][..]).unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(DecodeError::malformed(format!(
            "{text:?} is not a base {radix} integer"
        )));
    }
    i64::from_str_radix(text, radix)
        .map_err(|_| DecodeError::malformed(format!("{text:?} does not fit in 64 bits")))
}

/// Split a PLMN string into `(mcc, mnc)`
///
/// The MCC is always the first three digits; the remaining two or three digits
/// are the MNC. `"31026"` gives `(310, 26)` and `"310260"` gives `(310, 260)`.
pub fn split_plmn(plmn: &str) -> Result<(i32, i32), DecodeError> {
    if !(5..=6).contains(&plmn.len()) || !plmn.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::malformed(format!("invalid PLMN {plmn:?}")));
    }
    let (mcc, mnc) = plmn.split_at(3);
    // At most three ASCII digits each, so the conversions cannot overflow.
    let mcc = str_to_int(mcc, 10)? as i32;
    let mnc = str_to_int(mnc, 10)? as i32;
    Ok((mcc, mnc))
}

/// Count occurrences of `c` in `text`
pub fn char_frequency(text: &str, c: char) -> usize {
    text.chars().filter(|&x| x == c).count()
}
