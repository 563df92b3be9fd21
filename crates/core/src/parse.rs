//! Text to number conversion for delimited input.
//!
//! Nothing is coerced: empty fields, garbage and non-finite values are errors,
//! since a single NaN would poison every sum it reaches.

use std::str::FromStr;

use num_traits::Float;

use crate::error::{CorrError, Result};

pub fn parse_value<T>(field: &str) -> Result<T>
where
    T: Float + FromStr,
{
    let fail = || CorrError::Parse {
        value: field.to_string(),
        target: std::any::type_name::<T>(),
    };
    let value: T = field.trim().parse().map_err(|_| fail())?;
    if !value.is_finite() {
        return Err(fail());
    }
    Ok(value)
}

/// Parses one record into `buf`, appending exactly `expected` values. On error
/// `buf` is left as it was.
pub fn parse_row_into<'a, T, I>(buf: &mut Vec<T>, fields: I, expected: usize) -> Result<()>
where
    T: Float + FromStr,
    I: IntoIterator<Item = &'a str>,
{
    let start = buf.len();
    let mut found = 0;
    for field in fields {
        found += 1;
        if found > expected {
            continue;
        }
        match parse_value(field) {
            Ok(v) => buf.push(v),
            Err(e) => {
                buf.truncate(start);
                return Err(e);
            }
        }
    }
    if found != expected {
        buf.truncate(start);
        return Err(CorrError::ColumnCountMismatch { expected, found });
    }
    Ok(())
}

pub fn parse_row<'a, T, I>(fields: I, expected: usize) -> Result<Vec<T>>
where
    T: Float + FromStr,
    I: IntoIterator<Item = &'a str>,
{
    let mut row = Vec::with_capacity(expected);
    parse_row_into(&mut row, fields, expected)?;
    Ok(row)
}
