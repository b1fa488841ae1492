//! Encodes driver values as CQL literal text for a known column type.
//!
//! `None` is the "no value" marker: the column should be left out of the
//! statement rather than written with a default.

use chrono::{DateTime, NaiveTime, Utc};

use crate::cql_type::{ColumnType, LiteralClass, ScalarType};
use crate::errors::SyncError;
use crate::types::ColumnValue;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// Encode `value` against the declared `column_type`.
///
/// Returns `Ok(None)` for nulls and for unset (epoch zero) timestamps.
/// A value whose shape disagrees with the column type, or a type that has
/// no literal form, is an [`SyncError::EncodingError`].
pub fn encode(value: &ColumnValue, column_type: &ColumnType) -> Result<Option<String>, SyncError> {
    match (value, column_type.unfrozen()) {
        (ColumnValue::Null, _) => Ok(None),
        (ColumnValue::Timestamp(0), ColumnType::Scalar(ScalarType::Timestamp)) => Ok(None),
        _ => literal(value, column_type).map(Some),
    }
}

/// Single-quote `text`, doubling embedded quotes.
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn literal(value: &ColumnValue, column_type: &ColumnType) -> Result<String, SyncError> {
    match (column_type.unfrozen(), value) {
        (ColumnType::List(elem), ColumnValue::List(items)) => {
            Ok(format!("[{}]", join_elements(items, elem)?))
        }
        (ColumnType::Set(elem), ColumnValue::Set(items) | ColumnValue::List(items)) => {
            Ok(format!("{{{}}}", join_elements(items, elem)?))
        }
        (ColumnType::Map(key_type, value_type), ColumnValue::Map(entries)) => {
            let pairs = entries
                .iter()
                .map(|(k, v)| Ok(format!("{}:{}", literal(k, key_type)?, literal(v, value_type)?)))
                .collect::<Result<Vec<_>, SyncError>>()?;
            Ok(format!("{{{}}}", pairs.join(",")))
        }
        (ColumnType::Scalar(scalar), _) => scalar_literal(*scalar, value),
        (ColumnType::Custom(name), _) => Err(SyncError::EncodingError(format!(
            "column type {} has no literal encoding",
            name
        ))),
        (other, _) => Err(mismatch(value, other)),
    }
}

fn join_elements(items: &[ColumnValue], elem: &ColumnType) -> Result<String, SyncError> {
    let encoded = items
        .iter()
        .map(|item| literal(item, elem))
        .collect::<Result<Vec<_>, SyncError>>()?;
    Ok(encoded.join(","))
}

fn scalar_literal(scalar: ScalarType, value: &ColumnValue) -> Result<String, SyncError> {
    let literal = match (scalar.literal_class(), value) {
        (_, ColumnValue::Unsupported(description)) => {
            return Err(SyncError::EncodingError(format!(
                "cannot encode {} value for a {} column",
                description,
                scalar.name()
            )))
        }
        (LiteralClass::Unsupported, _) => {
            return Err(SyncError::EncodingError(format!(
                "{} values have no literal encoding",
                scalar.name()
            )))
        }
        (LiteralClass::Text, ColumnValue::Text(text)) => quote(text),
        (LiteralClass::Text, ColumnValue::Inet(addr)) => quote(&addr.to_string()),
        (LiteralClass::Numeric, ColumnValue::TinyInt(v)) => v.to_string(),
        (LiteralClass::Numeric, ColumnValue::SmallInt(v)) => v.to_string(),
        (LiteralClass::Numeric, ColumnValue::Int(v)) => v.to_string(),
        (LiteralClass::Numeric, ColumnValue::BigInt(v) | ColumnValue::Counter(v)) => v.to_string(),
        (LiteralClass::Numeric, ColumnValue::Float(v)) => {
            float_literal(v.to_string(), v.is_nan(), v.is_infinite(), v.is_sign_negative())
        }
        (LiteralClass::Numeric, ColumnValue::Double(v)) => {
            float_literal(v.to_string(), v.is_nan(), v.is_infinite(), v.is_sign_negative())
        }
        (LiteralClass::Boolean, ColumnValue::Boolean(v)) => v.to_string(),
        (LiteralClass::Timestamp, ColumnValue::Timestamp(millis)) => timestamp_literal(*millis)?,
        (LiteralClass::Date, ColumnValue::Date(date)) => quote(&date.format("%Y-%m-%d").to_string()),
        (LiteralClass::Time, ColumnValue::Time(nanos)) => time_literal(*nanos)?,
        (LiteralClass::Uuid, ColumnValue::Uuid(id)) => id.to_string(),
        (LiteralClass::Blob, ColumnValue::Blob(bytes)) => format!("0x{}", hex::encode(bytes)),
        _ => return Err(mismatch(value, &ColumnType::Scalar(scalar))),
    };
    Ok(literal)
}

fn float_literal(display: String, nan: bool, infinite: bool, negative: bool) -> String {
    match (nan, infinite, negative) {
        (true, _, _) => "NaN".to_string(),
        (false, true, false) => "Infinity".to_string(),
        (false, true, true) => "-Infinity".to_string(),
        _ => display,
    }
}

fn timestamp_literal(millis: i64) -> Result<String, SyncError> {
    let at: DateTime<Utc> = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        SyncError::EncodingError(format!("timestamp {}ms is out of range", millis))
    })?;
    Ok(quote(&at.format("%Y-%m-%d %H:%M:%S").to_string()))
}

fn time_literal(nanos: i64) -> Result<String, SyncError> {
    let out_of_range = || SyncError::EncodingError(format!("time {}ns is not a time of day", nanos));

    if !(0..SECONDS_PER_DAY * NANOS_PER_SECOND).contains(&nanos) {
        return Err(out_of_range());
    }
    let secs = (nanos / NANOS_PER_SECOND) as u32;
    let frac = (nanos % NANOS_PER_SECOND) as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, frac).ok_or_else(out_of_range)?;
    Ok(quote(&time.format("%H:%M:%S%.9f").to_string()))
}

fn mismatch(value: &ColumnValue, column_type: &ColumnType) -> SyncError {
    SyncError::EncodingError(format!(
        "{} value does not match column type {}",
        value.shape(),
        column_type
    ))
}
