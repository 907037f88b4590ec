//! Row → JSON Conversion
//!
//! Generic conversion of `tokio_postgres` rows into JSON objects, by
//! column type OID. The gateway has no compile-time knowledge of any
//! table, so every supported scalar and array type is handled here;
//! anything unrecognized falls back to a best-effort string and finally
//! to null.
//!
//! NUMERIC is decoded from its binary wire form into a decimal string so
//! arbitrary-precision values survive the trip without float rounding.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres_types::{FromSql, Kind, Type};
use serde_json::{json, Map, Value as JsonValue};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// ROW CONVERSION
// ============================================================================

/// Convert a full row into a JSON object keyed by column name.
pub fn row_to_json(row: &Row) -> ApiResult<JsonValue> {
    let mut object = Map::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), cell_to_json(row, idx)?);
    }
    Ok(JsonValue::Object(object))
}

/// Convert a batch of rows.
pub fn rows_to_json(rows: &[Row]) -> ApiResult<Vec<JsonValue>> {
    rows.iter().map(row_to_json).collect()
}

fn cell_to_json(row: &Row, idx: usize) -> ApiResult<JsonValue> {
    let ty = row.columns()[idx].type_().clone();

    let value = if ty == Type::BOOL {
        opt(row, idx, JsonValue::Bool)?
    } else if ty == Type::INT2 {
        opt(row, idx, |v: i16| json!(v))?
    } else if ty == Type::INT4 {
        opt(row, idx, |v: i32| json!(v))?
    } else if ty == Type::INT8 {
        opt(row, idx, |v: i64| json!(v))?
    } else if ty == Type::FLOAT4 {
        opt(row, idx, |v: f32| float_json(v as f64))?
    } else if ty == Type::FLOAT8 {
        opt(row, idx, float_json)?
    } else if ty == Type::NUMERIC {
        opt(row, idx, |v: PgNumeric| JsonValue::String(v.0))?
    } else if ty == Type::UUID {
        opt(row, idx, |v: Uuid| JsonValue::String(v.to_string()))?
    } else if ty == Type::TIMESTAMPTZ {
        opt(row, idx, |v: DateTime<Utc>| JsonValue::String(v.to_rfc3339()))?
    } else if ty == Type::TIMESTAMP {
        opt(row, idx, |v: NaiveDateTime| {
            JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        })?
    } else if ty == Type::DATE {
        opt(row, idx, |v: NaiveDate| JsonValue::String(v.to_string()))?
    } else if ty == Type::TIME {
        opt(row, idx, |v: NaiveTime| JsonValue::String(v.to_string()))?
    } else if ty == Type::JSON || ty == Type::JSONB {
        opt(row, idx, |v: JsonValue| v)?
    } else if ty == Type::BYTEA {
        opt(row, idx, |v: Vec<u8>| JsonValue::String(BASE64_STANDARD.encode(v)))?
    } else if ty == Type::TEXT || ty == Type::VARCHAR || ty == Type::BPCHAR || ty == Type::NAME {
        opt(row, idx, JsonValue::String)?
    } else if matches!(ty.kind(), Kind::Array(_)) {
        array_cell(row, idx, &ty)?
    } else {
        fallback_cell(row, idx)
    };

    Ok(value)
}

/// Decode one nullable cell via a closure over the decoded value.
fn opt<'a, T, F>(row: &'a Row, idx: usize, convert: F) -> ApiResult<JsonValue>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> JsonValue,
{
    let value: Option<T> = row
        .try_get(idx)
        .map_err(|e| ApiError::internal_error(format!("Failed to decode column: {e}")))?;
    Ok(value.map(convert).unwrap_or(JsonValue::Null))
}

fn float_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn array_cell(row: &Row, idx: usize, ty: &Type) -> ApiResult<JsonValue> {
    let Kind::Array(inner) = ty.kind() else {
        return Ok(fallback_cell(row, idx));
    };

    let value = if *inner == Type::BOOL {
        opt(row, idx, |v: Vec<bool>| json!(v))?
    } else if *inner == Type::INT2 {
        opt(row, idx, |v: Vec<i16>| json!(v))?
    } else if *inner == Type::INT4 {
        opt(row, idx, |v: Vec<i32>| json!(v))?
    } else if *inner == Type::INT8 {
        opt(row, idx, |v: Vec<i64>| json!(v))?
    } else if *inner == Type::FLOAT4 {
        opt(row, idx, |v: Vec<f32>| json!(v))?
    } else if *inner == Type::FLOAT8 {
        opt(row, idx, |v: Vec<f64>| json!(v))?
    } else if *inner == Type::UUID {
        opt(row, idx, |v: Vec<Uuid>| {
            json!(v.iter().map(Uuid::to_string).collect::<Vec<_>>())
        })?
    } else if *inner == Type::TEXT || *inner == Type::VARCHAR || *inner == Type::NAME {
        opt(row, idx, |v: Vec<String>| json!(v))?
    } else {
        fallback_cell(row, idx)
    };
    Ok(value)
}

/// Last-resort decoding for exotic types: try text, else null.
fn fallback_cell(row: &Row, idx: usize) -> JsonValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(text)) => JsonValue::String(text),
        Ok(None) => JsonValue::Null,
        Err(_) => {
            tracing::debug!(
                column = row.columns()[idx].name(),
                r#type = %row.columns()[idx].type_(),
                "Unsupported column type; rendering null"
            );
            JsonValue::Null
        }
    }
}

// ============================================================================
// NUMERIC DECODING
// ============================================================================

/// A NUMERIC value decoded to its decimal string representation.
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        numeric_to_string(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

/// Decode the binary NUMERIC wire format: a header of (ndigits, weight,
/// sign, dscale) followed by base-10000 digit groups.
fn numeric_to_string(raw: &[u8]) -> Result<String, Box<dyn std::error::Error + Sync + Send>> {
    if raw.len() < 8 {
        return Err("numeric value too short".into());
    }
    let ndigits = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]) as i32;
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = u16::from_be_bytes([raw[6], raw[7]]) as usize;

    if sign == NUMERIC_NAN {
        return Ok("NaN".to_string());
    }
    if raw.len() < 8 + ndigits * 2 {
        return Err("numeric digit groups truncated".into());
    }

    let digits: Vec<u16> = (0..ndigits)
        .map(|i| u16::from_be_bytes([raw[8 + i * 2], raw[9 + i * 2]]))
        .collect();

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    // Integer part: digit group i carries exponent (weight - i).
    if weight >= 0 {
        for i in 0..=(weight as usize) {
            let group = digits.get(i).copied().unwrap_or(0);
            if i == 0 {
                out.push_str(&group.to_string());
            } else {
                out.push_str(&format!("{group:04}"));
            }
        }
    } else {
        out.push('0');
    }

    if dscale > 0 {
        let mut frac = String::new();
        let groups = dscale.div_ceil(4);
        for exp in 1..=groups {
            let i = weight + exp as i32;
            let group = if i >= 0 {
                digits.get(i as usize).copied().unwrap_or(0)
            } else {
                0
            };
            frac.push_str(&format!("{group:04}"));
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_numeric(digits: &[u16], weight: i16, sign: u16, dscale: u16) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    #[test]
    fn test_numeric_integer() {
        // 12 * 10000 + 3456 = 123456
        let raw = encode_numeric(&[12, 3456], 1, 0, 0);
        assert_eq!(numeric_to_string(&raw).unwrap(), "123456");
    }

    #[test]
    fn test_numeric_fraction() {
        // 1.5 → digits [1, 5000], weight 0, dscale 1
        let raw = encode_numeric(&[1, 5000], 0, 0, 1);
        assert_eq!(numeric_to_string(&raw).unwrap(), "1.5");
    }

    #[test]
    fn test_numeric_small_fraction() {
        // 0.00001234 → digits [1234], weight -2, dscale 8
        let raw = encode_numeric(&[1234], -2, 0, 8);
        assert_eq!(numeric_to_string(&raw).unwrap(), "0.00001234");
    }

    #[test]
    fn test_numeric_negative() {
        let raw = encode_numeric(&[42], 0, NUMERIC_NEG, 0);
        assert_eq!(numeric_to_string(&raw).unwrap(), "-42");
    }

    #[test]
    fn test_numeric_nan() {
        let raw = encode_numeric(&[], 0, NUMERIC_NAN, 0);
        assert_eq!(numeric_to_string(&raw).unwrap(), "NaN");
    }

    #[test]
    fn test_numeric_trailing_zero_scale() {
        // 2.50 → digits [2, 5000], weight 0, dscale 2
        let raw = encode_numeric(&[2, 5000], 0, 0, 2);
        assert_eq!(numeric_to_string(&raw).unwrap(), "2.50");
    }

    #[test]
    fn test_numeric_zero() {
        let raw = encode_numeric(&[], 0, 0, 0);
        assert_eq!(numeric_to_string(&raw).unwrap(), "0");
    }
}
