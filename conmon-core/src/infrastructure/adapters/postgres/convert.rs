// conmon-core/src/infrastructure/adapters/postgres/convert.rs

//! `serde_json::Value` <-> Postgres wire types.
//!
//! Parameters are typed by the server (prepared statement), so a JSON value
//! is encoded according to the column type it lands in.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::Row as PgRow;
use postgres_types::{IsNull, Json, ToSql, Type, to_sql_checked};
use serde_json::{Number, Value};
use std::error::Error;
use tracing::warn;

use crate::domain::query::Row;

type BoxError = Box<dyn Error + Sync + Send>;

/// Statement parameter borrowed from a query's parameter list.
#[derive(Debug)]
pub struct SqlParam<'a>(pub &'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let value = self.0;
        if value.is_null() {
            return Ok(IsNull::Yes);
        }

        if *ty == Type::JSON || *ty == Type::JSONB {
            // Colonne jsonb: un texte contenant du JSON est stocké décodé.
            if let Value::String(s) = value {
                if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                    if parsed.is_object() || parsed.is_array() {
                        return Json(&parsed).to_sql(ty, out);
                    }
                }
            }
            return Json(value).to_sql(ty, out);
        }
        if *ty == Type::BOOL {
            return as_bool(value)?.to_sql(ty, out);
        }
        if *ty == Type::INT2 {
            return i16::try_from(as_i64(value)?)?.to_sql(ty, out);
        }
        if *ty == Type::INT4 {
            return i32::try_from(as_i64(value)?)?.to_sql(ty, out);
        }
        if *ty == Type::INT8 {
            return as_i64(value)?.to_sql(ty, out);
        }
        if *ty == Type::FLOAT4 {
            return (as_f64(value)? as f32).to_sql(ty, out);
        }
        if *ty == Type::FLOAT8 {
            return as_f64(value)?.to_sql(ty, out);
        }
        if *ty == Type::TIMESTAMPTZ {
            let s = as_text(value);
            let ts = DateTime::parse_from_rfc3339(&s)?.with_timezone(&Utc);
            return ts.to_sql(ty, out);
        }
        if *ty == Type::TIMESTAMP {
            let s = as_text(value);
            let ts = DateTime::parse_from_rfc3339(&s)
                .map(|d| d.naive_utc())
                .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f"))?;
            return ts.to_sql(ty, out);
        }
        if *ty == Type::DATE {
            return NaiveDate::parse_from_str(&as_text(value), "%Y-%m-%d")?.to_sql(ty, out);
        }
        if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
            let items: Vec<String> = match value {
                Value::Array(items) => items.iter().map(as_text).collect(),
                other => vec![as_text(other)],
            };
            return items.to_sql(ty, out);
        }
        if <String as ToSql>::accepts(ty) {
            return as_text(value).to_sql(ty, out);
        }
        Err(format!("cannot encode {} as {}", value, ty).into())
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn as_bool(value: &Value) -> Result<bool, BoxError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        other => Err(format!("expected boolean, got {}", other).into()),
    }
}

fn as_i64(value: &Value) -> Result<i64, BoxError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("{} is not an integer", n).into()),
        Value::String(s) => Ok(s.trim().parse::<i64>()?),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(format!("expected integer, got {}", other).into()),
    }
}

fn as_f64(value: &Value) -> Result<f64, BoxError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{} is not a float", n).into()),
        Value::String(s) => Ok(s.trim().parse::<f64>()?),
        other => Err(format!("expected number, got {}", other).into()),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes a result row by column type. Types without a mapping read as null.
pub fn row_to_json(row: &PgRow) -> Result<Row, postgres::Error> {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(i)?.map(Value::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(i)?.map(Value::from)
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(i)?.map(Value::from)
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(i)?.map(Value::from)
        } else if *ty == Type::OID {
            row.try_get::<_, Option<u32>>(i)?.map(Value::from)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(i)?
                .and_then(|f| Number::from_f64(f64::from(f)))
                .map(Value::Number)
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(i)?
                .and_then(Number::from_f64)
                .map(Value::Number)
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            row.try_get::<_, Option<Value>>(i)?
        } else if *ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<DateTime<Utc>>>(i)?
                .map(|t| Value::String(t.to_rfc3339()))
        } else if *ty == Type::TIMESTAMP {
            row.try_get::<_, Option<NaiveDateTime>>(i)?
                .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
        } else if *ty == Type::DATE {
            row.try_get::<_, Option<NaiveDate>>(i)?
                .map(|d| Value::String(d.to_string()))
        } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
            row.try_get::<_, Option<Vec<String>>>(i)?
                .map(|items| Value::Array(items.into_iter().map(Value::String).collect()))
        } else if <String as postgres_types::FromSql>::accepts(ty) {
            row.try_get::<_, Option<String>>(i)?.map(Value::String)
        } else {
            warn!(column = column.name(), column_type = %ty, "No JSON mapping for column type, reading null");
            None
        };
        out.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: Value, ty: &Type) -> Result<(IsNull, BytesMut), BoxError> {
        let mut out = BytesMut::new();
        let is_null = SqlParam(&value).to_sql(ty, &mut out)?;
        Ok((is_null, out))
    }

    #[test]
    fn test_null_is_sql_null_for_any_type() {
        let (is_null, out) = encode(Value::Null, &Type::INT8).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn test_integers_follow_column_width() {
        let (_, out) = encode(json!(7), &Type::INT4).unwrap();
        assert_eq!(&out[..], &7i32.to_be_bytes());
        let (_, out) = encode(json!("42"), &Type::INT8).unwrap();
        assert_eq!(&out[..], &42i64.to_be_bytes());
        assert!(encode(json!(70_000), &Type::INT2).is_err());
    }

    #[test]
    fn test_jsonb_decodes_json_text() {
        let (_, direct) = encode(json!(["a", "b"]), &Type::JSONB).unwrap();
        let (_, from_text) = encode(json!(r#"["a","b"]"#), &Type::JSONB).unwrap();
        assert_eq!(direct, from_text);
        // jsonb binary format: version byte then the text
        assert_eq!(direct[0], 1);
    }

    #[test]
    fn test_text_and_timestamps() {
        let (_, out) = encode(json!(12), &Type::TEXT).unwrap();
        assert_eq!(&out[..], b"12");
        assert!(encode(json!("2024-05-01T10:00:00Z"), &Type::TIMESTAMPTZ).is_ok());
        assert!(encode(json!("yesterday"), &Type::TIMESTAMPTZ).is_err());
    }

    #[test]
    fn test_unmapped_type_is_an_error() {
        assert!(encode(json!({"a": 1}), &Type::POINT).is_err());
    }
}
