// conmon-core/src/domain/check/control.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::query::Row;

pub const MAPPING_TABLE: &str = "control_checks_mapping";

/// Many-to-many link between a control and a check. Soft-deleted, never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCheckMapping {
    pub control_id: i64,
    pub check_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ControlCheckMapping {
    pub fn new(control_id: i64, check_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            control_id,
            check_id,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.updated_at = now;
    }

    pub fn to_row(&self) -> Result<Row, DomainError> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(row)) => Ok(row),
            Ok(_) => Err(DomainError::InvalidCheck("mapping did not serialize to a row".into())),
            Err(e) => Err(DomainError::InvalidCheck(e.to_string())),
        }
    }

    /// Tolerates ids stored as text (flat-file tables).
    pub fn from_row(row: &Row) -> Result<Self, DomainError> {
        let id = |name: &str| -> Result<i64, DomainError> {
            let parsed = match row.get(name) {
                Some(serde_json::Value::Number(n)) => n.as_i64(),
                Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            };
            parsed.ok_or_else(|| {
                DomainError::InvalidCheck(format!(
                    "{MAPPING_TABLE}.{name} is missing or not an integer"
                ))
            })
        };
        let stamp = |name: &str| -> DateTime<Utc> {
            row.get(name)
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_default()
        };
        let is_deleted = match row.get("is_deleted") {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };

        Ok(Self {
            control_id: id("control_id")?,
            check_id: id("check_id")?,
            created_at: stamp("created_at"),
            updated_at: stamp("updated_at"),
            is_deleted,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_soft_delete_keeps_creation_time() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut m = ControlCheckMapping::new(10, 1, t0);
        m.soft_delete(t1);
        assert!(m.is_deleted);
        assert_eq!(m.created_at, t0);
        assert_eq!(m.updated_at, t1);
    }

    #[test]
    fn test_row_round_trip_and_text_ids() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let m = ControlCheckMapping::new(10, 1, t0);
        let row = m.to_row().unwrap();
        assert_eq!(ControlCheckMapping::from_row(&row).unwrap(), m);

        let row = json!({"control_id": "10", "check_id": 1, "is_deleted": "false"});
        let parsed = ControlCheckMapping::from_row(row.as_object().unwrap()).unwrap();
        assert_eq!((parsed.control_id, parsed.check_id), (10, 1));
    }
}
