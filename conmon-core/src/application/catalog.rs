// conmon-core/src/application/catalog.rs

//! Checks stored in a backend: the `checks` table joined through
//! `control_checks_mapping`.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::domain::check::control::MAPPING_TABLE;
use crate::domain::check::definition::CHECKS_TABLE;
use crate::domain::check::{Check, CheckDefinition, ControlCheckMapping};
use crate::domain::query::{Query, Row, SortOrder};
use crate::error::ConmonError;
use crate::infrastructure::definitions::CheckSet;
use crate::ports::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Inserted,
}

fn is_deleted(row: &Row) -> bool {
    match row.get("is_deleted") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Live mappings, optionally limited to `control_ids`.
pub async fn load_mappings(
    store: &dyn Store,
    control_ids: Option<&[i64]>,
) -> Result<Vec<ControlCheckMapping>, ConmonError> {
    let mut query = Query::table(MAPPING_TABLE);
    if let Some(ids) = control_ids {
        query = query.filter("control_id", Value::from(ids.to_vec()));
    }
    let rows = store.select(&query).await?;
    let mut mappings = Vec::with_capacity(rows.len());
    for row in &rows {
        let mapping = ControlCheckMapping::from_row(row)?;
        if !mapping.is_deleted {
            mappings.push(mapping);
        }
    }
    Ok(mappings)
}

/// Loads and compiles the non-deleted checks.
///
/// With `control_ids`, only checks mapped (non-deleted mapping) to one of
/// those controls are returned. Checks come out ordered by id.
#[instrument(skip(store), fields(backend = store.backend_name()))]
pub async fn load_checks(
    store: &dyn Store,
    control_ids: Option<&[i64]>,
) -> Result<CheckSet, ConmonError> {
    let mut query = Query::table(CHECKS_TABLE);
    if control_ids.is_some() {
        let mut check_ids: Vec<i64> = load_mappings(store, control_ids)
            .await?
            .into_iter()
            .map(|m| m.check_id)
            .collect();
        check_ids.sort_unstable();
        check_ids.dedup();
        debug!(mapped = check_ids.len(), "Mapped checks");
        if check_ids.is_empty() {
            return Ok(CheckSet::default());
        }
        query = query.filter("id", Value::from(check_ids));
    }

    let rows = store.select(&query).await?;
    let mut definitions = rows
        .iter()
        .filter(|row| !is_deleted(row))
        .map(CheckDefinition::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    // ids textuels côté fichiers: on trie après décodage
    definitions.sort_by_key(|d| d.id);

    let set = CheckSet::compile(definitions)?;
    info!(checks = set.checks.len(), backlog = set.backlog.len(), "Checks loaded from store");
    Ok(set)
}

/// Full replacement by id: update the row if it exists, insert it otherwise.
#[instrument(skip(store, check), fields(check_id = check.id))]
pub async fn upsert_check(store: &dyn Store, check: &Check) -> Result<UpsertOutcome, ConmonError> {
    let now = Value::String(Utc::now().to_rfc3339());
    let mut row = CheckDefinition::from_check(check).to_row()?;
    row.insert("updated_at".into(), now.clone());

    let updated = store
        .update(
            &Query::table(CHECKS_TABLE)
                .values(row.clone())
                .filter("id", check.id),
        )
        .await?;
    if !updated.is_empty() {
        return Ok(UpsertOutcome::Updated);
    }

    row.insert("created_at".into(), now);
    row.insert("is_deleted".into(), Value::Bool(false));
    store.insert(&Query::table(CHECKS_TABLE).values(row)).await?;
    Ok(UpsertOutcome::Inserted)
}

/// Links a check to a control. An existing live link is left as is.
pub async fn map_check(store: &dyn Store, control_id: i64, check_id: i64) -> Result<bool, ConmonError> {
    let existing = load_mappings(store, Some(&[control_id])).await?;
    if existing.iter().any(|m| m.check_id == check_id) {
        return Ok(false);
    }
    let mapping = ControlCheckMapping::new(control_id, check_id, Utc::now());
    store
        .insert(&Query::table(MAPPING_TABLE).values(mapping.to_row()?))
        .await?;
    Ok(true)
}

/// Soft-deletes the link; returns whether a live link existed.
pub async fn unmap_check(store: &dyn Store, control_id: i64, check_id: i64) -> Result<bool, ConmonError> {
    let live = load_mappings(store, Some(&[control_id])).await?;
    let Some(mut mapping) = live.into_iter().find(|m| m.check_id == check_id) else {
        return Ok(false);
    };
    mapping.soft_delete(Utc::now());
    let mut values = Row::new();
    values.insert("is_deleted".into(), Value::Bool(true));
    values.insert("updated_at".into(), Value::String(mapping.updated_at.to_rfc3339()));

    store
        .update(
            &Query::table(MAPPING_TABLE)
                .values(values)
                .filter("control_id", control_id)
                .filter("check_id", check_id),
        )
        .await?;
    Ok(true)
}

/// Non-deleted checks, most recently touched first. Used for listings.
pub async fn recent_checks(store: &dyn Store, limit: usize) -> Result<Vec<Row>, ConmonError> {
    let rows = store
        .select(
            &Query::table(CHECKS_TABLE)
                .select_columns(["id", "name", "category", "updated_at", "is_deleted"])
                .order_by("updated_at", SortOrder::Desc),
        )
        .await?;
    Ok(rows.into_iter().filter(|r| !is_deleted(r)).take(limit).collect())
}
