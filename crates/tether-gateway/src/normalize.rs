//! Wire payload normalization
//!
//! The remote grew several spellings for the same field (`avatar`,
//! `avatarUrl`, `avatar_url`, ...). Rather than branching per feature,
//! every response body passes through one data-driven alias table on its
//! way into the canonical [`Entity`] shape.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tether_model::{Entity, EntityId, EntityRef, EntityType, Payload, Status, SyncError};

/// Aliases shared by every entity type
static COMMON_ALIASES: &[(&str, &str)] = &[
    ("lastModified", "last_modified"),
    ("updatedAt", "last_modified"),
    ("updated_at", "last_modified"),
    ("modifiedAt", "last_modified"),
    ("createdAt", "created_at"),
];

/// Per-type aliases observed on the wire
static PROFILE_ALIASES: &[(&str, &str)] = &[
    ("avatar", "avatar_url"),
    ("avatarUrl", "avatar_url"),
    ("displayName", "display_name"),
    ("fullName", "display_name"),
    ("email_address", "email"),
];

static TASK_ALIASES: &[(&str, &str)] = &[
    ("due", "due_date"),
    ("dueDate", "due_date"),
    ("assignedTo", "assignee"),
    ("assignee_id", "assignee"),
];

static DOCUMENT_ALIASES: &[(&str, &str)] = &[
    ("dueDate", "due_date"),
    ("docTitle", "title"),
    ("bodyText", "body"),
];

static ALIAS_TABLES: Lazy<HashMap<EntityType, HashMap<&'static str, &'static str>>> =
    Lazy::new(|| {
        let build = |specific: &[(&'static str, &'static str)]| {
            COMMON_ALIASES
                .iter()
                .chain(specific.iter())
                .copied()
                .collect::<HashMap<_, _>>()
        };
        HashMap::from([
            (EntityType::Profile, build(PROFILE_ALIASES)),
            (EntityType::Task, build(TASK_ALIASES)),
            (EntityType::Document, build(DOCUMENT_ALIASES)),
        ])
    });

/// Canonical name for a wire field
#[must_use]
pub fn canonical_field<'a>(entity_type: EntityType, field: &'a str) -> &'a str {
    ALIAS_TABLES
        .get(&entity_type)
        .and_then(|table| table.get(field))
        .copied()
        .unwrap_or(field)
}

/// Rewrite a wire object's keys to their canonical names
///
/// When both an alias and its canonical spelling are present, the
/// canonical one wins and the alias is dropped.
#[must_use]
pub fn normalize_object(entity_type: EntityType, raw: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(raw.len());
    // canonical spellings first, so aliases cannot shadow them
    let (canonical, aliased): (Vec<_>, Vec<_>) = raw
        .into_iter()
        .partition(|(key, _)| canonical_field(entity_type, key) == key.as_str());
    for (key, value) in canonical {
        out.insert(key, value);
    }
    for (key, value) in aliased {
        let target = canonical_field(entity_type, &key).to_string();
        out.entry(target).or_insert(value);
    }
    out
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| DateTime::from_timestamp_millis(millis)),
        _ => None,
    }
}

fn parse_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(s) => Some(EntityId::new(s.as_str())),
        Value::Number(n) => Some(EntityId::new(n.to_string())),
        _ => None,
    }
}

/// Build a canonical [`Entity`] from a wire body
///
/// Structural fields (`id`, `status`, `last_modified`, `version`) are
/// lifted out; everything else stays in the payload under its canonical
/// name. The `reference` supplies the id when the body omits one.
pub fn entity_from_body(
    reference: &EntityRef,
    body: Value,
) -> Result<Entity, SyncError> {
    let Value::Object(raw) = body else {
        return Err(SyncError::Unknown(format!(
            "malformed entity body for {reference}: expected object"
        )));
    };
    let mut fields = normalize_object(reference.entity_type, raw);

    let id = fields
        .remove("id")
        .as_ref()
        .and_then(parse_id)
        .unwrap_or_else(|| reference.id.clone());

    let status = match fields.remove("status") {
        Some(Value::String(s)) => match s.parse::<Status>() {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!(%reference, "ignoring unrecognized wire status: {e}");
                None
            }
        },
        Some(Value::Null) | None => None,
        Some(other) => {
            tracing::warn!(%reference, "ignoring non-string wire status: {other}");
            None
        }
    };

    let last_modified = fields
        .remove("last_modified")
        .as_ref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    let version = fields
        .remove("version")
        .and_then(|v| v.as_u64());

    Ok(Entity {
        id,
        entity_type: reference.entity_type,
        payload: Payload::from(fields),
        status,
        last_modified,
        pending: false,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_collapse_to_canonical() {
        assert_eq!(
            canonical_field(EntityType::Profile, "avatarUrl"),
            "avatar_url"
        );
        assert_eq!(canonical_field(EntityType::Task, "dueDate"), "due_date");
        assert_eq!(canonical_field(EntityType::Task, "title"), "title");
    }

    #[test]
    fn canonical_spelling_wins_over_alias() {
        let raw = json!({
            "avatar_url": "https://cdn/a.png",
            "avatar": "https://cdn/old.png",
        });
        let Value::Object(map) = raw else { unreachable!() };
        let out = normalize_object(EntityType::Profile, map);
        assert_eq!(out["avatar_url"], "https://cdn/a.png");
        assert!(!out.contains_key("avatar"));
    }

    #[test]
    fn entity_from_body_lifts_structural_fields() {
        let reference = EntityRef::task("7");
        let entity = entity_from_body(
            &reference,
            json!({
                "id": 7,
                "status": "in_progress",
                "dueDate": "2024-02-20",
                "updatedAt": "2024-02-01T08:00:00Z",
                "version": 4,
                "title": "draft the proposal",
            }),
        )
        .unwrap();

        assert_eq!(entity.id.as_str(), "7");
        assert_eq!(entity.status, Some(Status::InProgress));
        assert_eq!(entity.version, Some(4));
        assert_eq!(entity.payload.get_str("due_date"), Some("2024-02-20"));
        assert_eq!(entity.payload.get_str("title"), Some("draft the proposal"));
        assert!(entity.payload.get("status").is_none());
        assert_eq!(
            entity.last_modified,
            "2024-02-01T08:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn entity_from_body_rejects_non_objects() {
        let err = entity_from_body(&EntityRef::task("7"), json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, SyncError::Unknown(_)));
    }

    #[test]
    fn unknown_status_is_dropped_not_fatal() {
        let entity = entity_from_body(
            &EntityRef::task("7"),
            json!({"id": "7", "status": "archived"}),
        )
        .unwrap();
        assert_eq!(entity.status, None);
    }

    #[test]
    fn epoch_millis_timestamps_are_accepted() {
        let entity = entity_from_body(
            &EntityRef::task("7"),
            json!({"id": "7", "lastModified": 1_706_745_600_000_i64}),
        )
        .unwrap();
        assert_eq!(entity.last_modified.timestamp_millis(), 1_706_745_600_000);
    }

    #[test]
    fn body_without_id_uses_reference() {
        let entity =
            entity_from_body(&EntityRef::document("d9"), json!({"title": "memo"})).unwrap();
        assert_eq!(entity.id.as_str(), "d9");
    }
}
