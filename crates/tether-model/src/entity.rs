//! Entity identity and snapshots
//!
//! An entity is a uniquely identified record (profile, task, document)
//! synchronized between the local cache and the remote source. Payloads are
//! opaque field maps; only identity, status, and timestamps are structural.

use crate::status::Status;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Prefix carried by tentative ids minted for optimistic creation
const LOCAL_ID_PREFIX: &str = "local-";

/// Opaque entity identifier
///
/// Server-issued ids are treated as opaque strings. Entities created
/// optimistically before the server has confirmed them carry a tentative
/// `local-<uuid>` id that the write path re-keys on confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap a server-issued id
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a tentative id for an entity that does not exist remotely yet
    #[must_use]
    pub fn local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Check whether this id is tentative (not yet server-confirmed)
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kind of synchronized record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// User profile
    Profile,
    /// Workflow task
    Task,
    /// Drafted document
    Document,
}

impl EntityType {
    /// Singular wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Profile => "profile",
            EntityType::Task => "task",
            EntityType::Document => "document",
        }
    }

    /// Remote collection segment for this type
    #[must_use]
    pub fn collection(self) -> &'static str {
        match self {
            EntityType::Profile => "profiles",
            EntityType::Task => "tasks",
            EntityType::Document => "documents",
        }
    }

    /// Whether entities of this type carry a workflow status
    #[inline]
    #[must_use]
    pub fn has_workflow(self) -> bool {
        matches!(self, EntityType::Task | EntityType::Document)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache and lock key: entity type plus id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Kind of record
    pub entity_type: EntityType,
    /// Record id
    pub id: EntityId,
}

impl EntityRef {
    /// Create a reference
    #[inline]
    pub fn new(entity_type: EntityType, id: impl Into<EntityId>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }

    /// Reference a task by id
    #[inline]
    pub fn task(id: impl Into<EntityId>) -> Self {
        Self::new(EntityType::Task, id)
    }

    /// Reference a document by id
    #[inline]
    pub fn document(id: impl Into<EntityId>) -> Self {
        Self::new(EntityType::Document, id)
    }

    /// Reference a profile by id
    #[inline]
    pub fn profile(id: impl Into<EntityId>) -> Self {
        Self::new(EntityType::Profile, id)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// Opaque field map of an entity
///
/// Field names are canonical (the gateway normalizes wire aliases before a
/// payload is constructed). Values are arbitrary JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(serde_json::Map<String, serde_json::Value>);

impl Payload {
    /// Create an empty payload
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    /// Look up a string field
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(serde_json::Value::as_str)
    }

    /// Set a field, returning the previous value if any
    pub fn set(
        &mut self,
        field: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Remove a field
    pub fn remove(&mut self, field: &str) -> Option<serde_json::Value> {
        self.0.remove(field)
    }

    /// Merge another field map over this one (right-hand side wins)
    pub fn merge(&mut self, fields: &serde_json::Map<String, serde_json::Value>) {
        for (key, value) in fields {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Parse a date-bearing field (`2024-02-20` or full RFC 3339)
    #[must_use]
    pub fn date_field(&self, field: &str) -> Option<DateTime<Utc>> {
        let raw = self.get_str(field)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check for the empty payload
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Borrow the underlying map
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Payload {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// Snapshot of a synchronized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Record id (tentative while `local-` prefixed)
    pub id: EntityId,
    /// Kind of record
    pub entity_type: EntityType,
    /// Opaque canonical fields
    pub payload: Payload,
    /// Workflow status; `None` for types without a workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Server-side modification time; never regresses in the cache
    pub last_modified: DateTime<Utc>,
    /// Set while an optimistic mutation awaits remote confirmation
    #[serde(default)]
    pub pending: bool,
    /// Server-issued revision, when the server provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl Entity {
    /// Create an entity snapshot
    pub fn new(entity_type: EntityType, id: impl Into<EntityId>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            entity_type,
            payload,
            status: None,
            last_modified: Utc::now(),
            pending: false,
            version: None,
        }
    }

    /// With a workflow status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// With an explicit modification time
    #[inline]
    #[must_use]
    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = at;
        self
    }

    /// With a server revision
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Cache/lock key of this entity
    #[inline]
    #[must_use]
    pub fn reference(&self) -> EntityRef {
        EntityRef {
            entity_type: self.entity_type,
            id: self.id.clone(),
        }
    }
}

/// Cached snapshot plus bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached snapshot
    pub entity: Entity,
    /// When the snapshot was written to the cache
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Wrap an entity, stamped now
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            stored_at: Utc::now(),
        }
    }

    /// With an explicit store time
    #[inline]
    #[must_use]
    pub fn with_stored_at(mut self, at: DateTime<Utc>) -> Self {
        self.stored_at = at;
        self
    }

    /// Freshness is a caller decision: the entry itself never expires
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true; // effectively infinite TTL
        };
        now.signed_duration_since(self.stored_at) <= ttl
    }
}

/// Snapshot of the authenticated user held by the session store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    /// Server user id
    pub id: String,
    /// Display name, if the server sent one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Canonical avatar URL, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Remaining profile fields, canonicalized
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub extra: Payload,
}

impl UserSnapshot {
    /// Create a snapshot with just an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_tentative() {
        let id = EntityId::local();
        assert!(id.is_local());
        assert!(!EntityId::new("42").is_local());
    }

    #[test]
    fn reference_display() {
        let r = EntityRef::task("7");
        assert_eq!(r.to_string(), "task/7");
    }

    #[test]
    fn payload_merge_overwrites() {
        let mut payload = Payload::new();
        payload.set("title", "draft");
        payload.set("owner", "ada");

        let mut patch = serde_json::Map::new();
        patch.insert("title".into(), "final".into());

        payload.merge(&patch);
        assert_eq!(payload.get_str("title"), Some("final"));
        assert_eq!(payload.get_str("owner"), Some("ada"));
    }

    #[test]
    fn payload_date_field_parses_both_forms() {
        let mut payload = Payload::new();
        payload.set("due_date", "2024-02-20");
        let due = payload.date_field("due_date").unwrap();
        assert_eq!(due.date_naive().to_string(), "2024-02-20");

        payload.set("due_date", "2024-02-20T12:30:00Z");
        assert!(payload.date_field("due_date").is_some());

        payload.set("due_date", "soon");
        assert!(payload.date_field("due_date").is_none());
    }

    #[test]
    fn cache_entry_freshness_window() {
        let entity = Entity::new(EntityType::Task, "1", Payload::new());
        let stored = Utc::now();
        let entry = CacheEntry::new(entity).with_stored_at(stored);

        assert!(entry.is_fresh(Duration::from_secs(60), stored + chrono::Duration::seconds(30)));
        assert!(!entry.is_fresh(Duration::from_secs(60), stored + chrono::Duration::seconds(90)));
    }

    #[test]
    fn entity_roundtrips_through_json() {
        let mut payload = Payload::new();
        payload.set("title", "draft the proposal");
        let entity = Entity::new(EntityType::Task, "7", payload)
            .with_status(Status::Pending)
            .with_version(3);

        let json = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn workflow_only_for_tasks_and_documents() {
        assert!(EntityType::Task.has_workflow());
        assert!(EntityType::Document.has_workflow());
        assert!(!EntityType::Profile.has_workflow());
    }
}
