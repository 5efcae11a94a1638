//! JSON marshaller for persisted model columns
//!
//! Stateless conversion between model values and the text stored in JSON
//! columns (schedules, audit filters, mask info, policy resources, tags,
//! principal lists, string maps).
//!
//! The codec never fails loudly: empty input yields `None`, and malformed
//! text or unserializable values yield `None` plus a single `warn` event.
//! Stored text may be partially corrupt and readers must keep going.
//!
//! Each thread keeps its own [`JsonCodec`] with a reusable output buffer; it
//! is never shared across threads.

pub mod compact_date;
pub mod model;

pub use model::{
    AccessResult, AuditFilter, DataMaskInfo, PolicyResource, Principal, RecurrenceSchedule, Tag,
    ValidityInterval, ValidityRecurrence, ValiditySchedule,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::warn;

/// Per-thread encoder state
#[derive(Debug, Default)]
pub struct JsonCodec {
    buffer: Vec<u8>,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    /// Encode `value`, reusing this codec's buffer
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<String> {
        self.buffer.clear();
        serde_json::to_writer(&mut self.buffer, value)?;
        String::from_utf8(self.buffer.clone()).map_err(serde::ser::Error::custom)
    }

    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> serde_json::Result<T> {
        serde_json::from_str(text)
    }
}

thread_local! {
    static CODEC: RefCell<JsonCodec> = RefCell::new(JsonCodec::new());
}

fn encode<T: Serialize + ?Sized>(value: &T, what: &'static str) -> Option<String> {
    let result = CODEC.with(|codec| codec.borrow_mut().encode(value));
    match result {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(schema = what, error = %e, "failed to convert {} to json", what);
            None
        }
    }
}

fn decode<T: DeserializeOwned>(text: Option<&str>, what: &'static str) -> Option<T> {
    let text = text.filter(|t| !t.is_empty())?;
    let result = CODEC.with(|codec| codec.borrow().decode::<T>(text));
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(schema = what, error = %e, json = text, "failed to convert json to {}", what);
            None
        }
    }
}

/// Encode a non-empty map
pub fn map_to_json<K, V>(map: &HashMap<K, V>) -> Option<String>
where
    K: Serialize + Eq + Hash,
    V: Serialize,
{
    if map.is_empty() {
        return None;
    }
    encode(map, "map")
}

/// Encode a non-empty list
pub fn list_to_json<T: Serialize>(list: &[T]) -> Option<String> {
    if list.is_empty() {
        return None;
    }
    encode(list, "list")
}

/// Encode any value; values that serialize to `null` yield `None`
pub fn object_to_json<T: Serialize + ?Sized>(value: &T) -> Option<String> {
    let text = encode(value, "object")?;
    if text == "null" {
        None
    } else {
        Some(text)
    }
}

/// Decode any value
pub fn json_to_object<T: DeserializeOwned>(text: Option<&str>) -> Option<T> {
    decode(text, std::any::type_name::<T>())
}

pub fn json_to_map_string_string(text: Option<&str>) -> Option<HashMap<String, String>> {
    decode(text, "Map<String, String>")
}

pub fn json_to_set_string(text: Option<&str>) -> Option<HashSet<String>> {
    decode(text, "Set<String>")
}

pub fn json_to_list_string(text: Option<&str>) -> Option<Vec<String>> {
    decode(text, "List<String>")
}

pub fn json_to_validity_schedules(text: Option<&str>) -> Option<Vec<ValiditySchedule>> {
    decode(text, "List<ValiditySchedule>")
}

pub fn json_to_validity_recurrences(text: Option<&str>) -> Option<Vec<ValidityRecurrence>> {
    decode(text, "List<ValidityRecurrence>")
}

pub fn json_to_audit_filters(text: Option<&str>) -> Option<Vec<AuditFilter>> {
    decode(text, "List<AuditFilter>")
}

pub fn json_to_principals(text: Option<&str>) -> Option<Vec<Principal>> {
    decode(text, "List<Principal>")
}

pub fn json_to_tags(text: Option<&str>) -> Option<Vec<Tag>> {
    decode(text, "List<Tag>")
}

pub fn json_to_mask_info_map(text: Option<&str>) -> Option<HashMap<String, DataMaskInfo>> {
    decode(text, "Map<String, DataMaskInfo>")
}

pub fn json_to_policy_resource_map(text: Option<&str>) -> Option<HashMap<String, PolicyResource>> {
    decode(text, "Map<String, PolicyResource>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrincipalKind;
    use tracing_test::traced_test;

    #[test]
    fn test_empty_inputs_are_absent() {
        assert!(map_to_json(&HashMap::<String, String>::new()).is_none());
        assert!(list_to_json::<Tag>(&[]).is_none());
        assert!(object_to_json(&Option::<Tag>::None).is_none());

        assert!(json_to_map_string_string(None).is_none());
        assert!(json_to_map_string_string(Some("")).is_none());
        assert!(json_to_tags(Some("")).is_none());
    }

    #[test]
    fn test_principal_list_wire_shape() {
        let principals = vec![
            Principal::new(PrincipalKind::User, "alice"),
            Principal::new(PrincipalKind::Role, "r0"),
        ];
        let text = list_to_json(&principals).unwrap();

        assert_eq!(text, r#"[{"type":"USER","name":"alice"},{"type":"ROLE","name":"r0"}]"#);
        assert_eq!(json_to_principals(Some(text.as_str())).unwrap(), principals);
    }

    #[test]
    fn test_audit_filter_round_trip() {
        let mut resources = HashMap::new();
        resources.insert("database".to_string(), PolicyResource::new(["sales", "hr"]));

        let filters = vec![AuditFilter {
            access_result: Some(AccessResult::Denied),
            resources,
            access_types: vec!["select".to_string()],
            is_audited: true,
            ..Default::default()
        }];

        let text = list_to_json(&filters).unwrap();
        assert!(text.contains(r#""accessResult":"DENIED""#));
        assert_eq!(json_to_audit_filters(Some(text.as_str())).unwrap(), filters);
    }

    #[test]
    fn test_object_round_trip_with_dates() {
        use crate::types::Role;
        use chrono::{TimeZone, Utc};

        let mut role = Role::new("ops").with_id(10).with_users(["alice"]);
        role.create_time = Some(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());

        let text = object_to_json(&role).unwrap();
        assert!(text.contains(r#""createTime":"20231114-22:13:20.123-+0000""#));

        let decoded: Role = json_to_object(Some(text.as_str())).unwrap();
        assert_eq!(decoded, role);
    }

    #[test]
    fn test_thread_local_codec_reuse() {
        let mut map = HashMap::new();
        map.insert("k".to_string(), "v".to_string());

        let first = map_to_json(&map).unwrap();
        let second = map_to_json(&map).unwrap();
        assert_eq!(first, second);
        assert_eq!(json_to_map_string_string(Some(first.as_str())).unwrap(), map);
    }

    #[test]
    #[traced_test]
    fn test_malformed_text_warns_and_yields_none() {
        assert!(json_to_validity_schedules(Some("{not json")).is_none());
        assert!(logs_contain("failed to convert json to List<ValiditySchedule>"));
    }

    #[test]
    #[traced_test]
    fn test_non_string_keys_fail_encode_quietly() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "v".to_string());

        assert!(map_to_json(&map).is_none());
        assert!(logs_contain("failed to convert map to json"));
    }

    fn assert_single_warning(lines: &[&str]) -> Result<(), String> {
        match lines.iter().filter(|line| line.contains(" WARN ")).count() {
            1 => Ok(()),
            n => Err(format!("expected 1 warning, got {}", n)),
        }
    }

    #[test]
    #[traced_test]
    fn test_failed_decode_emits_one_warning() {
        assert!(json_to_mask_info_map(Some("{\"col\": 7")).is_none());
        logs_assert(assert_single_warning);
    }

    #[test]
    #[traced_test]
    fn test_failed_encode_emits_one_warning() {
        let mut map = HashMap::new();
        map.insert((1, 2), "v".to_string());

        assert!(map_to_json(&map).is_none());
        logs_assert(assert_single_warning);
    }

    #[test]
    fn test_encode_reuses_buffer_between_values() {
        let mut codec = JsonCodec::new();
        assert_eq!(codec.encode(&vec!["a", "b"]).unwrap(), r#"["a","b"]"#);
        assert_eq!(codec.encode("x").unwrap(), r#""x""#);
    }
}
