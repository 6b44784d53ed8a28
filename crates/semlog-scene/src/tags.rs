//! Key/value pairs persisted in actor tags.
//!
//! Each tag is a single string of the form `Type;Key,Value;Key,Value;`. A tag
//! type groups the keys that belong to one consumer (for example `SemLog` for
//! an actor's own semantic values and `SemLogBone3` for the values of bone 3 of
//! a skeletal actor). Keys are unique within a tag type.
//!
//! # Example
//!
//! ```
//! use semlog_scene::tags;
//!
//! let mut actor_tags = Vec::new();
//! assert!(tags::add_kv_pair(&mut actor_tags, "SemLog", "Id", "abc", false));
//! assert!(tags::add_kv_pair(&mut actor_tags, "SemLog", "Class", "Mug", false));
//! assert_eq!(actor_tags, vec!["SemLog;Id,abc;Class,Mug;".to_owned()]);
//! assert_eq!(tags::get_value(&actor_tags, "SemLog", "Class").as_deref(), Some("Mug"));
//! ```

use tracing::warn;

use crate::handle::ActorId;

// ---------------------------------------------------------------------------
// ValueStore
// ---------------------------------------------------------------------------

/// Persisted key/value storage addressed by owner actor and tag type.
///
/// Values written through this trait survive the in-memory semantic state and
/// are what `ImportValues` reads back after a reload.
pub trait ValueStore {
    /// Value of `key` under `tag_type` on `owner`, if present.
    fn get_value(&self, owner: ActorId, tag_type: &str, key: &str) -> Option<String>;

    /// Write `key=value` under `tag_type`. An existing value is replaced only
    /// when `overwrite` is set. Returns `true` if the store changed.
    fn add_kv_pair(
        &mut self,
        owner: ActorId,
        tag_type: &str,
        key: &str,
        value: &str,
        overwrite: bool,
    ) -> bool;

    /// Remove every key under `tag_type`. Returns `true` if anything was removed.
    fn remove_tag_type(&mut self, owner: ActorId, tag_type: &str) -> bool;

    /// Returns `true` if `owner` carries a tag of `tag_type`.
    fn has_tag_type(&self, owner: ActorId, tag_type: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Tag codec
// ---------------------------------------------------------------------------

struct ParsedTag<'a> {
    tag_type: &'a str,
    pairs: Vec<(&'a str, &'a str)>,
}

fn parse(tag: &str) -> Option<ParsedTag<'_>> {
    let mut segments = tag.split(';');
    let tag_type = segments.next().filter(|t| !t.is_empty())?;
    let pairs = segments
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.split_once(','))
        .collect();
    Some(ParsedTag { tag_type, pairs })
}

fn format_tag(tag_type: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(tag_type.len() + 1 + pairs.len() * 16);
    out.push_str(tag_type);
    out.push(';');
    for (k, v) in pairs {
        out.push_str(k);
        out.push(',');
        out.push_str(v);
        out.push(';');
    }
    out
}

fn position_of_type(tags: &[String], tag_type: &str) -> Option<usize> {
    tags.iter()
        .position(|t| parse(t).is_some_and(|p| p.tag_type == tag_type))
}

/// Returns `true` if any tag has the given type.
pub fn has_type(tags: &[String], tag_type: &str) -> bool {
    position_of_type(tags, tag_type).is_some()
}

/// Value stored under `tag_type` / `key`.
pub fn get_value(tags: &[String], tag_type: &str, key: &str) -> Option<String> {
    let idx = position_of_type(tags, tag_type)?;
    let parsed = parse(&tags[idx])?;
    parsed
        .pairs
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| (*v).to_owned())
}

/// All key/value pairs stored under `tag_type`, in tag order.
pub fn get_pairs(tags: &[String], tag_type: &str) -> Vec<(String, String)> {
    position_of_type(tags, tag_type)
        .and_then(|idx| parse(&tags[idx]))
        .map(|p| {
            p.pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// `;` and `,` delimit pairs, so they cannot appear inside a tag field.
fn is_encodable(field: &str) -> bool {
    !field.contains([';', ','])
}

/// Insert or update `key=value` under `tag_type`.
///
/// A tag type, key or value containing `;` or `,` is rejected and the tags
/// are left unchanged.
pub fn add_kv_pair(
    tags: &mut Vec<String>,
    tag_type: &str,
    key: &str,
    value: &str,
    overwrite: bool,
) -> bool {
    if tag_type.is_empty() || key.is_empty() || ![tag_type, key, value].iter().all(|f| is_encodable(f)) {
        warn!(tag_type, key, value, "tag field is empty or contains a delimiter, pair not written");
        return false;
    }
    let Some(idx) = position_of_type(tags, tag_type) else {
        tags.push(format_tag(tag_type, &[(key, value)]));
        return true;
    };

    let updated = {
        let Some(parsed) = parse(&tags[idx]) else {
            return false;
        };
        let mut pairs = parsed.pairs;
        match pairs.iter().position(|(k, _)| *k == key) {
            Some(p) if pairs[p].1 == value => return false,
            Some(_) if !overwrite => return false,
            Some(p) => pairs[p].1 = value,
            None => pairs.push((key, value)),
        }
        format_tag(parsed.tag_type, &pairs)
    };
    tags[idx] = updated;
    true
}

/// Remove `key` from `tag_type`. Returns `true` if it was present.
pub fn remove_key(tags: &mut [String], tag_type: &str, key: &str) -> bool {
    let Some(idx) = position_of_type(tags, tag_type) else {
        return false;
    };
    let updated = {
        let Some(parsed) = parse(&tags[idx]) else {
            return false;
        };
        let before = parsed.pairs.len();
        let pairs: Vec<(&str, &str)> = parsed.pairs.into_iter().filter(|(k, _)| *k != key).collect();
        if pairs.len() == before {
            return false;
        }
        format_tag(tag_type, &pairs)
    };
    tags[idx] = updated;
    true
}

/// Remove every tag of `tag_type`. Returns `true` if anything was removed.
pub fn remove_type(tags: &mut Vec<String>, tag_type: &str) -> bool {
    let before = tags.len();
    tags.retain(|t| parse(t).map_or(true, |p| p.tag_type != tag_type));
    tags.len() != before
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_creates_tag_then_appends_keys() {
        let mut tags = vec!["Other;A,1;".to_owned()];
        assert!(add_kv_pair(&mut tags, "SemLog", "Id", "x1", false));
        assert!(add_kv_pair(&mut tags, "SemLog", "Class", "Cup", false));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1], "SemLog;Id,x1;Class,Cup;");
    }

    #[test]
    fn overwrite_flag_guards_existing_value() {
        let mut tags = Vec::new();
        add_kv_pair(&mut tags, "SemLog", "Id", "old", false);
        assert!(!add_kv_pair(&mut tags, "SemLog", "Id", "new", false));
        assert_eq!(get_value(&tags, "SemLog", "Id").as_deref(), Some("old"));
        assert!(add_kv_pair(&mut tags, "SemLog", "Id", "new", true));
        assert_eq!(get_value(&tags, "SemLog", "Id").as_deref(), Some("new"));
    }

    #[test]
    fn same_value_is_not_a_change() {
        let mut tags = Vec::new();
        add_kv_pair(&mut tags, "SemLog", "Id", "a", false);
        assert!(!add_kv_pair(&mut tags, "SemLog", "Id", "a", true));
    }

    #[test]
    fn remove_type_leaves_other_types() {
        let mut tags = Vec::new();
        add_kv_pair(&mut tags, "SemLog", "Id", "a", false);
        add_kv_pair(&mut tags, "SemLogBone0", "Id", "b", false);
        assert!(remove_type(&mut tags, "SemLog"));
        assert!(!has_type(&tags, "SemLog"));
        assert!(has_type(&tags, "SemLogBone0"));
        assert!(!remove_type(&mut tags, "SemLog"));
    }

    #[test]
    fn tag_type_prefix_does_not_match() {
        let mut tags = Vec::new();
        add_kv_pair(&mut tags, "SemLogBone1", "Id", "b", false);
        assert_eq!(get_value(&tags, "SemLog", "Id"), None);
    }

    #[test]
    fn delimiters_in_fields_are_rejected() {
        let mut tags = vec!["SemLog;Id,a;".to_owned()];
        assert!(!add_kv_pair(&mut tags, "SemLog", "Class", "A;B", true));
        assert!(!add_kv_pair(&mut tags, "SemLog", "Class", "A,B", true));
        assert!(!add_kv_pair(&mut tags, "SemLog", "Cl;ass", "A", true));
        assert!(!add_kv_pair(&mut tags, "Sem,Log", "Class", "A", true));
        assert!(!add_kv_pair(&mut tags, "SemLog", "", "A", true));
        assert_eq!(tags, vec!["SemLog;Id,a;".to_owned()]);
    }

    #[test]
    fn remove_key_keeps_remaining_pairs() {
        let mut tags = vec!["SemLog;Id,a;Class,B;".to_owned()];
        assert!(remove_key(&mut tags, "SemLog", "Id"));
        assert_eq!(tags[0], "SemLog;Class,B;");
        assert_eq!(get_pairs(&tags, "SemLog"), vec![("Class".to_owned(), "B".to_owned())]);
    }
}
