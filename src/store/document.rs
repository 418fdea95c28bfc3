use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The whole persisted state of the portal.
///
/// The store does not look inside records; each collection holds whatever the
/// owning route module writes. The three collections are always serialized,
/// even when empty, and any other top-level keys found on disk are carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(default)]
    pub sessions: Vec<Value>,
    #[serde(default)]
    pub posts: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Find the first record in `users` whose `field` equals `value`.
    pub fn find_user(&self, field: &str, value: &str) -> Option<&Value> {
        self.users
            .iter()
            .find(|record| record.get(field).and_then(Value::as_str) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_serializes_all_collections() {
        let value = serde_json::to_value(Document::default()).unwrap();
        assert_eq!(value, json!({ "users": [], "sessions": [], "posts": [] }));
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let doc: Document = serde_json::from_value(json!({ "users": [{ "username": "ada" }] })).unwrap();
        assert_eq!(doc.users.len(), 1);
        assert!(doc.sessions.is_empty());
        assert!(doc.posts.is_empty());
    }

    #[test]
    fn unknown_keys_survive() {
        let doc: Document = serde_json::from_value(json!({ "settings": { "term": 2 } })).unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["settings"]["term"], 2);
        assert_eq!(value["posts"], json!([]));
    }

    #[test]
    fn find_user_matches_string_field() {
        let doc: Document = serde_json::from_value(json!({
            "users": [{ "username": "ada" }, { "username": "grace", "role": "teacher" }]
        }))
        .unwrap();
        assert_eq!(doc.find_user("username", "grace").unwrap()["role"], "teacher");
        assert!(doc.find_user("username", "linus").is_none());
    }
}
