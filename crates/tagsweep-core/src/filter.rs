//! Record filter: popularity threshold and required fields

use crate::record::{CanonicalRecord, RawRecord};

/// Decides whether a raw record qualifies and normalizes it.
///
/// Pure: the outcome depends only on the record and the filter settings.
#[derive(Clone, Debug)]
pub struct RecordFilter {
    /// Field holding the identity (e.g. `username`)
    pub identity_field: String,
    /// Field holding the popularity count (e.g. `followers`)
    pub popularity_field: String,
    /// Records below this popularity are rejected
    pub min_popularity: u64,
    /// Fields that must be present and non-blank (e.g. `email`)
    pub required_fields: Vec<String>,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            identity_field: "username".to_string(),
            popularity_field: "followers".to_string(),
            min_popularity: 5000,
            required_fields: Vec::new(),
        }
    }
}

impl RecordFilter {
    pub fn new(min_popularity: u64) -> Self {
        Self {
            min_popularity,
            ..Default::default()
        }
    }

    /// Return the canonical record, or `None` if the record is rejected.
    pub fn accept(&self, raw: &RawRecord, item: &str) -> Option<CanonicalRecord> {
        let identity = raw.text(&self.identity_field)?;
        if identity.trim_start_matches('@').trim().is_empty() {
            return None;
        }
        let popularity = raw.count(&self.popularity_field)?;
        if popularity < self.min_popularity {
            return None;
        }
        if self.required_fields.iter().any(|f| raw.text(f).is_none()) {
            return None;
        }

        let attributes = raw
            .0
            .iter()
            .filter(|(k, _)| **k != self.identity_field)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(CanonicalRecord {
            identity,
            attributes,
            source_item: item.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRecord {
        RawRecord::from_value(value).unwrap()
    }

    #[test]
    fn accepts_above_threshold() {
        let f = RecordFilter::new(10_000);
        let rec = f
            .accept(&raw(json!({"username": "a", "followers": 20000})), "luxurytravel")
            .unwrap();
        assert_eq!(rec.identity, "a");
        assert_eq!(rec.source_item, "luxurytravel");
        assert_eq!(rec.attributes["followers"], json!(20000));
        assert!(!rec.attributes.contains_key("username"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let f = RecordFilter::new(10_000);
        assert!(f
            .accept(&raw(json!({"username": "a", "followers": 10000})), "t")
            .is_some());
        assert!(f
            .accept(&raw(json!({"username": "a", "followers": 9999})), "t")
            .is_none());
    }

    #[test]
    fn rejects_below_threshold() {
        let f = RecordFilter::new(10_000);
        assert!(f
            .accept(&raw(json!({"username": "b", "followers": 5000})), "t")
            .is_none());
    }

    #[test]
    fn rejects_missing_fields() {
        let f = RecordFilter::new(0);
        assert!(f.accept(&raw(json!({"followers": 5})), "t").is_none());
        assert!(f.accept(&raw(json!({"username": "x"})), "t").is_none());
        assert!(f
            .accept(&raw(json!({"username": "  ", "followers": 5})), "t")
            .is_none());
        assert!(f
            .accept(&raw(json!({"username": "@", "followers": 5})), "t")
            .is_none());
        assert!(f
            .accept(&raw(json!({"username": "x", "followers": "lots"})), "t")
            .is_none());
    }

    #[test]
    fn required_fields_enforced() {
        let f = RecordFilter {
            required_fields: vec!["email".to_string()],
            ..RecordFilter::new(0)
        };
        assert!(f
            .accept(&raw(json!({"username": "x", "followers": 1})), "t")
            .is_none());
        assert!(f
            .accept(&raw(json!({"username": "x", "followers": 1, "email": ""})), "t")
            .is_none());
        assert!(f
            .accept(
                &raw(json!({"username": "x", "followers": 1, "email": "x@y.io"})),
                "t"
            )
            .is_some());
    }

    #[test]
    fn custom_field_names() {
        let f = RecordFilter {
            identity_field: "handle".to_string(),
            popularity_field: "subscribers".to_string(),
            min_popularity: 100,
            required_fields: Vec::new(),
        };
        let rec = f
            .accept(&raw(json!({"handle": "@Chan", "subscribers": "1,200"})), "t")
            .unwrap();
        assert_eq!(rec.identity, "@Chan");
        assert_eq!(rec.key(), "chan");
    }
}
