//! JSON-LD profile document.
//!
//! The document is typed for the keys the server cares about and keeps
//! everything else in `extra`, so arbitrary linked-data properties survive
//! a write/read cycle.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

pub const ACTIVITYSTREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
pub const WEBID_CONTEXT: &str = "http://w3id.org/webid";

/// A WebID profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDocument {
    #[serde(rename = "@context", deserialize_with = "one_or_many")]
    pub context: Vec<String>,

    /// URI of the profile document itself.
    #[serde(rename = "@id")]
    pub id: String,

    /// The agent the document describes.
    #[serde(rename = "primaryTopic")]
    pub primary_topic: Agent,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The agent described by a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Absolute URI, or a reference relative to the document `@id`.
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@type", default, deserialize_with = "one_or_many")]
    pub types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    // Link-valued properties: a plain IRI, a `{"@id": ..}` node reference
    // or an array of either. Kept as raw JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knows: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A semantic problem with a profile document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("@context must not be empty")]
    EmptyContext,

    #[error("@id {value:?} is not an absolute URI: {reason}")]
    InvalidId { value: String, reason: String },

    #[error("primaryTopic.@id must not be empty")]
    EmptyTopicId,

    #[error("primaryTopic.@id {value:?} cannot be resolved against the document @id")]
    UnresolvableTopicId { value: String },
}

/// Accept `"x"` as well as `["x", "y"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

impl ProfileDocument {
    /// The profile served before anything has been written.
    pub fn default_profile() -> Self {
        Self {
            context: vec![ACTIVITYSTREAMS_CONTEXT.to_string(), WEBID_CONTEXT.to_string()],
            id: "http://example.org/profile#me".to_string(),
            primary_topic: Agent {
                id: "#me".to_string(),
                types: vec!["Person".to_string(), "Actor".to_string()],
                name: Some("Will Smith".to_string()),
                img: Some(Value::from("avatar.png")),
                storage: Some(Value::from("/")),
                knows: Some(Value::from("http://alice.example/#me")),
                followers: Some(Value::from("followers")),
                following: Some(Value::from("following")),
                inbox: Some(Value::from("inbox")),
                outbox: Some(Value::from("outbox")),
                pubkey: Some(Value::from("1234abc")),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Check the document, collecting every violation.
    pub fn validate(&self) -> Result<(), Vec<DocumentError>> {
        let mut errors = Vec::new();

        if self.context.iter().all(|c| c.trim().is_empty()) {
            errors.push(DocumentError::EmptyContext);
        }

        let base = match Url::parse(&self.id) {
            Ok(url) if !url.cannot_be_a_base() => Some(url),
            Ok(_) => {
                errors.push(DocumentError::InvalidId {
                    value: self.id.clone(),
                    reason: "not a hierarchical URI".to_string(),
                });
                None
            }
            Err(e) => {
                errors.push(DocumentError::InvalidId {
                    value: self.id.clone(),
                    reason: e.to_string(),
                });
                None
            }
        };

        if self.primary_topic.id.trim().is_empty() {
            errors.push(DocumentError::EmptyTopicId);
        } else if let Some(base) = base {
            if base.join(&self.primary_topic.id).is_err() {
                errors.push(DocumentError::UnresolvableTopicId {
                    value: self.primary_topic.id.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Resolved URI of the agent, i.e. the WebID.
    pub fn webid(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.id)?.join(&self.primary_topic.id)
    }

    /// Serialized JSON body.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Strong entity tag derived from the serialized document.
    pub fn etag(&self) -> Result<String, serde_json::Error> {
        Ok(entity_tag(&self.to_json()?))
    }
}

/// Quoted first 16 hex digits of the SHA-256 of `body`.
pub fn entity_tag(body: &[u8]) -> String {
    let hex = format!("{:x}", Sha256::digest(body));
    format!("\"{}\"", &hex[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_profile_serializes_expected_shape() {
        let value = serde_json::to_value(ProfileDocument::default_profile()).unwrap();

        assert_eq!(value["@id"], "http://example.org/profile#me");
        assert_eq!(
            value["@context"],
            json!(["https://www.w3.org/ns/activitystreams", "http://w3id.org/webid"])
        );
        assert_eq!(value["primaryTopic"]["@id"], "#me");
        assert_eq!(value["primaryTopic"]["@type"], json!(["Person", "Actor"]));
        assert_eq!(value["primaryTopic"]["name"], "Will Smith");
        assert_eq!(value["primaryTopic"]["pubkey"], "1234abc");
    }

    #[test]
    fn default_profile_is_valid() {
        let profile = ProfileDocument::default_profile();
        assert!(profile.validate().is_ok());
        assert_eq!(profile.webid().unwrap().as_str(), "http://example.org/profile#me");
    }

    #[test]
    fn accepts_single_context_and_type_and_keeps_extra_keys() {
        let doc: ProfileDocument = serde_json::from_value(json!({
            "@context": "http://w3id.org/webid",
            "@id": "https://alice.example/profile",
            "primaryTopic": {
                "@id": "#me",
                "@type": "Person",
                "homepage": "https://alice.example/"
            },
            "generator": "hand"
        }))
        .unwrap();

        assert_eq!(doc.context, vec![WEBID_CONTEXT.to_string()]);
        assert_eq!(doc.primary_topic.types, vec!["Person".to_string()]);
        assert_eq!(doc.primary_topic.extra["homepage"], "https://alice.example/");
        assert_eq!(doc.extra["generator"], "hand");
        assert_eq!(doc.webid().unwrap().as_str(), "https://alice.example/profile#me");

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["generator"], "hand");
        assert_eq!(back["primaryTopic"]["homepage"], "https://alice.example/");
        assert!(back["primaryTopic"].get("name").is_none());
    }

    #[test]
    fn link_properties_accept_arrays_and_node_references() {
        let input = json!({
            "@context": ["http://w3id.org/webid"],
            "@id": "https://alice.example/profile",
            "primaryTopic": {
                "@id": "#me",
                "@type": ["Person"],
                "knows": ["https://b.example/#me", { "@id": "https://c.example/#me" }],
                "storage": { "@id": "https://alice.example/storage/" },
                "inbox": "https://alice.example/inbox"
            }
        });
        let doc: ProfileDocument = serde_json::from_value(input.clone()).unwrap();

        assert!(doc.validate().is_ok());
        assert_eq!(doc.primary_topic.knows.as_ref().unwrap()[1]["@id"], "https://c.example/#me");
        assert_eq!(serde_json::to_value(&doc).unwrap(), input);
    }

    #[test]
    fn missing_primary_topic_is_a_data_error() {
        let err = serde_json::from_value::<ProfileDocument>(json!({
            "@context": [],
            "@id": "http://example.org/profile"
        }))
        .unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn validate_collects_all_errors() {
        let mut doc = ProfileDocument::default_profile();
        doc.context.clear();
        doc.id = "profile".to_string();
        doc.primary_topic.id = " ".to_string();

        let errors = doc.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], DocumentError::EmptyContext);
        assert!(matches!(errors[1], DocumentError::InvalidId { .. }));
        assert_eq!(errors[2], DocumentError::EmptyTopicId);
    }

    #[test]
    fn rejects_non_hierarchical_id() {
        let mut doc = ProfileDocument::default_profile();
        doc.id = "mailto:will@example.org".to_string();
        let errors = doc.validate().unwrap_err();
        assert!(matches!(errors[0], DocumentError::InvalidId { .. }));
    }

    #[test]
    fn etag_tracks_content() {
        let a = ProfileDocument::default_profile();
        let mut b = a.clone();
        assert_eq!(a.etag().unwrap(), b.etag().unwrap());

        b.primary_topic.name = Some("Someone Else".to_string());
        assert_ne!(a.etag().unwrap(), b.etag().unwrap());

        let tag = a.etag().unwrap();
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert_eq!(tag.len(), 18);
    }
}
