//! Backend dialect capabilities.
//!
//! The two supported remote protocols share one engine code path and
//! differ only in field names, ID semantics and position addressing. Those
//! differences are captured here as one capability interface with two
//! concrete implementations, selected once at startup.

use crate::edit::MetadataPatch;
use serde_json::{json, Map, Value};

/// Whether the dialect supports resolving discussion threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSupport {
    Supported,
    /// The backend has no thread resolution; threads render as
    /// `Resolution::NotApplicable` and resolve commands are rejected.
    Unsupported,
}

/// How review comment positions are addressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionScheme {
    /// Structured SHA-based anchor (base/start/head plus paths and lines).
    Structured,
    /// Single integer offset counted over the full review diff.
    CountedOffset,
}

/// Maps local usernames and milestone titles to remote IDs.
///
/// Backed by the engine's cached user/milestone lists; injected so the
/// dialects stay free of file and network access.
pub trait UserResolver {
    fn user_id(&self, username: &str) -> Option<u64>;
    fn milestone_id(&self, title: &str) -> Option<u64>;
}

/// Capability interface of one remote protocol dialect.
pub trait Dialect {
    fn name(&self) -> &'static str;

    fn resolution_support(&self) -> ResolutionSupport;

    fn position_scheme(&self) -> PositionScheme;

    /// Whether discussions carry stable 40-hex thread IDs.
    fn stable_thread_ids(&self) -> bool;

    /// Translate a metadata patch into this dialect's wire field names.
    fn metadata_payload(&self, patch: &MetadataPatch, resolver: &dyn UserResolver) -> Value;
}

/// GitLab-style dialect: stable thread IDs, structured SHA positions,
/// thread resolution supported, ID-mapped assignee/reviewer/milestone
/// fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredDialect;

impl Dialect for StructuredDialect {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn resolution_support(&self) -> ResolutionSupport {
        ResolutionSupport::Supported
    }

    fn position_scheme(&self) -> PositionScheme {
        PositionScheme::Structured
    }

    fn stable_thread_ids(&self) -> bool {
        true
    }

    fn metadata_payload(&self, patch: &MetadataPatch, resolver: &dyn UserResolver) -> Value {
        let mut data = Map::new();
        if let Some(title) = &patch.title {
            data.insert("title".into(), json!(title));
        }
        if let Some(description) = &patch.description {
            data.insert("description".into(), json!(description));
        }
        if let Some(branch) = &patch.source_branch {
            data.insert("source_branch".into(), json!(branch));
        }
        if let Some(branch) = &patch.target_branch {
            data.insert("target_branch".into(), json!(branch));
        }
        if let Some(assignees) = &patch.assignees {
            data.insert("assignee_ids".into(), id_list(assignees, resolver));
        }
        if let Some(reviewers) = &patch.reviewers {
            data.insert("reviewer_ids".into(), id_list(reviewers, resolver));
        }
        if let Some(milestone) = &patch.milestone {
            // Empty title clears the milestone.
            let id = if milestone.is_empty() {
                Some(0)
            } else {
                resolver.milestone_id(milestone)
            };
            if let Some(id) = id {
                data.insert("milestone_id".into(), json!(id));
            }
        }
        if let Some(labels) = &patch.labels {
            data.insert("labels".into(), json!(labels.join(",")));
        }
        if let Some(remove) = patch.remove_source_branch {
            data.insert("remove_source_branch".into(), json!(remove));
        }
        if let Some(event) = &patch.state_event {
            data.insert("state_event".into(), json!(event));
        }
        Value::Object(data)
    }
}

/// GitHub-style dialect: no stable thread IDs, counted-offset positions,
/// no thread resolution, username-addressed people fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountedDialect;

impl Dialect for CountedDialect {
    fn name(&self) -> &'static str {
        "counted"
    }

    fn resolution_support(&self) -> ResolutionSupport {
        ResolutionSupport::Unsupported
    }

    fn position_scheme(&self) -> PositionScheme {
        PositionScheme::CountedOffset
    }

    fn stable_thread_ids(&self) -> bool {
        false
    }

    fn metadata_payload(&self, patch: &MetadataPatch, resolver: &dyn UserResolver) -> Value {
        let mut data = Map::new();
        if let Some(title) = &patch.title {
            data.insert("title".into(), json!(title));
        }
        if let Some(description) = &patch.description {
            data.insert("body".into(), json!(description));
        }
        if let Some(branch) = &patch.source_branch {
            data.insert("head".into(), json!(branch));
        }
        if let Some(branch) = &patch.target_branch {
            data.insert("base".into(), json!(branch));
        }
        if let Some(assignees) = &patch.assignees {
            data.insert("assignees".into(), json!(assignees));
        }
        if let Some(reviewers) = &patch.reviewers {
            data.insert("reviewers".into(), json!(reviewers));
        }
        if let Some(milestone) = &patch.milestone {
            let id = if milestone.is_empty() {
                Some(0)
            } else {
                resolver.milestone_id(milestone)
            };
            if let Some(id) = id {
                data.insert("milestone".into(), json!(id));
            }
        }
        if let Some(labels) = &patch.labels {
            data.insert("labels".into(), json!(labels));
        }
        if let Some(event) = &patch.state_event {
            let state = match event.as_str() {
                "close" => "closed",
                "reopen" => "open",
                other => other,
            };
            data.insert("state".into(), json!(state));
        }
        Value::Object(data)
    }
}

fn id_list(usernames: &[String], resolver: &dyn UserResolver) -> Value {
    if usernames.is_empty() {
        // The remote interprets [0] as "clear all".
        return json!([0]);
    }
    let ids: Vec<u64> = usernames
        .iter()
        .filter_map(|name| resolver.user_id(name))
        .collect();
    json!(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FakeResolver;

    impl UserResolver for FakeResolver {
        fn user_id(&self, username: &str) -> Option<u64> {
            match username {
                "alice" => Some(1),
                "bob" => Some(2),
                _ => None,
            }
        }

        fn milestone_id(&self, title: &str) -> Option<u64> {
            (title == "1.0").then_some(17)
        }
    }

    #[test]
    fn structured_payload_maps_people_to_ids() {
        let patch = MetadataPatch {
            title: Some("New title".into()),
            assignees: Some(vec!["alice".into(), "bob".into()]),
            milestone: Some("1.0".into()),
            labels: Some(vec!["bug".into(), "urgent".into()]),
            ..Default::default()
        };
        let payload = StructuredDialect.metadata_payload(&patch, &FakeResolver);
        assert_eq!(payload["title"], json!("New title"));
        assert_eq!(payload["assignee_ids"], json!([1, 2]));
        assert_eq!(payload["milestone_id"], json!(17));
        assert_eq!(payload["labels"], json!("bug,urgent"));
    }

    #[test]
    fn structured_payload_clears_assignees_with_zero() {
        let patch = MetadataPatch {
            assignees: Some(vec![]),
            ..Default::default()
        };
        let payload = StructuredDialect.metadata_payload(&patch, &FakeResolver);
        assert_eq!(payload["assignee_ids"], json!([0]));
    }

    #[test]
    fn counted_payload_keeps_usernames_and_renames_fields() {
        let patch = MetadataPatch {
            description: Some("Body text".into()),
            target_branch: Some("main".into()),
            assignees: Some(vec!["alice".into()]),
            labels: Some(vec!["bug".into()]),
            state_event: Some("close".into()),
            ..Default::default()
        };
        let payload = CountedDialect.metadata_payload(&patch, &FakeResolver);
        assert_eq!(payload["body"], json!("Body text"));
        assert_eq!(payload["base"], json!("main"));
        assert_eq!(payload["assignees"], json!(["alice"]));
        assert_eq!(payload["labels"], json!(["bug"]));
        assert_eq!(payload["state"], json!("closed"));
    }

    #[test]
    fn dialect_capability_matrix() {
        assert_eq!(
            StructuredDialect.resolution_support(),
            ResolutionSupport::Supported
        );
        assert_eq!(
            StructuredDialect.position_scheme(),
            PositionScheme::Structured
        );
        assert!(StructuredDialect.stable_thread_ids());

        assert_eq!(
            CountedDialect.resolution_support(),
            ResolutionSupport::Unsupported
        );
        assert_eq!(
            CountedDialect.position_scheme(),
            PositionScheme::CountedOffset
        );
        assert!(!CountedDialect.stable_thread_ids());
    }
}
