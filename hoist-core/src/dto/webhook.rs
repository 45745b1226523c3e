//! Webhook DTOs
//!
//! Only the fields of a source-control push notification that the
//! orchestrator acts on are modeled; everything else is ignored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Push notification body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    /// Pushed ref, e.g. `refs/heads/main`
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Commit the ref now points at
    #[serde(default)]
    pub after: Option<String>,
}

impl PushEvent {
    /// Branch name when the pushed ref is a branch
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }
}

/// Response to a webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub run_id: Option<Uuid>,
    pub ignored: bool,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_event_branch() {
        let event: PushEvent = serde_json::from_str(
            r#"{"ref": "refs/heads/main", "after": "abc123", "repository": {"name": "x"}}"#,
        )
        .unwrap();
        assert_eq!(event.branch(), Some("main"));
        assert_eq!(event.after.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_push_event_tag_is_not_branch() {
        let event = PushEvent {
            git_ref: "refs/tags/v1.0".to_string(),
            after: None,
        };
        assert_eq!(event.branch(), None);
    }
}
