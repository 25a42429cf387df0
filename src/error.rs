use crate::model::EntityId;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Conditions the engine and report assembler report back to callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("missing selection: {param}")]
    MissingSelection { param: &'static str },

    #[error("{entity} {} has invalid {field} {value:?}: {reason}", display_id(.record_id))]
    InvalidNumeric {
        entity: &'static str,
        record_id: Option<EntityId>,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("record store call failed: {0}")]
    CollaboratorFailure(String),
}

fn display_id(id: &Option<EntityId>) -> String {
    id.map(|v| format!("#{}", v))
        .unwrap_or_else(|| "(no id)".to_string())
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingSelection { .. } => "missing_selection",
            Self::InvalidNumeric { .. } => "invalid_numeric",
            Self::NotFound { .. } => "not_found",
            Self::CollaboratorFailure(_) => "collaborator_failure",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::MissingSelection { param } => Some(json!({ "param": param })),
            Self::InvalidNumeric {
                entity,
                record_id,
                field,
                value,
                ..
            } => Some(json!({
                "entity": entity,
                "recordId": record_id,
                "field": field,
                "value": value,
            })),
            Self::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            Self::CollaboratorFailure(_) => Some(json!({ "retryable": true })),
        }
    }

    pub fn collaborator(e: anyhow::Error) -> Self {
        Self::CollaboratorFailure(format!("{e:#}"))
    }
}

/// Serializable form of a [`CoreError`], attached to reports as a non-fatal issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&CoreError> for Issue {
    fn from(e: &CoreError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

impl From<CoreError> for Issue {
    fn from(e: CoreError) -> Self {
        Issue::from(&e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_numeric_message_names_record_and_field() {
        let e = CoreError::InvalidNumeric {
            entity: "grade",
            record_id: Some(4),
            field: "score",
            value: "abc".into(),
            reason: "not a number".into(),
        };
        assert_eq!(e.code(), "invalid_numeric");
        assert_eq!(e.to_string(), "grade #4 has invalid score \"abc\": not a number");
        let issue = Issue::from(&e);
        assert_eq!(issue.details.as_ref().map(|d| d["field"].clone()), Some(json!("score")));
    }

    #[test]
    fn collaborator_failure_is_retryable() {
        let e = CoreError::collaborator(anyhow::anyhow!("disk I/O error"));
        assert_eq!(e.code(), "collaborator_failure");
        assert_eq!(e.details(), Some(json!({ "retryable": true })));
    }
}
