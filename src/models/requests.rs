use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::Turn;

/// Request to run one conversational search turn
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(alias = "scope_id", rename = "scopeId", default)]
    pub scope_id: Option<String>,
}

impl SearchRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            scope_id: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_scope(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }
}
