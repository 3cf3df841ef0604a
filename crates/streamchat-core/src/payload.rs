use serde::Serialize;
use std::fmt;

/// Model used when the form leaves the model field empty.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Models offered by the model picker.
pub const AVAILABLE_MODELS: &[&str] = &["gpt-4.1-mini", "gpt-4.1-nano", "gpt-3.5-turbo"];

/// Body of `POST /api/chat`.
///
/// Built fresh from the form for every submission, so edits made while a
/// request is streaming only affect the next one.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct RequestPayload {
    pub developer_message: String,
    pub user_message: String,
    pub model: String,
    pub api_key: String,
}

/// A required form field that was left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    DeveloperMessage,
    UserMessage,
    ApiKey,
}

impl RequiredField {
    pub fn display_name(&self) -> &'static str {
        match self {
            RequiredField::DeveloperMessage => "Developer Message",
            RequiredField::UserMessage => "User Message",
            RequiredField::ApiKey => "API Key",
        }
    }
}

impl RequestPayload {
    pub fn new(
        developer_message: impl Into<String>,
        user_message: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let model = if model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            model
        };

        Self {
            developer_message: developer_message.into(),
            user_message: user_message.into(),
            model,
            api_key: api_key.into(),
        }
    }

    /// Required fields that are still empty, in form order.
    ///
    /// The coordinator doesn't check these; the form calls this before submitting.
    pub fn missing_fields(&self) -> Vec<RequiredField> {
        let mut missing = Vec::new();
        if self.developer_message.trim().is_empty() {
            missing.push(RequiredField::DeveloperMessage);
        }
        if self.user_message.trim().is_empty() {
            missing.push(RequiredField::UserMessage);
        }
        if self.api_key.trim().is_empty() {
            missing.push(RequiredField::ApiKey);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

// Keep the credential out of logs and panic messages.
impl fmt::Debug for RequestPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPayload")
            .field("developer_message", &self.developer_message)
            .field("user_message", &self.user_message)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
