use crate::models::{truncate_chars, Sanitize};
use serde::Serialize;

/// Exception details of the exception in a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Exception type name.
    pub type_name: String,

    /// Exception message.
    pub message: String,

    /// Whether `stack` holds the full stack.
    pub has_full_stack: bool,

    /// Text describing the stack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Sanitize for ExceptionDetails {
    fn sanitize(&mut self) {
        truncate_chars(&mut self.type_name, 1024);
        truncate_chars(&mut self.message, 32768);
        if let Some(stack) = self.stack.as_mut() {
            truncate_chars(stack, 32768);
        }
    }
}
