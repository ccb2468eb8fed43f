use crate::{
    context::set_tag,
    convert::new_operation_id,
    models::{context_tag_keys::*, Tags},
};

/// The operation telemetry belongs to. A new operation starts with every page view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    /// W3C trace id of the operation.
    pub id: String,
    /// Operation name, usually the page name.
    pub name: Option<String>,
    /// Id of the parent telemetry item.
    pub parent_id: Option<String>,
    /// Synthetic source, e.g. a bot.
    pub synthetic_source: Option<String>,
    /// Correlation vector.
    pub correlation_vector: Option<String>,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationContext {
    /// A new operation with a random id.
    pub fn new() -> Self {
        Self {
            id: new_operation_id(),
            name: None,
            parent_id: None,
            synthetic_source: None,
            correlation_vector: None,
        }
    }

    pub(crate) fn apply(&self, tags: &mut Tags) {
        set_tag(tags, OPERATION_ID, Some(&self.id));
        set_tag(tags, OPERATION_NAME, self.name.as_deref());
        set_tag(tags, OPERATION_PARENT_ID, self.parent_id.as_deref());
        set_tag(tags, OPERATION_SYNTHETIC_SOURCE, self.synthetic_source.as_deref());
        set_tag(
            tags,
            OPERATION_CORRELATION_VECTOR,
            self.correlation_vector.as_deref(),
        );
    }
}
