use crate::{
    context::set_tag,
    models::{context_tag_keys::*, Tags},
    Config,
};

const SDK_NAME: &str = "rust";

/// Describes the SDK itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalContext {
    /// `rust:<version>`, prefixed with the configured SDK extension.
    pub sdk_version: String,
    /// Version of the agent that installed the SDK, if any.
    pub agent_version: Option<String>,
}

impl InternalContext {
    pub(crate) fn new(config: &Config) -> Self {
        let sdk_version = format!("{}:{}", SDK_NAME, env!("CARGO_PKG_VERSION"));
        Self {
            sdk_version: match config.sdk_extension.as_deref() {
                Some(extension) if !extension.is_empty() => {
                    format!("{}_{}", extension, sdk_version)
                }
                _ => sdk_version,
            },
            agent_version: None,
        }
    }

    pub(crate) fn apply(&self, tags: &mut Tags) {
        set_tag(tags, INTERNAL_SDK_VERSION, Some(&self.sdk_version));
        set_tag(tags, INTERNAL_AGENT_VERSION, self.agent_version.as_deref());
    }
}
