use crate::{
    context::set_tag,
    models::{context_tag_keys::*, Tags},
    Config,
};

/// The application sending telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationContext {
    /// Application version.
    pub ver: Option<String>,
    /// Application build.
    pub build: Option<String>,
}

impl ApplicationContext {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            ver: config.application_version.clone(),
            build: config.application_build.clone(),
        }
    }

    pub(crate) fn apply(&self, tags: &mut Tags) {
        set_tag(tags, APPLICATION_VERSION, self.ver.as_deref());
        set_tag(tags, APPLICATION_BUILD, self.build.as_deref());
    }
}
