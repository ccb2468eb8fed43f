use crate::{
    context::set_tag,
    models::{context_tag_keys::*, Tags},
};

/// Where the end user is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationContext {
    /// Client IP address.
    pub ip: Option<String>,
}

impl LocationContext {
    pub(crate) fn apply(&self, tags: &mut Tags) {
        set_tag(tags, LOCATION_IP, self.ip.as_deref());
    }
}
