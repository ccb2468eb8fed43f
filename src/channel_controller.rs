//! The terminal stage of the processing chain.

use crate::{
    diagnostics::{InternalMessageId, LoggingSeverity},
    models::TelemetryItem,
    plugin::{
        NextPlugin, PluginContext, PluginKind, TelemetryPlugin, CHANNEL_CONTROLLER_PRIORITY,
    },
    Error,
};
use once_cell::sync::OnceCell;
use serde_json::json;
use std::sync::Arc;

const CHANNEL_CONTROLLER_IDENTIFIER: &str = "ChannelControllerPlugin";

/// Fans every item out to one or more channel queues. Each queue is its own chain of channels
/// ordered by priority.
#[derive(Debug)]
pub struct ChannelController {
    queues: Vec<Vec<Arc<dyn TelemetryPlugin>>>,
    context: OnceCell<PluginContext>,
}

impl ChannelController {
    /// Validate and order `queues`.
    ///
    /// Every member must be a processing plugin with a priority in the channel band. Empty queues
    /// are dropped. Fails with [`Error::NoChannels`] if no channel remains.
    pub fn new(queues: Vec<Vec<Arc<dyn TelemetryPlugin>>>) -> Result<Self, Error> {
        let mut validated = Vec::with_capacity(queues.len());
        for mut queue in queues {
            if let Some(invalid) = queue.iter().find(|channel| {
                channel.kind() != PluginKind::Processing
                    || channel.priority() < CHANNEL_CONTROLLER_PRIORITY
            }) {
                return Err(Error::InvalidChannelPriority {
                    identifier: invalid.identifier().to_string(),
                    priority: invalid.priority(),
                });
            }
            if queue.is_empty() {
                continue;
            }
            queue.sort_by_key(|channel| channel.priority());
            validated.push(queue);
        }
        if validated.is_empty() {
            return Err(Error::NoChannels);
        }
        Ok(Self {
            queues: validated,
            context: OnceCell::new(),
        })
    }

    /// The ordered channel queues.
    pub fn queues(&self) -> &[Vec<Arc<dyn TelemetryPlugin>>] {
        &self.queues
    }

    fn channels(&self) -> impl Iterator<Item = &Arc<dyn TelemetryPlugin>> {
        self.queues.iter().flatten()
    }
}

impl TelemetryPlugin for ChannelController {
    fn identifier(&self) -> &str {
        CHANNEL_CONTROLLER_IDENTIFIER
    }

    fn priority(&self) -> u32 {
        CHANNEL_CONTROLLER_PRIORITY
    }

    fn initialize(&self, context: &PluginContext) -> Result<(), Error> {
        for (idx, queue) in self.queues.iter().enumerate() {
            log::debug!(
                "channel queue {}: {:?}",
                idx,
                queue.iter().map(|c| c.identifier()).collect::<Vec<_>>()
            );
            for channel in queue {
                channel.initialize(context)?;
            }
        }
        // A second initialization keeps the first context.
        let _ = self.context.set(context.clone());
        Ok(())
    }

    fn process_telemetry(
        &self,
        item: &mut TelemetryItem,
        next: NextPlugin<'_>,
    ) -> Result<(), Error> {
        let mut result = Ok(());
        let last = self.queues.len().saturating_sub(1);
        for (idx, queue) in self.queues.iter().enumerate() {
            let outcome = if idx == last {
                NextPlugin::new(queue).process(item)
            } else {
                NextPlugin::new(queue).process(&mut item.clone())
            };
            // Every queue gets the item even if an earlier one failed.
            if result.is_ok() {
                result = outcome;
            }
        }
        result?;
        next.process(item)
    }

    fn pause(&self) {
        self.channels().for_each(|channel| channel.pause());
    }

    fn resume(&self) {
        self.channels().for_each(|channel| channel.resume());
    }

    fn flush(&self, is_async: bool) -> Result<(), Error> {
        for channel in self.channels() {
            if let Err(err) = channel.flush(is_async) {
                match self.context.get() {
                    Some(context) => context.logger().throw_internal(
                        LoggingSeverity::Critical,
                        InternalMessageId::FlushFailed,
                        "flush failed, telemetry will not be collected",
                        Some(json!({
                            "channel": channel.identifier(),
                            "exception": err.to_string(),
                        })),
                        false,
                    )?,
                    None => return Err(err),
                }
            }
        }
        Ok(())
    }

    fn teardown(&self) {
        self.channels().for_each(|channel| channel.teardown());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Channel {
        id: &'static str,
        priority: u32,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl TelemetryPlugin for Channel {
        fn identifier(&self) -> &str {
            self.id
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn initialize(&self, _context: &PluginContext) -> Result<(), Error> {
            Ok(())
        }

        fn process_telemetry(
            &self,
            item: &mut TelemetryItem,
            next: NextPlugin<'_>,
        ) -> Result<(), Error> {
            self.seen.lock().unwrap().push(self.id);
            next.process(item)
        }
    }

    fn channel(
        id: &'static str,
        priority: u32,
        seen: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn TelemetryPlugin> {
        Arc::new(Channel {
            id,
            priority,
            seen: seen.clone(),
        })
    }

    #[test]
    fn queues_are_sorted_and_all_receive_the_item() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let controller = ChannelController::new(vec![
            vec![channel("b", 300, &seen), channel("a", 200, &seen)],
            vec![],
            vec![channel("c", 100, &seen)],
        ])
        .unwrap();
        assert_eq!(2, controller.queues().len());

        let end: Vec<Arc<dyn TelemetryPlugin>> = Vec::new();
        controller
            .process_telemetry(&mut TelemetryItem::default(), NextPlugin::new(&end))
            .unwrap();
        assert_eq!(vec!["a", "b", "c"], *seen.lock().unwrap());
    }

    #[test]
    fn rejects_low_priority_channel() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let err = ChannelController::new(vec![vec![channel("low", 99, &seen)]]).unwrap_err();
        assert!(matches!(err, Error::InvalidChannelPriority { priority: 99, .. }));
    }

    #[test]
    fn requires_a_channel() {
        assert!(matches!(
            ChannelController::new(vec![vec![]]),
            Err(Error::NoChannels)
        ));
    }
}
