//! Lifecycle event pipeline for the task runner.
//!
//! Subscribers are registered once at startup and dispatched in registration
//! order; there is no dynamic lookup. The stash guard is the canonical
//! subscriber: it saves before the run and restores after it, on both the
//! success and the error path.

use anyhow::Result;

use crate::core::context::RunContext;
use crate::core::result::RunReport;

/// Hooks into the run lifecycle.
///
/// `before_run` cannot fail the run. `after_run` and `on_error` may surface
/// fatal errors (a failed stash pop must abort the run loudly).
pub trait RunSubscriber {
    fn before_run(&mut self, ctx: &RunContext);

    fn after_run(&mut self, ctx: &RunContext, report: &RunReport) -> Result<()>;

    fn on_error(&mut self, ctx: &RunContext) -> Result<()>;
}

/// Ordered list of lifecycle subscribers.
#[derive(Default)]
pub struct EventPipeline {
    subscribers: Vec<Box<dyn RunSubscriber>>,
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn RunSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn dispatch_before_run(&mut self, ctx: &RunContext) {
        for subscriber in &mut self.subscribers {
            subscriber.before_run(ctx);
        }
    }

    /// Dispatch `after_run` to every subscriber; the first error is returned
    /// after all subscribers have been notified.
    pub fn dispatch_after_run(&mut self, ctx: &RunContext, report: &RunReport) -> Result<()> {
        let mut first_error = None;
        for subscriber in &mut self.subscribers {
            if let Err(err) = subscriber.after_run(ctx, report) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Dispatch `on_error` to every subscriber; the first error is returned
    /// after all subscribers have been notified.
    pub fn dispatch_on_error(&mut self, ctx: &RunContext) -> Result<()> {
        let mut first_error = None;
        for subscriber in &mut self.subscribers {
            if let Err(err) = subscriber.on_error(ctx) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
