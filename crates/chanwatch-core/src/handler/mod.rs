/// Handler contract: the boundary between the runtime and plugin logic.
///
/// A handler receives one ready message at a time and may write results
/// into its own outbound directories. The runtime guarantees it is never
/// called twice for the same file and never re-entered concurrently; in
/// return a failing handler only costs that one message.
pub mod output;

pub use output::{OutputBatch, OutputChannel, Sequence};

use crate::model::Message;
use anyhow::anyhow;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Per-channel processing unit.
///
/// Handlers own their mutable state (typically a [`Sequence`]); `&mut self`
/// is enough because a handler instance is only ever driven by one watcher
/// thread.
pub trait Handler: Send {
    /// Process one ready inbound file.
    ///
    /// An `Err` is logged with the channel id and file path; the file is
    /// still considered dispatched and is never retried.
    fn handle(&mut self, message: &Message) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: FnMut(&Message) -> anyhow::Result<()> + Send,
{
    fn handle(&mut self, message: &Message) -> anyhow::Result<()> {
        self(message)
    }
}

/// Call `handler`, turning a panic into an ordinary handler error.
pub(crate) fn invoke(handler: &mut dyn Handler, message: &Message) -> anyhow::Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message))) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("handler panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
