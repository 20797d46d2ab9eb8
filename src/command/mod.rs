//! Command channel - message model, pending callbacks, and the processor.

mod message;
mod pending;
mod processor;

pub use message::{CommandMessage, NO_CALLBACK};
pub use pending::{
    unused_id, Callback, Completion, PendingCallback, PendingCallbackSet, CALLBACK_ID_MAX,
    CALLBACK_ID_MIN,
};
pub use processor::CommandProcessor;
