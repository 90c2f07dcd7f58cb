//! Observable in-memory stores shared by a conversation.
//!
//! Every store follows the same contract: mutations take effect immediately,
//! and listeners run synchronously, in registration order, after any mutation
//! that changed the snapshot. Listeners are invoked outside the store's lock,
//! so reading a snapshot from inside a listener is fine. Mutating the same
//! store from a listener is not supported.

mod listeners;
pub mod message_history;
pub mod text_stream;

pub use listeners::Subscription;
pub use message_history::MessageHistory;
pub use text_stream::TextStream;

pub(crate) use listeners::Listeners;
