//! # Relay Emitter
//!
//! Patient-side half of the relay: turns form edits into envelopes on the publish endpoint.
//!
//! - [`DebounceTimer`]: a cancellable deadline
//! - [`Publisher`]: where envelopes go; [`HttpPublisher`] posts them to the relay endpoint
//! - [`FormSync`]: the debouncing actor; coalesces edits into `typing` envelopes and sends
//!   `submitted` / `reset` envelopes immediately
//! - [`FormSession`]: the in-progress form wired to a [`FormSync`]

pub mod error;
pub mod publisher;
pub mod session;
pub mod sync;
pub mod timer;

pub use error::{PublishError, SubmitError};
pub use publisher::{HttpPublisher, Publisher};
pub use session::FormSession;
pub use sync::FormSync;
pub use timer::DebounceTimer;
