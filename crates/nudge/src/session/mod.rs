//! The editing session: event intake, request admission, and the
//! completion pipeline.
//!
//! - **[`completion`]**: [`CompletionSession`], the explicit owner of
//!   activity history and analysis cache for one editing session.
//! - **[`events`]**: inbound [`EditorEvent`]s from the host and outbound
//!   [`CompletionEvent`]s for observers.
//! - **[`gate`]**: [`AdmissionGate`] (debounce and rapid-typing guard).
//! - **[`clock`]**: the [`Clock`] seam used for every timestamp.

pub mod clock;
pub mod completion;
pub mod events;
pub mod gate;

pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::{CompletionRequest, CompletionSession};
pub use events::{
    CompletionEvent, CompositeEventHandler, EditorEvent, EventHandler, FnEventHandler,
    LoggingHandler, NoopHandler, TextChange,
};
pub use gate::{AdmissionGate, Suppression, Trigger};
