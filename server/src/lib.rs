//! Wires the Intent Router (C11, §4.11) onto the rest of the backend: an
//! [`app::App`] owns every component, [`router::IntentRouter`] dispatches
//! the six tools, and [`transport`] carries them over line-delimited JSON
//! stdio (§6).

pub mod app;
pub mod envelope;
pub mod router;
pub mod schema;
pub mod tools;
pub mod transport;

pub use app::App;
pub use envelope::Envelope;
pub use router::IntentRouter;
