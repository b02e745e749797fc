//! Mock implementations for testing

mod notifier;
mod remote;

pub use notifier::RecordingNotifier;
pub use remote::{MockRemote, MockResponse};
