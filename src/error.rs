use std::any::Any;

use thiserror::Error;

/// A listener panicked while being invoked by a dispatch.
///
/// The panic is caught at the single-listener boundary; the listener has
/// already been removed from its channel by the time this is reported.
#[derive(Debug, Clone, Error)]
#[error("listener panicked: {message}")]
pub struct ListenerPanic {
    message: String,
}

impl ListenerPanic {
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("non-string panic payload")
        };
        Self { message }
    }

    /// Message the listener panicked with.
    pub fn message(&self) -> &str {
        &self.message
    }
}
