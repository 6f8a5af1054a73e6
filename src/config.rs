use std::fmt;
use std::rc::Rc;

use crate::sink::{FailureSink, TracingSink};

/// Settings for a new channel.
///
/// # Example
///
/// ```
/// use slotted::{ChannelConfig, Signal1};
///
/// let signal: Signal1<u32> = Signal1::with_config(
///     ChannelConfig::new()
///         .name("score-changed")
///         .reserve(16)
///         .max_pooled(64),
/// );
/// assert_eq!(signal.name(), Some("score-changed"));
/// ```
#[derive(Clone)]
pub struct ChannelConfig {
    pub(crate) name: Option<Rc<str>>,
    pub(crate) reserve: usize,
    pub(crate) max_pooled: Option<usize>,
    pub(crate) sink: Rc<dyn FailureSink>,
}

impl ChannelConfig {
    /// Default settings: unnamed, no preallocation, unbounded pool, failures
    /// reported through [`TracingSink`].
    pub fn new() -> Self {
        Self {
            name: None,
            reserve: 0,
            max_pooled: None,
            sink: Rc::new(TracingSink),
        }
    }

    /// Label attached to every log event of the channel.
    pub fn name(mut self, name: impl Into<Rc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Storage reserved up front for `capacity` bindings. This only sizes the
    /// arena and lookup table; the free list starts empty and fills as
    /// records are released.
    pub fn reserve(mut self, capacity: usize) -> Self {
        self.reserve = capacity;
        self
    }

    /// Maximum number of cleared records kept for reuse. Records disposed
    /// while the pool is full are freed instead.
    pub fn max_pooled(mut self, max: usize) -> Self {
        self.max_pooled = Some(max);
        self
    }

    /// Where listener panics are reported.
    pub fn sink(mut self, sink: Rc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("name", &self.name)
            .field("reserve", &self.reserve)
            .field("max_pooled", &self.max_pooled)
            .finish_non_exhaustive()
    }
}
