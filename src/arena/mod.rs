// Arena-based storage for listener records
//
// Each channel owns one Registry: a slab of SlotRecords plus the ordering,
// free list and deferred-disposal bookkeeping around it. Records never move
// between channels. SlotId and ChannelId are lightweight handles into it.

pub mod registry;
pub mod slot;

pub use registry::Registry;
pub use slot::{ChannelId, SlotId};
