//! Poll domain: the aggregate, its value objects, the live-connection
//! message protocol, and the error taxonomy.

mod errors;
mod events;
mod model;

pub use errors::{PollError, StoreError};
pub use events::{ClientMessage, ServerMessage};
pub use model::{OptionId, Poll, PollId, PollOption};
