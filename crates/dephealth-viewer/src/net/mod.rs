pub mod poller;
pub mod protocol;
pub mod retry;
pub mod uds;

pub use poller::{spawn_poller, Control, PollerHandle};
pub use protocol::{Incoming, IncomingKind};
