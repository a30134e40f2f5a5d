mod events;
mod gateway;
mod payments;
mod tickets;

pub use events::*;
pub use gateway::*;
pub use payments::*;
pub use tickets::*;
