mod error;
mod event;
mod ids;
mod payment;
mod refund;
mod ticket;
mod webhook;

pub use error::*;
pub use event::*;
pub use ids::*;
pub use payment::*;
pub use refund::*;
pub use ticket::*;
pub use webhook::*;
