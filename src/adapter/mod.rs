mod gateway;
mod http;
mod store;

pub use gateway::*;
pub use http::*;
pub use store::*;
