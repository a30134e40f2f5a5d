mod boot;
mod purchase;
mod refund;

pub use boot::*;
pub use purchase::*;
pub use refund::*;
