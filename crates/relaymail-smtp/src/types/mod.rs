//! Core SMTP types.

mod address;
mod extension;
mod reply;

pub use address::{Recipients, quote_address};
pub use extension::{AuthMechanism, Capabilities};
pub use reply::{Reply, ReplyCode};
