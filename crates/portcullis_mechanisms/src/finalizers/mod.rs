//! Built-in finalizers.

mod cookie;
mod header;
mod noop;

pub use cookie::{CookieFinalizer, CookieTarget};
pub use header::HeaderFinalizer;
pub use noop::NoopFinalizer;
