//! Built-in error handlers.

mod redirect;
mod respond;
mod www_authenticate;

pub use redirect::RedirectErrorHandler;
pub use respond::RespondErrorHandler;
pub use www_authenticate::WwwAuthenticateErrorHandler;
