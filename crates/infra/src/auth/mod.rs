//! Interactive login helpers: a loopback callback receiver and a browser
//! [`Navigator`](tenantlink_core::ports::Navigator).

pub mod browser;
pub mod callback_server;

pub use browser::BrowserNavigator;
pub use callback_server::{CallbackServer, CallbackServerError};
