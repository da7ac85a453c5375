//! Authentication: token lifecycle, OAuth flow, and the facade over both.

pub mod flow;
pub mod service;
pub mod token_client;
pub mod token_manager;
pub mod token_store;

pub use flow::{is_valid_authorization_code, strip_callback_params, CallbackOutcome, FlowState, OAuthFlow};
pub use service::AuthService;
pub use token_client::{CodeExchange, IdentityClient, TokenEndpoint};
pub use token_manager::{TokenManager, TokenState};
pub use token_store::TokenStore;
