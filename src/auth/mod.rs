pub mod oauth;
pub mod pkce;
pub mod token;

pub use oauth::{login_with_browser, token_url, TokenPair};
