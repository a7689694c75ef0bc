pub mod auth;
pub mod client;
pub mod clock;
pub mod credentials;
pub mod password;
pub mod token;
pub mod token_policy;
