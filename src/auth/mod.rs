// Authentication module - OAuth 2.0 + PKCE for the Spotify Web API

pub mod pkce;

pub use pkce::{AuthSession, PkceFlow};
