mod http;

pub use http::HttpIdentityProvider;
