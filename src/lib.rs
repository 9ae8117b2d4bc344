pub mod config;
pub mod console;
pub mod conversation;
pub mod error;
pub mod fallback;
pub mod http;
pub mod llm;
pub mod normalize;
pub mod request;
pub mod session;
