//! AI collaborator for Talaria chatbot automations.
//!
//! A single capability: answer a question in the context of a conversation.
//! The HTTP implementation talks to any OpenAI-compatible endpoint; mocks
//! ship here so downstream crates can test chatbot paths without a network.

pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod responder;

pub use config::AiConfig;
pub use error::AiError;
pub use http::HttpAiResponder;
pub use mock::{FailingAiResponder, StaticAiResponder};
pub use responder::AiResponder;
