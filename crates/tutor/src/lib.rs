pub mod client;
pub mod codec;
pub mod errors;
pub mod markup;
pub mod models;
pub mod ollama;
pub mod practice;
pub mod prompt_template;
pub mod relay;
pub mod session;
pub mod store;
