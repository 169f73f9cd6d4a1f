use tutor::ollama::OllamaClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ollama: OllamaClient,
}
