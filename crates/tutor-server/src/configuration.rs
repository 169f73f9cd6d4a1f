use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use tutor::ollama::{self, OllamaConfig};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_host")]
    pub host: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            host: default_model_host(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
        }
    }
}

impl ModelSettings {
    pub fn into_config(self) -> OllamaConfig {
        OllamaConfig {
            host: self.host,
            text_model: self.text_model,
            vision_model: self.vision_model,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub model: ModelSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Model server defaults
            .set_default("model.host", default_model_host())?
            .set_default("model.text_model", default_text_model())?
            .set_default("model.vision_model", default_vision_model())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("TUTOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // Extract field name from error message "missing field `host`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model_host() -> String {
    ollama::OLLAMA_HOST.to_string()
}

fn default_text_model() -> String {
    ollama::OLLAMA_TEXT_MODEL.to_string()
}

fn default_vision_model() -> String {
    ollama::OLLAMA_VISION_MODEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("TUTOR_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.model.host, "http://localhost:11434");
        assert_eq!(settings.model.text_model, "llama3.2");
        assert_eq!(settings.model.vision_model, "llava");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("TUTOR_SERVER__PORT", "8080");
        env::set_var("TUTOR_MODEL__HOST", "http://gpu-box:11434");
        env::set_var("TUTOR_MODEL__TEXT_MODEL", "qwen2.5");
        env::set_var("TUTOR_MODEL__VISION_MODEL", "llama3.2-vision");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);

        let config = settings.model.into_config();
        assert_eq!(config.host, "http://gpu-box:11434");
        assert_eq!(config.text_model, "qwen2.5");
        assert_eq!(config.vision_model, "llama3.2-vision");

        // Clean up
        env::remove_var("TUTOR_SERVER__PORT");
        env::remove_var("TUTOR_MODEL__HOST");
        env::remove_var("TUTOR_MODEL__TEXT_MODEL");
        env::remove_var("TUTOR_MODEL__VISION_MODEL");
    }

    #[test]
    #[serial]
    fn test_invalid_port() {
        clean_env();
        env::set_var("TUTOR_SERVER__PORT", "not-a-port");

        let result = Settings::new();
        assert!(matches!(result, Err(ConfigError::Other(_))));

        env::remove_var("TUTOR_SERVER__PORT");
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
