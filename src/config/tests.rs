use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.embedding.provider = ProviderKind::Local;
        original_config.embedding.ollama_model = "mxbai-embed-large".to_string();
        original_config.ingest.mode = EmbeddingMode::Explicit;
        original_config.llm.max_tokens = Some(512);

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let loaded_config =
            Config::from_file(&config_path).expect("should read from config_path successfully");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn secrets_are_not_written_when_absent() {
        let toml_content =
            toml::to_string_pretty(&Config::default()).expect("config should serialize");
        assert!(!toml_content.contains("api_key"));
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [store
            collection = "embeddings"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_provider_in_toml() {
        let toml_str = r#"
            [embedding]
            provider = "sentence-transformers"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn provider_parsing() {
        assert_eq!("api".parse::<ProviderKind>().ok(), Some(ProviderKind::Api));
        assert_eq!(
            "local".parse::<ProviderKind>().ok(),
            Some(ProviderKind::Local)
        );
        assert_eq!(
            " default ".parse::<ProviderKind>().ok(),
            Some(ProviderKind::Default)
        );
        assert!("API".parse::<ProviderKind>().is_err());
        assert!(String::new().parse::<ProviderKind>().is_err());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::UnsupportedProvider("magic".to_string()),
            ConfigError::InvalidBatchSize(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::MissingCredential("OPENAI_API_KEY"),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let message = ConfigError::MissingCredential("EMBEDDING_API_KEY").to_string();
        assert!(message.contains("EMBEDDING_API_KEY"));
    }

    #[test]
    fn default_config_file_location() {
        if let Some(path) = get_config_file() {
            assert!(path.ends_with("rag-search/config.toml"));
        }
    }
}
