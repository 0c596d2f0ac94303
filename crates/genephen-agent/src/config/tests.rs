#[cfg(test)]
mod tests {
    use super::super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_file_takes_defaults() {
        let file = write_config("[run]\ngene = \"KCNH2\"\n");
        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.run.gene, "KCNH2");
        assert_eq!(config.run.max_results, 20);
        assert!(config.run.prefer_full_text);
        assert!(config.run.pmids.is_empty());
        assert!(config.run.synonyms.is_empty());
        assert!(!config.run.expand_synonyms);
        assert_eq!(config.dispatcher.min_confidence, 0.7);
        assert_eq!(config.retriever.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_run_table() {
        let file = write_config(
            r#"
[run]
gene = "SCN5A"
synonyms = ["Nav1.5", "LQT3"]
expand_synonyms = true
pmids = ["12345", "67890"]
genotype_filter = "heterozygous"
date_range = [2000, 2024]
prefer_full_text = false

[dispatcher]
min_confidence = 0.5

[llm]
model = "gpt-4o"
classifier_model = "gpt-4o-mini"
"#,
        );
        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.run.pmids, vec!["12345".to_string(), "67890".to_string()]);
        assert_eq!(config.run.synonyms, vec!["Nav1.5".to_string(), "LQT3".to_string()]);
        assert!(config.run.expand_synonyms);
        assert_eq!(config.run.genotype_filter, Some(Genotype::Heterozygous));
        assert_eq!(config.run.date_range, Some((2000, 2024)));
        assert!(!config.run.prefer_full_text);
        assert_eq!(config.dispatcher.min_confidence, 0.5);
        assert_eq!(config.llm.classifier_model(), "gpt-4o-mini");
    }

    #[test]
    fn test_env_fills_only_empty_secrets() {
        let file = write_config("[run]\ngene = \"KCNH2\"\n\n[llm]\napi_key = \"from-file\"\n");
        let mut config = Config::from_file(file.path()).unwrap();
        config.apply_env(|key| match key {
            "NCBI_API_KEY" => Some("ncbi-env".to_string()),
            "GENEPHEN_LLM_API_KEY" => Some("llm-env".to_string()),
            _ => None,
        });

        assert_eq!(config.retriever.api_key.as_deref(), Some("ncbi-env"));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_validate_rejects_bad_runs() {
        let mut config = Config::from_file(write_config("[run]\ngene = \"  \"\n").path()).unwrap();
        assert!(config.validate().is_err());

        config.run.gene = "KCNH2".into();
        config.run.date_range = Some((2024, 2000));
        assert!(config.validate().is_err());

        config.run.date_range = None;
        config.dispatcher.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_run_table_is_an_error() {
        let file = write_config("[dispatcher]\nmin_confidence = 0.7\n");
        assert!(Config::from_file(file.path()).is_err());
    }
}
