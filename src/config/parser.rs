use crate::config::types::Config;
use crate::config::validation::{validate, validate_zipcode};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use zip_sweep::config::load_config;
///
/// let config = load_config(Path::new("zip-sweep.toml")).unwrap();
/// println!("Max attempts: {}", config.crawler.max_attempts);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Each crawl run stores this hash so results can be traced back to the
/// configuration that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Collects the postal codes to crawl
///
/// Inline `codes` come first, followed by the lines of `file` (blank lines and
/// `#` comments skipped). Duplicates are dropped, keeping the first occurrence.
/// A relative `file` path is resolved against `base_dir`.
pub fn load_zipcodes(config: &Config, base_dir: &Path) -> Result<Vec<String>, ConfigError> {
    let mut codes: Vec<String> = config.zipcodes.codes.clone();

    if let Some(file) = &config.zipcodes.file {
        let path = base_dir.join(file);
        let content = std::fs::read_to_string(&path)?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            validate_zipcode(line)?;
            codes.push(line.to_string());
        }
    }

    Ok(dedup_preserving_order(codes))
}

/// Validates postal codes given on the command line
pub fn zipcodes_from_args(args: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut codes = Vec::with_capacity(args.len());
    for arg in args {
        let code = arg.trim();
        validate_zipcode(code)?;
        codes.push(code.to_string());
    }
    Ok(dedup_preserving_order(codes))
}

/// Drops repeated postal codes, keeping the first occurrence of each
pub fn dedup_preserving_order(codes: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    codes
        .into_iter()
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[crawler]
max-attempts = 5
min-delay-ms = 100
max-delay-ms = 200
detail-workers = 2
mode = "pins"

[endpoints]
geography-url = "https://www.example.com/services/geography/search/"
search-url = "https://www.example.com/services/search/"

[headers]
"User-Agent" = "Mozilla/5.0"
"Content-Type" = "application/json"

[output]
database-path = "./test.db"

[zipcodes]
codes = ["90001", "90002", "90001"]
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_attempts, 5);
        assert_eq!(config.crawler.detail_workers, 2);
        assert_eq!(config.crawler.mode, crate::config::CrawlMode::Pins);
        assert_eq!(config.crawler.request_timeout_secs, 30);
        assert_eq!(config.endpoints.fragment_pointer, "/PlacardState/HTML");
        assert_eq!(config.headers.len(), 2);
    }

    #[test]
    fn test_defaults_apply() {
        let config_content = r#"
[crawler]

[endpoints]
geography-url = "https://www.example.com/g/"
search-url = "https://www.example.com/s/"

[output]
database-path = "./test.db"
"#;
        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_attempts, 10);
        assert_eq!(config.crawler.min_delay_ms, 1_000);
        assert_eq!(config.crawler.max_delay_ms, 5_000);
        assert_eq!(config.crawler.mode, crate::config::CrawlMode::Detail);
        assert!(config.crawler.skip_known_listings);
        assert!(config.zipcodes.codes.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/zip-sweep.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawler]
min-delay-ms = 5000
max-delay-ms = 1000

[endpoints]
geography-url = "https://www.example.com/g/"
search-url = "https://www.example.com/s/"

[output]
database-path = "./test.db"
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_config_with_bad_selector() {
        let config_content = r#"
[crawler]

[endpoints]
geography-url = "https://www.example.com/g/"
search-url = "https://www.example.com/s/"
listing-selector = "a[[["

[output]
database-path = "./test.db"
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidSelector(_)));
    }

    #[test]
    fn test_load_zipcodes_merges_file_and_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("zips.txt"),
            "# Los Angeles\n90002\n\n90003\n90001\n",
        )
        .unwrap();

        let file = create_temp_config(&VALID_CONFIG.replace(
            "codes = [\"90001\", \"90002\", \"90001\"]",
            "codes = [\"90001\", \"90002\", \"90001\"]\nfile = \"zips.txt\"",
        ));
        let config = load_config(file.path()).unwrap();
        let codes = load_zipcodes(&config, dir.path()).unwrap();

        assert_eq!(codes, vec!["90001", "90002", "90003"]);
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("zip-sweep.example.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.crawler.max_attempts, 10);
        assert!(config.crawler.skip_known_listings);
    }

    #[test]
    fn test_zipcodes_from_args() {
        let args = vec![" 90001".to_string(), "90002".to_string(), "90001".to_string()];
        assert_eq!(zipcodes_from_args(&args).unwrap(), vec!["90001", "90002"]);

        let args = vec!["".to_string()];
        assert!(zipcodes_from_args(&args).is_err());
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
