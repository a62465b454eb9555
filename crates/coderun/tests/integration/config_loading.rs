use coderun::config::Config;
use coderun::{ConfigError, HarnessMode, SupportedLanguage};

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(
        config.enabled_languages(),
        [SupportedLanguage::Cpp, SupportedLanguage::Python]
    );
    assert_eq!(config.harness_mode, HarnessMode::PerCase);
    assert_eq!(config.max_concurrent_runs, 2);
    assert_eq!(config.default_limits.time_limit, Some(2.0));

    let cpp = config.get_toolchain(SupportedLanguage::Cpp).unwrap();
    let run = config.effective_limits(cpp, None);
    assert_eq!(run.memory_limit, Some(131072));
    assert_eq!(run.wall_time_limit, Some(4.0));
    assert_eq!(config.effective_compile_limits(cpp).wall_time_limit, Some(45.0));
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.enabled_languages(), [SupportedLanguage::Bash]);
    assert_eq!(config.harness_mode, HarnessMode::Batch);
}

#[test]
fn test_load_invalid_unknown_language() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_unknown_language.toml");
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::UnknownLanguage(tag)) if tag == "cobol"));
}

#[test]
fn test_load_invalid_empty_run_command() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_run_command.toml");
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_zero_wall_time() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_zero_wall_time.toml");
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}
