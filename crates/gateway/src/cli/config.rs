use eve_domain::config::{Config, ConfigError, ConfigSeverity};

use super::LoadedConfig;

/// Every issue for a loaded config: failed overrides first, then validation.
pub fn issues(loaded: &LoadedConfig) -> Vec<ConfigError> {
    let mut all = loaded.override_errors.clone();
    all.extend(loaded.config.validate());
    all
}

/// Print config issues. Returns `false` when any of them is an error.
pub fn validate(loaded: &LoadedConfig) -> bool {
    let issues = issues(loaded);

    if issues.is_empty() {
        println!("Config OK ({})", loaded.path);
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }
    println!(
        "\n{error_count} error(s), {warning_count} warning(s) in {}",
        loaded.path
    );

    error_count == 0
}

/// The resolved config as TOML, password masked.
pub fn render(config: &Config) -> anyhow::Result<String> {
    let mut masked = config.clone();
    if !masked.eveng.password.is_empty() {
        masked.eveng.password = "***".into();
    }
    Ok(toml::to_string_pretty(&masked)?)
}

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}
