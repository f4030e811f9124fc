use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "codedrill", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,

    /// Whether to flush the existing database
    #[arg(long = "flush-data", short = 'f', default_value_t = false)]
    pub flush_data: bool,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> std::io::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    pub languages: Vec<LanguageConfig>,
}

#[derive(Deserialize, Debug)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

#[derive(Deserialize, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Bearer token lifetime in hours; defaults to 12
    pub token_hours: Option<i64>,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct JudgeConfig {
    /// Wall-clock budget for one test-case execution, in milliseconds
    pub time_limit_ms: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self { time_limit_ms: 2000 }
    }
}

/// One entry of the language table.
///
/// Languages are a registration, not a branch: adding support for a new
/// interpreter means adding an entry here, with `%SOURCE%` in `run_command`
/// standing for the materialized source file.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    pub name: String,
    pub file_name: String,
    pub run_command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.server.bind_address, Some("127.0.0.1".to_string()));
        assert_eq!(config.auth.token_hours, Some(12));
        assert_eq!(config.judge.time_limit_ms, 2000);
        assert_eq!(config.languages[0].name, "python");
        assert_eq!(config.languages[0].run_command[0], "python3");
    }

    #[test]
    fn test_judge_config_defaults_when_absent() {
        let config: Config = serde_json::from_str(
            r#"{
                "server": {"bind_address": null, "bind_port": null},
                "auth": {"jwt_secret": "s"},
                "languages": []
            }"#,
        )
        .unwrap();
        assert_eq!(config.judge.time_limit_ms, 2000);
        assert_eq!(config.auth.token_hours, None);
    }
}
