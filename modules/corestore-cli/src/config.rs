use std::path::PathBuf;

/// Environment configuration for the CLI. Command-line arguments take
/// precedence over anything set here.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Default definition file (`CORESTORE_DEFINITION`).
    pub definition: Option<PathBuf>,
    /// Log filter directive (`CORESTORE_LOG`).
    pub log: String,
}

impl CliConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            definition: std::env::var("CORESTORE_DEFINITION")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            log: std::env::var("CORESTORE_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Pick the definition path, preferring the one given on the command line.
    pub fn definition_or(&self, arg: Option<PathBuf>) -> Option<PathBuf> {
        arg.or_else(|| self.definition.clone())
    }
}
