use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan_roots: Vec<String>,
    pub protected_prefixes: Vec<String>,
    pub ignore_patterns: Vec<String>,
    /// Checked in order; the first program whose name appears in a path wins.
    pub known_programs: Vec<String>,
    pub min_file_size_kb: u64,
    pub max_files: usize,
    pub worker_count: usize,
    pub dry_run: bool,
    pub backup_dir: String,
    pub reference_root: String,
    pub oracle: OracleConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan_roots: to_strings(&[
                "~/Library/Caches",
                "/Library/Caches",
                "~/Library/Logs",
                "/private/var/tmp",
                "/private/var/log",
            ]),
            protected_prefixes: to_strings(&[
                "/Library/Caches/com.apple.",
                "/private/var/db/",
                "/private/var/protected/",
                "/private/var/folders/",
            ]),
            ignore_patterns: Vec::new(),
            known_programs: to_strings(&["Android Studio", "Transporter"]),
            min_file_size_kb: 10,
            max_files: 10_000,
            worker_count: 4,
            dry_run: false,
            backup_dir: "~/SystemDataCleanupBackup".to_string(),
            reference_root: "~".to_string(),
            oracle: OracleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    /// Falls back to `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub rate_limit_cooldown_secs: u64,
    pub request_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            max_attempts: 3,
            rate_limit_cooldown_secs: 5,
            request_timeout_secs: 60,
            max_tokens: 150,
            temperature: 0.5,
        }
    }
}

impl OracleConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn scan_root_paths(&self) -> Vec<PathBuf> {
        let expanded: Vec<PathBuf> = self.scan_roots.iter().map(|r| expand_home(r)).collect();
        non_overlapping_roots(expanded)
    }

    pub fn backup_root(&self) -> PathBuf {
        expand_home(&self.backup_dir)
    }

    pub fn reference_root_path(&self) -> PathBuf {
        expand_home(&self.reference_root)
    }

    pub fn min_file_size_bytes(&self) -> u64 {
        self.min_file_size_kb * 1024
    }

    pub fn effective_worker_count(&self) -> usize {
        self.worker_count.max(1)
    }
}

/// Load `Config.*` from the working directory (optional), then `SWEEP_*`
/// environment overrides. Nested keys use `__`, e.g. `SWEEP_ORACLE__MODEL`.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("SWEEP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("scan_roots")
                .with_list_parse_key("protected_prefixes")
                .with_list_parse_key("ignore_patterns")
                .with_list_parse_key("known_programs"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Expand a leading `~` to `$HOME`. Paths without one are returned as-is.
pub fn expand_home(path: &str) -> PathBuf {
    let home = env::var_os("HOME").map(PathBuf::from);
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Drop roots nested inside another root so no file is scanned twice.
/// Keeps the first-seen order of the surviving roots.
pub fn non_overlapping_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut kept: Vec<PathBuf> = Vec::new();

    for root in roots {
        if kept.iter().any(|k| root.starts_with(k)) {
            continue;
        }
        kept.retain(|k| !k.starts_with(&root));
        kept.push(root);
    }

    kept
}

pub(crate) fn is_under_any(path: &Path, prefixes: &[String]) -> bool {
    let path = path.to_string_lossy();
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cleanup_profile() {
        let config = AppConfig::default();
        assert_eq!(config.known_programs, vec!["Android Studio", "Transporter"]);
        assert_eq!(config.min_file_size_bytes(), 10 * 1024);
        assert_eq!(config.max_files, 10_000);
        assert_eq!(config.oracle.max_attempts, 3);
        assert_eq!(config.oracle.cooldown(), Duration::from_secs(5));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_worker_count_clamped() {
        let config = AppConfig {
            worker_count: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.effective_worker_count(), 1);
    }

    #[test]
    fn test_expand_home() {
        let Some(home) = env::var_os("HOME").map(PathBuf::from) else {
            return;
        };
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/Library/Caches"), home.join("Library/Caches"));
        assert_eq!(expand_home("/private/var/log"), PathBuf::from("/private/var/log"));
    }

    #[test]
    fn test_non_overlapping_roots_drops_nested() {
        let roots = vec![
            PathBuf::from("/home/user/Library"),
            PathBuf::from("/home/user/Library/Caches"),
            PathBuf::from("/var/log"),
        ];
        let result = non_overlapping_roots(roots);
        assert_eq!(
            result,
            vec![PathBuf::from("/home/user/Library"), PathBuf::from("/var/log")]
        );
    }

    #[test]
    fn test_non_overlapping_roots_parent_after_child() {
        let roots = vec![
            PathBuf::from("/var/log/app"),
            PathBuf::from("/var/log"),
        ];
        assert_eq!(non_overlapping_roots(roots), vec![PathBuf::from("/var/log")]);
    }

    #[test]
    fn test_is_under_any_is_string_prefix() {
        let prefixes = vec!["/Library/Caches/com.apple.".to_string()];
        assert!(is_under_any(
            Path::new("/Library/Caches/com.apple.Safari/db"),
            &prefixes
        ));
        assert!(!is_under_any(Path::new("/Library/Caches/org.mozilla/db"), &prefixes));
    }

    #[test]
    fn test_load_configuration_without_file_uses_defaults() {
        let config = load_configuration().unwrap();
        assert_eq!(config.oracle.model, AppConfig::default().oracle.model);
    }
}
