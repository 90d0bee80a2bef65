use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info, warn};

const CONFIG_ENV_VAR: &str = "STRIDE_CONFIG";
const BACKEND_URL_ENV_VAR: &str = "STRIDE_BACKEND_URL";
const ANON_KEY_ENV_VAR: &str = "STRIDE_ANON_KEY";
const TIMEZONE_ENV_VAR: &str = "STRIDE_TIMEZONE";

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    backend: Option<BackendSection>,
    timezone: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BackendSection {
    url: Option<String>,
    anon_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    file: ConfigFile,
    pub loaded_file: Option<PathBuf>,
}

impl Config {
    #[tracing::instrument(skip(override_path))]
    pub fn load(override_path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = resolve_config_path(override_path) else {
            warn!("no config file found; using defaults");
            return Ok(Self {
                file: ConfigFile::default(),
                loaded_file: None,
            });
        };

        info!(config = %path.display(), "loading config");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file = parse_config(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(Self {
            file,
            loaded_file: Some(path),
        })
    }

    /// Backend base URL. Env beats the config file; either way the value
    /// must be an http(s) URL.
    pub fn backend_url(&self) -> anyhow::Result<String> {
        let raw = env_non_empty(BACKEND_URL_ENV_VAR)
            .or_else(|| self.file.backend.as_ref().and_then(|b| b.url.clone()))
            .ok_or_else(|| {
                anyhow!(
                    "no backend url configured; set backend.url in the config \
                     file or the {BACKEND_URL_ENV_VAR} environment variable"
                )
            })?;

        let trimmed = raw.trim().trim_end_matches('/').to_string();
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(anyhow!("backend url must start with http:// or https://: {trimmed}"));
        }
        Ok(trimmed)
    }

    pub fn anon_key(&self) -> anyhow::Result<String> {
        env_non_empty(ANON_KEY_ENV_VAR)
            .or_else(|| {
                self.file
                    .backend
                    .as_ref()
                    .and_then(|b| b.anon_key.clone())
            })
            .ok_or_else(|| {
                anyhow!(
                    "no backend anon key configured; set backend.anon_key in \
                     the config file or the {ANON_KEY_ENV_VAR} environment \
                     variable"
                )
            })
    }

    /// Timezone used to truncate "now" to a calendar day. Falls back to UTC
    /// rather than failing: a bad timezone should not brick the CLI.
    pub fn timezone(&self) -> Tz {
        let candidate = env_non_empty(TIMEZONE_ENV_VAR).or_else(|| self.file.timezone.clone());

        let Some(raw) = candidate else {
            return chrono_tz::UTC;
        };

        match raw.trim().parse::<Tz>() {
            Ok(tz) => {
                debug!(timezone = %raw.trim(), "configured timezone");
                tz
            }
            Err(err) => {
                warn!(timezone = %raw, error = %err, "invalid timezone; using UTC");
                chrono_tz::UTC
            }
        }
    }

    pub fn color(&self) -> bool {
        match self.file.color.as_deref() {
            None => true,
            Some(value) => matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "y" | "yes" | "on" | "true"
            ),
        }
    }
}

fn parse_config(raw: &str) -> anyhow::Result<ConfigFile> {
    toml::from_str(raw).map_err(|e| anyhow!("invalid config toml: {e}"))
}

fn resolve_config_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if trimmed == "/dev/null" {
            return None;
        }
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let candidate = dirs::config_dir()?.join("stride").join("config.toml");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Where the session cache lives. Created on demand.
#[tracing::instrument(skip(override_dir))]
pub fn resolve_data_dir(override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else {
        dirs::data_dir()
            .ok_or_else(|| anyhow!("cannot determine data directory"))?
            .join("stride")
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn env_non_empty(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_config};

    fn config_from(raw: &str) -> Config {
        Config {
            file: parse_config(raw).expect("valid toml"),
            loaded_file: None,
        }
    }

    #[test]
    fn reads_backend_section() {
        let cfg = config_from(
            r#"
            timezone = "America/Mexico_City"
            color = "off"

            [backend]
            url = "https://example.supabase.co/"
            anon_key = "anon-123"
            "#,
        );

        assert_eq!(
            cfg.backend_url().expect("url"),
            "https://example.supabase.co"
        );
        assert_eq!(cfg.anon_key().expect("key"), "anon-123");
        assert_eq!(cfg.timezone(), chrono_tz::America::Mexico_City);
        assert!(!cfg.color());
    }

    #[test]
    fn rejects_non_http_backend_url() {
        let cfg = config_from("[backend]\nurl = \"example.supabase.co\"\n");
        assert!(cfg.backend_url().is_err());
    }

    #[test]
    fn missing_backend_settings_error() {
        let cfg = config_from("");
        assert!(cfg.backend_url().is_err());
        assert!(cfg.anon_key().is_err());
    }

    #[test]
    fn bad_timezone_falls_back_to_utc() {
        let cfg = config_from("timezone = \"Mars/Olympus_Mons\"\n");
        assert_eq!(cfg.timezone(), chrono_tz::UTC);
    }

    #[test]
    fn color_defaults_on() {
        assert!(config_from("").color());
        assert!(config_from("color = \"yes\"").color());
        assert!(!config_from("color = \"0\"").color());
    }

    #[test]
    fn garbage_toml_is_an_error() {
        assert!(parse_config("backend = [").is_err());
    }
}
