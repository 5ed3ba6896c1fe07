use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_WORKSHEET: &str = "Raw Data";
pub const DEFAULT_CURSOR_PATH: &str = ".sync_cursor.json";
pub const DEFAULT_CONFIG_FILE: &str = "coldsheet.toml";
pub const DOTENV_FILE: &str = ".env";

pub const DB_PATH_VAR: &str = "COLD_TURKEY_DB_PATH";
pub const SHEET_ID_VAR: &str = "GOOGLE_SHEET_ID";
pub const WORKSHEET_VAR: &str = "GOOGLE_SHEET_WORKSHEET";
pub const CREDENTIALS_VAR: &str = "GOOGLE_SERVICE_ACCOUNT_JSON";
pub const CURSOR_PATH_VAR: &str = "SYNC_CURSOR_PATH";
pub const LOG_DIR_VAR: &str = "SYNC_LOG_DIR";
pub const CONFIG_FILE_VAR: &str = "COLDSHEET_CONFIG";

/// Everything a sync run needs to know. Built once at startup and handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Cold Turkey statistics database.
    pub db_path: PathBuf,
    pub sheet_id: String,
    pub worksheet: String,
    /// Service account key used for the Sheets API.
    pub credentials_path: PathBuf,
    pub cursor_path: PathBuf,
    pub log_dir: Option<PathBuf>,
}

/// Optional on-disk configuration. Environment variables take precedence over it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db_path: Option<PathBuf>,
    pub sheet_id: Option<String>,
    pub worksheet: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub cursor_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}

/// Reads `KEY=value` pairs from a dotenv file. A missing file is the same as an empty one.
fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let to_error = |source| ConfigError::Dotenv {
        path: path.to_owned(),
        source,
    };
    let vars = dotenvy::from_path_iter(path)
        .map_err(to_error)?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(to_error)?;
    debug!("Loaded {} variables from {path:?}", vars.len());
    Ok(vars)
}

impl SyncConfig {
    /// Loads configuration from the process environment, `.env` and the optional config file,
    /// all relative to the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [SyncConfig::load] but with an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup_in(lookup, Path::new("."))
    }

    /// Resolves with `.env` and the default config file taken from `dir`. Variables returned by
    /// `lookup` are never overridden by `.env`, even when they are empty.
    pub fn from_lookup_in(
        lookup: impl Fn(&str) -> Option<String>,
        dir: &Path,
    ) -> Result<Self, ConfigError> {
        let dotenv = read_dotenv(&dir.join(DOTENV_FILE))?;
        let lookup = |name: &str| {
            lookup(name)
                .or_else(|| dotenv.get(name).cloned())
                .filter(|v| !v.trim().is_empty())
        };

        let file = match lookup(CONFIG_FILE_VAR) {
            Some(path) => FileConfig::from_path(Path::new(&path))?,
            None => {
                let default = dir.join(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    FileConfig::from_path(&default)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Self::resolve(lookup, file)
    }

    fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        file: FileConfig,
    ) -> Result<Self, ConfigError> {
        let non_empty_path = |v: Option<PathBuf>| v.filter(|v| !v.as_os_str().is_empty());
        let non_empty = |v: Option<String>| v.filter(|v| !v.trim().is_empty());

        let db_path = lookup(DB_PATH_VAR)
            .map(PathBuf::from)
            .or(non_empty_path(file.db_path));
        let sheet_id = lookup(SHEET_ID_VAR).or(non_empty(file.sheet_id));
        let credentials_path = lookup(CREDENTIALS_VAR)
            .map(PathBuf::from)
            .or(non_empty_path(file.credentials_path));

        let mut missing = vec![];
        if db_path.is_none() {
            missing.push(DB_PATH_VAR);
        }
        if sheet_id.is_none() {
            missing.push(SHEET_ID_VAR);
        }
        if credentials_path.is_none() {
            missing.push(CREDENTIALS_VAR);
        }

        let (Some(db_path), Some(sheet_id), Some(credentials_path)) =
            (db_path, sheet_id, credentials_path)
        else {
            return Err(ConfigError::Missing(missing));
        };

        let config = SyncConfig {
            db_path,
            sheet_id,
            worksheet: lookup(WORKSHEET_VAR)
                .or(non_empty(file.worksheet))
                .unwrap_or_else(|| DEFAULT_WORKSHEET.into()),
            credentials_path,
            cursor_path: lookup(CURSOR_PATH_VAR)
                .map(PathBuf::from)
                .or(non_empty_path(file.cursor_path))
                .unwrap_or_else(|| DEFAULT_CURSOR_PATH.into()),
            log_dir: lookup(LOG_DIR_VAR)
                .map(PathBuf::from)
                .or(non_empty_path(file.log_dir)),
        };
        debug!("Resolved configuration {config:?}");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use anyhow::Result;
    use tempfile::{tempdir, NamedTempFile};

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_env_with_defaults() -> Result<()> {
        let config = SyncConfig::resolve(
            lookup_from(&[
                (DB_PATH_VAR, "/data/stats.db"),
                (SHEET_ID_VAR, "sheet"),
                (CREDENTIALS_VAR, "/keys/sa.json"),
            ]),
            FileConfig::default(),
        )?;
        assert_eq!(
            config,
            SyncConfig {
                db_path: "/data/stats.db".into(),
                sheet_id: "sheet".into(),
                worksheet: DEFAULT_WORKSHEET.into(),
                credentials_path: "/keys/sa.json".into(),
                cursor_path: DEFAULT_CURSOR_PATH.into(),
                log_dir: None,
            }
        );
        Ok(())
    }

    #[test]
    fn test_reports_every_missing_value() {
        let result = SyncConfig::resolve(
            lookup_from(&[(SHEET_ID_VAR, "sheet")]),
            FileConfig::default(),
        );
        match result {
            Err(ConfigError::Missing(missing)) => {
                assert_eq!(missing, vec![DB_PATH_VAR, CREDENTIALS_VAR])
            }
            other => panic!("Expected missing configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_values_are_missing() {
        let result = SyncConfig::from_lookup(lookup_from(&[
            (DB_PATH_VAR, ""),
            (SHEET_ID_VAR, "  "),
            (CREDENTIALS_VAR, "/keys/sa.json"),
            (CONFIG_FILE_VAR, ""),
        ]));
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required configuration: COLD_TURKEY_DB_PATH, GOOGLE_SHEET_ID"
        );
    }

    #[test]
    fn test_file_fills_gaps_and_env_wins() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"
db_path = "/from/file.db"
sheet_id = "file-sheet"
credentials_path = "/from/file.json"
worksheet = "Stats"
cursor_path = "/state/cursor.json"
"#
        )?;
        let path = file.path().to_string_lossy().to_string();

        let config = SyncConfig::from_lookup(lookup_from(&[
            (CONFIG_FILE_VAR, path.as_str()),
            (SHEET_ID_VAR, "env-sheet"),
        ]))?;
        assert_eq!(config.db_path, PathBuf::from("/from/file.db"));
        assert_eq!(config.sheet_id, "env-sheet");
        assert_eq!(config.worksheet, "Stats");
        assert_eq!(config.cursor_path, PathBuf::from("/state/cursor.json"));
        Ok(())
    }

    #[test]
    fn test_broken_file_is_an_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "db_path = ")?;
        let path = file.path().to_string_lossy().to_string();

        let result = SyncConfig::from_lookup(lookup_from(&[(CONFIG_FILE_VAR, path.as_str())]));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        let result =
            SyncConfig::from_lookup(lookup_from(&[(CONFIG_FILE_VAR, "/does/not/exist.toml")]));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
        Ok(())
    }

    #[test]
    fn test_dotenv_in_working_directory() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join(DOTENV_FILE),
            "COLD_TURKEY_DB_PATH=/db\nGOOGLE_SHEET_ID=s\n# service account\nGOOGLE_SERVICE_ACCOUNT_JSON=\"/k.json\"\n",
        )?;

        let config = SyncConfig::from_lookup_in(|_| None, dir.path())?;
        assert_eq!(config.db_path, PathBuf::from("/db"));
        assert_eq!(config.sheet_id, "s");
        assert_eq!(config.credentials_path, PathBuf::from("/k.json"));
        assert_eq!(config.worksheet, DEFAULT_WORKSHEET);
        Ok(())
    }

    #[test]
    fn test_environment_wins_over_dotenv() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join(DOTENV_FILE),
            "COLD_TURKEY_DB_PATH=/db\nGOOGLE_SHEET_ID=dotenv-sheet\nGOOGLE_SERVICE_ACCOUNT_JSON=/k.json\n",
        )?;
        fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "sheet_id = \"file-sheet\"\nworksheet = \"Stats\"\n",
        )?;

        let config =
            SyncConfig::from_lookup_in(lookup_from(&[(SHEET_ID_VAR, "env-sheet")]), dir.path())?;
        assert_eq!(config.sheet_id, "env-sheet");
        assert_eq!(config.worksheet, "Stats");

        // A variable set to an empty value is still set, so .env can't fill it in.
        let result = SyncConfig::from_lookup_in(lookup_from(&[(SHEET_ID_VAR, "")]), dir.path());
        assert!(matches!(result, Err(ConfigError::Missing(missing)) if missing == vec![SHEET_ID_VAR]));
        Ok(())
    }

    #[test]
    fn test_broken_dotenv_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(DOTENV_FILE), "GOOGLE_SHEET_ID='unterminated\n")?;
        let result = SyncConfig::from_lookup_in(|_| None, dir.path());
        assert!(matches!(result, Err(ConfigError::Dotenv { .. })));
        Ok(())
    }
}
