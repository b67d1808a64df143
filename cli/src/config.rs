use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

/// Copy one file into every immediate subdirectory of a folder.
#[derive(Debug, Parser)]
#[command(name = "fanout", version, about)]
pub struct Args {
    /// Directory whose immediate subdirectories receive the file
    pub parent: PathBuf,

    /// File to copy
    pub source: PathBuf,

    /// Config file (default: <config dir>/fanout/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Visit subdirectories in listing order instead of by name
    #[arg(long)]
    pub no_sort: bool,

    /// Print the final summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Seconds to wait for an in-flight copy after Ctrl-C
    #[arg(long)]
    pub grace_secs: Option<u64>,

    /// Where fanout.log is written
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Also log to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub sort_subdirectories: bool,
    pub shutdown_grace_secs: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            sort_subdirectories: true,
            shutdown_grace_secs: 3,
            log_dir: None,
        }
    }
}

/// Effective settings after merging the config file and CLI flags.
#[derive(Debug)]
pub struct Settings {
    pub parent: PathBuf,
    pub source: PathBuf,
    pub sort_subdirectories: bool,
    pub shutdown_grace: Duration,
    pub log_dir: PathBuf,
    pub json: bool,
    pub verbose: bool,
}

impl Settings {
    pub fn resolve(args: Args) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => load_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => load_file(&path)?,
                _ => FileConfig::default(),
            },
        };
        Ok(Self::merge(args, file))
    }

    fn merge(args: Args, file: FileConfig) -> Self {
        Self {
            sort_subdirectories: file.sort_subdirectories && !args.no_sort,
            shutdown_grace: Duration::from_secs(args.grace_secs.unwrap_or(file.shutdown_grace_secs)),
            log_dir: args.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            parent: args.parent,
            source: args.source,
            json: args.json,
            verbose: args.verbose,
        }
    }
}

fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fanout").join("config.toml"))
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fanout")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["fanout", "/srv/parent", "/tmp/app.exe"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_without_file() {
        let s = Settings::merge(args(&[]), FileConfig::default());
        assert!(s.sort_subdirectories);
        assert_eq!(s.shutdown_grace, Duration::from_secs(3));
        assert_eq!(s.parent, PathBuf::from("/srv/parent"));
        assert!(!s.json);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file: FileConfig = toml::from_str("shutdown_grace_secs = 10").unwrap();
        assert_eq!(
            file,
            FileConfig { sort_subdirectories: true, shutdown_grace_secs: 10, log_dir: None }
        );
    }

    #[test]
    fn flags_override_file() {
        let file: FileConfig = toml::from_str(
            r#"
            sort_subdirectories = true
            shutdown_grace_secs = 10
            log_dir = "/var/log/fanout"
            "#,
        )
        .unwrap();

        let s = Settings::merge(args(&["--no-sort", "--grace-secs", "1", "--log-dir", "/tmp/logs"]), file);

        assert!(!s.sort_subdirectories);
        assert_eq!(s.shutdown_grace, Duration::from_secs(1));
        assert_eq!(s.log_dir, PathBuf::from("/tmp/logs"));
    }

    #[test]
    fn file_log_dir_used_when_flag_absent() {
        let file = FileConfig { log_dir: Some("/var/log/fanout".into()), ..FileConfig::default() };
        let s = Settings::merge(args(&[]), file);
        assert_eq!(s.log_dir, PathBuf::from("/var/log/fanout"));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        let a = args(&["--config", missing.to_str().unwrap()]);
        assert!(Settings::resolve(a).is_err());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fanout.toml");
        fs::write(&path, "sort_subdirectories = false\n").unwrap();

        let s = Settings::resolve(args(&["--config", path.to_str().unwrap()])).unwrap();

        assert!(!s.sort_subdirectories);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "shutdown_grace_secs = \"soon\"").unwrap();

        let err = Settings::resolve(args(&["--config", path.to_str().unwrap()])).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }
}
