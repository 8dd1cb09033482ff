// src/config.rs

//! Server configuration, parsed from the command-line invocation.

use crate::core::PeridotError;
use std::path::PathBuf;

/// When the AOF is fsynced to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendFsync {
    /// Flush and fsync before acknowledging each write.
    Always,
    /// A background tick fsyncs roughly once per second.
    #[default]
    EverySec,
    /// Leave syncing to the operating system.
    No,
}

impl AppendFsync {
    fn parse(s: &str) -> Result<Self, PeridotError> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(AppendFsync::Always),
            "everysec" => Ok(AppendFsync::EverySec),
            "no" => Ok(AppendFsync::No),
            other => Err(PeridotError::InvalidState(format!(
                "unknown appendfsync policy '{other}'"
            ))),
        }
    }
}

/// The server's runtime configuration, fixed once the process is up.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory holding the snapshot file.
    pub dir: String,
    /// Snapshot filename.
    pub dbfilename: String,
    /// Primary to follow, when started as a replica.
    pub replica_of: Option<(String, u16)>,
    pub aof_enabled: bool,
    pub appendfilename: String,
    /// AOF directory; falls back to `dir` when not given.
    pub aof_dir: Option<String>,
    pub appendfsync: AppendFsync,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            dir: ".".to_string(),
            dbfilename: "dump.rdb".to_string(),
            replica_of: None,
            aof_enabled: false,
            appendfilename: "appendonly.aof".to_string(),
            aof_dir: None,
            appendfsync: AppendFsync::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parses the recognized invocation flags over the defaults.
    pub fn parse_args(args: &[String]) -> Result<Self, PeridotError> {
        let mut config = Config::default();
        let mut iter = args.iter();

        while let Some(flag) = iter.next() {
            match flag.as_str() {
                "--port" => {
                    let value = next_value(&mut iter, "--port")?;
                    config.port = value
                        .parse()
                        .map_err(|_| bad_flag("--port", &value))?;
                }
                "--replicaof" => {
                    // A single quoted "<host> <port>" argument.
                    let value = next_value(&mut iter, "--replicaof")?;
                    let mut parts = value.split_whitespace();
                    let (Some(host), Some(port), None) =
                        (parts.next(), parts.next(), parts.next())
                    else {
                        return Err(bad_flag("--replicaof", &value));
                    };
                    let port = port.parse().map_err(|_| bad_flag("--replicaof", &value))?;
                    config.replica_of = Some((host.to_string(), port));
                }
                "--dir" => config.dir = next_value(&mut iter, "--dir")?,
                "--dbfilename" => config.dbfilename = next_value(&mut iter, "--dbfilename")?,
                "--appendonly" => config.aof_enabled = true,
                "--appendfilename" => {
                    config.appendfilename = next_value(&mut iter, "--appendfilename")?;
                }
                "--aof-dir" => config.aof_dir = Some(next_value(&mut iter, "--aof-dir")?),
                "--appendfsync" => {
                    let value = next_value(&mut iter, "--appendfsync")?;
                    config.appendfsync = AppendFsync::parse(&value)?;
                }
                "--loglevel" => config.log_level = next_value(&mut iter, "--loglevel")?,
                other => {
                    return Err(PeridotError::InvalidState(format!(
                        "unrecognized option '{other}'"
                    )));
                }
            }
        }
        Ok(config)
    }

    /// The snapshot file location.
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.dbfilename)
    }

    /// The AOF file location; `--aof-dir` overrides `--dir`.
    pub fn aof_path(&self) -> PathBuf {
        let dir = self.aof_dir.as_deref().unwrap_or(&self.dir);
        PathBuf::from(dir).join(&self.appendfilename)
    }
}

fn next_value(
    iter: &mut std::slice::Iter<'_, String>,
    flag: &str,
) -> Result<String, PeridotError> {
    iter.next()
        .cloned()
        .ok_or_else(|| PeridotError::InvalidState(format!("{flag} requires a value")))
}

fn bad_flag(flag: &str, value: &str) -> PeridotError {
    PeridotError::InvalidState(format!("invalid value '{value}' for {flag}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: &[&str]) -> Result<Config, PeridotError> {
        let args: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        Config::parse_args(&args)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.port, 6379);
        assert_eq!(config.snapshot_path(), PathBuf::from("./dump.rdb"));
        assert!(!config.aof_enabled);
    }

    #[test]
    fn replicaof_takes_quoted_pair() {
        let config = parse(&["--replicaof", "localhost 6380"]).unwrap();
        assert_eq!(config.replica_of, Some(("localhost".to_string(), 6380)));
        assert!(parse(&["--replicaof", "localhost"]).is_err());
    }

    #[test]
    fn aof_dir_overrides_dir() {
        let config = parse(&[
            "--dir",
            "/data",
            "--appendonly",
            "--aof-dir",
            "/logs",
            "--appendfilename",
            "server.aof",
        ])
        .unwrap();
        assert!(config.aof_enabled);
        assert_eq!(config.aof_path(), PathBuf::from("/logs/server.aof"));
        assert_eq!(config.snapshot_path(), PathBuf::from("/data/dump.rdb"));
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["--port", "not-a-port"]).is_err());
    }
}
