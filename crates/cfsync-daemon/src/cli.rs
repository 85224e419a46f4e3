//! Command-line flags
//!
//! Every flag overrides the matching configuration-file value.

use std::path::PathBuf;

use anyhow::Result;
use cfsync_core::config::{Config, ConfigBuilder};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "cfsyncd",
    version,
    about = "Mirror a local directory into a Cloud Files container"
)]
pub struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/cfsync/config.yaml)
    #[arg(short = 'f', long)]
    pub config_file: Option<PathBuf>,

    /// Container to mirror into
    #[arg(short, long)]
    pub container: Option<String>,

    /// Local directory to mirror
    #[arg(short = 'd', long)]
    pub local_dir: Option<PathBuf>,

    /// Workers in every pool
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Upload workers
    #[arg(long)]
    pub upload_threads: Option<usize>,

    /// Delete workers
    #[arg(long)]
    pub delete_threads: Option<usize>,

    /// Copy workers
    #[arg(long)]
    pub copy_threads: Option<usize>,

    /// Identity service token URL
    #[arg(short, long)]
    pub auth_endpoint: Option<String>,

    /// Account user name
    #[arg(short, long)]
    pub username: Option<String>,

    /// Account API key
    #[arg(short = 'k', long)]
    pub api_key: Option<String>,

    /// Preferred storage region
    #[arg(short, long)]
    pub region: Option<String>,

    /// File of regular expressions; matching paths are not mirrored
    #[arg(short, long)]
    pub exclusion_file: Option<PathBuf>,

    /// PID file
    #[arg(short, long)]
    pub pid_file: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Use the public storage URL instead of the internal one
    #[arg(short = 's', long)]
    pub public_network: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Stop the running instance and exit
    #[arg(short, long)]
    pub quit: bool,
}

impl Cli {
    /// Loads the configuration file and applies the flags on top
    ///
    /// An explicit `--config-file` must exist; the default path is optional.
    ///
    /// # Errors
    /// Returns an error if the configuration file cannot be read or parsed
    pub fn load_config(&self) -> Result<Config> {
        let config = match &self.config_file {
            Some(path) => Config::load(path)?,
            None => {
                let path = Config::default_path();
                if path.exists() {
                    Config::load(&path)?
                } else {
                    Config::default()
                }
            }
        };
        Ok(self.apply(config))
    }

    /// Overrides `config` with every flag that was given
    pub fn apply(&self, config: Config) -> Config {
        let mut builder = ConfigBuilder::from_config(config);

        if let Some(container) = &self.container {
            builder = builder.storage_container(container);
        }
        if let Some(dir) = &self.local_dir {
            builder = builder.sync_root(dir.clone());
        }
        if let Some(n) = self.threads {
            builder = builder.workers_all(n);
        }
        if let Some(n) = self.upload_threads {
            builder = builder.workers_upload(n);
        }
        if let Some(n) = self.delete_threads {
            builder = builder.workers_delete(n);
        }
        if let Some(n) = self.copy_threads {
            builder = builder.workers_copy(n);
        }
        if let Some(endpoint) = &self.auth_endpoint {
            builder = builder.auth_endpoint(endpoint);
        }
        if let Some(username) = &self.username {
            builder = builder.auth_username(username);
        }
        if let Some(key) = &self.api_key {
            builder = builder.auth_api_key(key);
        }
        if let Some(region) = &self.region {
            builder = builder.auth_region(region);
        }
        if let Some(file) = &self.exclusion_file {
            builder = builder.sync_exclusion_file(file.clone());
        }
        if let Some(file) = &self.pid_file {
            builder = builder.daemon_pid_file(file.clone());
        }
        if let Some(file) = &self.log_file {
            builder = builder.logging_file(file.clone());
        }
        if self.public_network {
            builder = builder.auth_internal_url(false);
        }

        builder.build()
    }
}
