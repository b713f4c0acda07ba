//! Command-line interface for cwlogs-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and argument overrides
//! - Turning the parsed arguments into an [`ExportPlan`]
//! - The `completion` and `config` subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, LogLevel};
use crate::error::Result;
use crate::export::{DEFAULT_QUERY_OUTPUT, ExportPlan, RetrievalMode, default_scan_filename};
use crate::retrieval::{MalformedRecordPolicy, TimeWindow};

pub mod completion;

/// Export CloudWatch Logs events to CSV
#[derive(Parser, Debug)]
#[command(
    name = "cwlogs-export",
    version,
    about = "Export CloudWatch Logs events to CSV",
    long_about = "Export the events of a CloudWatch Logs group within a time window to a CSV file,
either through a Logs Insights query or by scanning every event page by page."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only, no progress spinner)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for cwlogs-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the results of a Logs Insights query (header row, overwrites the file)
    Query(QueryArgs),

    /// Export every event in the window page by page (no header, appends to the file)
    Scan(ScanArgs),

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Arguments shared by both export modes
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Log group to export
    #[arg(long, value_name = "NAME")]
    pub log_group: String,

    /// AWS profile name
    #[arg(long, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// AWS region
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// Custom service endpoint
    #[arg(long, value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Window start, local time (YYYY-MM-DDTHH:MM:SS)
    #[arg(long, value_name = "DATETIME")]
    pub start_date: String,

    /// Window end, local time (YYYY-MM-DDTHH:MM:SS)
    #[arg(long, value_name = "DATETIME")]
    pub end_date: String,

    /// Output CSV file
    #[arg(long, value_name = "FILE")]
    pub output_file: Option<String>,

    /// What to do with records that cannot be decoded
    #[arg(long, value_name = "POLICY", value_enum)]
    pub on_malformed: Option<MalformedRecordPolicy>,
}

/// Query mode arguments
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub export: ExportArgs,

    /// Maximum number of records to return
    #[arg(long, value_name = "N", conflicts_with = "no_limit")]
    pub limit: Option<u32>,

    /// Do not cap the number of records
    #[arg(long)]
    pub no_limit: bool,

    /// Stop waiting for the query after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub max_wait: Option<u64>,
}

/// Scan mode arguments
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub export: ExportArgs,

    /// Dot-separated path of the log text inside each JSON message
    #[arg(long, value_name = "PATH")]
    pub message_field: Option<String>,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        Self::from_args(args)
    }

    /// Build the interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;

        // Apply CLI arguments to override config values
        Self::apply_args_to_config(&mut config, args);

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration
    ///
    /// # Returns
    /// * `&Config` - Reference to configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    ///
    /// # Arguments
    /// * `config` - Configuration to modify
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);

        match &args.command {
            Commands::Query(query) => {
                Self::apply_export_args(config, &query.export);
                if let Some(max_wait) = query.max_wait {
                    config.query.max_wait_secs = Some(max_wait);
                }
            }
            Commands::Scan(scan) => {
                Self::apply_export_args(config, &scan.export);
                if let Some(field) = &scan.message_field {
                    config.scan.message_field = field.clone();
                }
            }
            Commands::Completion { .. } | Commands::Config { .. } => {}
        }
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };

        if args.quiet {
            config.export.progress = false;
        }
    }

    /// Apply AWS and output arguments shared by both modes
    fn apply_export_args(config: &mut Config, export: &ExportArgs) {
        if let Some(profile) = &export.profile {
            config.aws.profile = Some(profile.clone());
        }
        if let Some(region) = &export.region {
            config.aws.region = Some(region.clone());
        }
        if let Some(endpoint) = &export.endpoint_url {
            config.aws.endpoint_url = Some(endpoint.clone());
        }
        if let Some(policy) = export.on_malformed {
            config.export.malformed_records = policy;
        }
    }

    /// Build the export plan for the `query` or `scan` subcommand
    ///
    /// # Returns
    /// * `Result<Option<ExportPlan>>` - None for subcommands that do not export
    pub fn export_plan(&self) -> Result<Option<ExportPlan>> {
        let (mode, export) = match &self.args.command {
            Commands::Query(query) => {
                let limit = if query.no_limit {
                    None
                } else {
                    Some(query.limit.unwrap_or(self.config.query.default_limit))
                };
                (RetrievalMode::Query { limit }, &query.export)
            }
            Commands::Scan(scan) => (RetrievalMode::Scan, &scan.export),
            Commands::Completion { .. } | Commands::Config { .. } => return Ok(None),
        };

        let window = TimeWindow::parse_local(&export.start_date, &export.end_date)?;
        let output = export.output_file.clone().unwrap_or_else(|| match mode {
            RetrievalMode::Query { .. } => DEFAULT_QUERY_OUTPUT.to_string(),
            RetrievalMode::Scan => default_scan_filename(),
        });

        Ok(Some(ExportPlan {
            mode,
            log_group: export.log_group.clone(),
            window,
            output,
            query: self.config.query_settings(),
            scan: self.config.scan_settings(),
            policy: self.config.export.malformed_records,
            timezone: self.config.export.timezone,
            progress: self.config.export.progress,
        }))
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Completion { shell } => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Commands::Config { show, validate } => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Commands::Query(_) | Commands::Scan(_) => Ok(false),
        }
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file()?;
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist; defaults apply");
            return Ok(());
        }

        let config = Config::load_from_file(Some(&path))?;
        config.validate()?;
        println!("Configuration is valid");
        Ok(())
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("# Configuration file: {}", path.display());
        println!();
        println!("{}", self.config.to_toml_string()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }
}
