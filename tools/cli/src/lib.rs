//! Command-line inspection of protocol declaration files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use protover::{definition_schema, BuildOptions, ProtocolDefinition, ResolvedRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, Level};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "protover.toml";

#[derive(Debug, Parser)]
#[command(author, version, about = "Protocol layout evolution inspector")]
pub struct Cli {
    /// Path to a `protover.toml` config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides `[log] level` from the config file.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build every version of a declaration file.
    Validate { defs: PathBuf },
    /// List struct and enum names known at a version.
    Members {
        defs: PathBuf,
        #[arg(long)]
        version: String,
    },
    /// Print one resolved layout as JSON.
    Show {
        defs: PathBuf,
        #[arg(long)]
        version: String,
        #[arg(
            long = "struct",
            conflicts_with = "enum_name",
            required_unless_present = "enum_name"
        )]
        struct_name: Option<String>,
        #[arg(long = "enum")]
        enum_name: Option<String>,
    },
    /// Resolve an entry through a field's enum binding at a version.
    EnumValue {
        defs: PathBuf,
        #[arg(long)]
        version: String,
        #[arg(long = "struct")]
        struct_name: String,
        #[arg(long)]
        field: String,
        #[arg(long)]
        entry: String,
    },
    /// Print the JSON Schema of declaration files.
    Schema,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub build: BuildOptions,
    pub log: LogConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl CliConfig {
    pub fn from_toml(input: &str) -> Result<Self> {
        toml::from_str(input).context("parse config")
    }

    /// Reads `path`, or `protover.toml` in the working directory if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let raw =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("load {}", path.display()))
    }

    pub fn max_level(&self, overridden: Option<&str>) -> Result<Level> {
        let level = overridden.unwrap_or(&self.log.level);
        level
            .parse::<Level>()
            .map_err(|_| anyhow!("invalid log level '{level}'"))
    }
}

pub fn init_tracing(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
}

/// TOML when the extension says so, JSON otherwise.
pub fn load_definition(path: &Path) -> Result<ProtocolDefinition> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let definition = if is_toml {
        ProtocolDefinition::from_toml(&raw)?
    } else {
        ProtocolDefinition::from_json(&raw)?
    };
    Ok(definition)
}

pub fn build_registry(path: &Path, options: BuildOptions) -> Result<ResolvedRegistry> {
    let definition = load_definition(path)?;
    debug!(path = %path.display(), versions = definition.versions.len(), "loaded definition");
    Ok(definition.to_builder()?.build_with(options)?)
}

/// Runs one command and returns what should be printed on stdout.
pub fn run(command: &Command, config: &CliConfig) -> Result<String> {
    match command {
        Command::Validate { defs } => {
            let registry = build_registry(defs, config.build)?;
            let mut lines = Vec::new();
            for version in registry.versions() {
                let members = registry.list_members(version.as_str())?.len();
                lines.push(format!("{version}: {members} members"));
            }
            lines.push(format!("ok: {} versions", lines.len()));
            Ok(lines.join("\n"))
        }
        Command::Members { defs, version } => {
            let registry = build_registry(defs, config.build)?;
            let lines: Vec<String> = registry
                .list_members(version)?
                .map(|member| format!("{} {}", member.kind, member.name))
                .collect();
            Ok(lines.join("\n"))
        }
        Command::Show {
            defs,
            version,
            struct_name,
            enum_name,
        } => {
            let registry = build_registry(defs, config.build)?;
            let json = match (struct_name, enum_name) {
                (Some(name), _) => {
                    serde_json::to_string_pretty(registry.lookup_struct(version, name)?)?
                }
                (None, Some(name)) => {
                    serde_json::to_string_pretty(registry.lookup_enum(version, name)?)?
                }
                (None, None) => bail!("show needs --struct or --enum"),
            };
            Ok(json)
        }
        Command::EnumValue {
            defs,
            version,
            struct_name,
            field,
            entry,
        } => {
            let registry = build_registry(defs, config.build)?;
            let value = registry.resolve_field_enum_value(version, struct_name, field, entry)?;
            Ok(value.to_string())
        }
        Command::Schema => Ok(serde_json::to_string_pretty(&definition_schema())?),
    }
}
