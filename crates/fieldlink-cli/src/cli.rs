//! Argument definitions for the `fieldlink` binary.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "fieldlink",
    version,
    about = "Map form fields to an external record store and keep them in sync",
    long_about = "Resolve form fields to target fields on an external record store, \
                  review and approve the proposed mappings, merge fields shared \
                  across forms, and pull or push values through approved mappings."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ./fieldlink.toml when present).
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding mappings, audit and sync logs.
    #[arg(long = "data-dir", value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Name recorded in the audit trail for approvals and overrides.
    #[arg(long, global = true)]
    pub actor: Option<String>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Include field values in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Auto-map a new form and store the proposed mappings.
    Resolve(ResolveArgs),

    /// Show the mappings stored for a form.
    Mappings(FormArgs),

    /// Approve one field's proposed mapping.
    Approve(FieldArgs),

    /// Return one field to the unmapped state.
    Reject(FieldArgs),

    /// Map one field by hand and approve it.
    Override(OverrideArgs),

    /// Approve every unapproved mapping at or above a confidence threshold.
    BulkApprove(BulkApproveArgs),

    /// Re-resolve a changed form, keeping every approved mapping.
    Remap(ResolveArgs),

    /// Find fields shared across forms through approved mappings.
    Merge(MergeArgs),

    /// Show recent audit entries.
    Audit(AuditArgs),

    /// Read external values into a form.
    Pull(SyncArgs),

    /// Write form values to the external record store.
    Push(SyncArgs),

    /// Compare form values with the external record.
    Diff(SyncArgs),

    /// Show recent sync operations.
    SyncLog(SyncLogArgs),
}

#[derive(Args)]
pub struct CatalogArg {
    /// Target catalog JSON (default: `catalog` from the configuration file).
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Form schema JSON.
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Other form schemas; their labels feed the history tier.
    #[arg(long = "history-schema", value_name = "PATH")]
    pub history_schemas: Vec<PathBuf>,

    #[command(flatten)]
    pub catalog: CatalogArg,
}

#[derive(Args)]
pub struct FormArgs {
    #[arg(value_name = "FORM")]
    pub form_id: String,

    /// Print the mapping set as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct FieldArgs {
    #[arg(value_name = "FORM")]
    pub form_id: String,

    #[arg(value_name = "FIELD")]
    pub field_id: String,
}

#[derive(Args)]
pub struct OverrideArgs {
    #[arg(value_name = "FORM")]
    pub form_id: String,

    #[arg(value_name = "FIELD")]
    pub field_id: String,

    #[arg(value_name = "TARGET_FIELD")]
    pub target_field: String,

    /// Target object holding the field.
    #[arg(long, value_name = "OBJECT")]
    pub object: String,
}

#[derive(Args)]
pub struct BulkApproveArgs {
    #[arg(value_name = "FORM")]
    pub form_id: String,

    /// Minimum confidence (default: `bulk_approve_threshold` from configuration).
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Form schemas to merge, in priority order.
    #[arg(value_name = "SCHEMA", required = true, num_args = 2..)]
    pub schemas: Vec<PathBuf>,

    /// Unified answers to split back per form; prints JSON.
    #[arg(long, value_name = "PATH")]
    pub split: Option<PathBuf>,
}

#[derive(Args)]
pub struct AuditArgs {
    /// Only entries for this form.
    #[arg(long = "form", value_name = "FORM")]
    pub form_id: Option<String>,

    /// Only entries from this UTC date (YYYY-MM-DD).
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Args)]
pub struct SyncArgs {
    #[arg(value_name = "FORM")]
    pub form_id: String,

    /// Identifier of the primary external record.
    #[arg(long = "record", value_name = "REF")]
    pub record_ref: String,

    /// Current form answers JSON (field id to value).
    #[arg(long, value_name = "PATH")]
    pub answers: Option<PathBuf>,

    /// Local record file (default: `records` from the configuration file).
    #[arg(long, value_name = "PATH")]
    pub records: Option<PathBuf>,

    #[command(flatten)]
    pub catalog: CatalogArg,
}

#[derive(Args)]
pub struct SyncLogArgs {
    #[arg(long = "form", value_name = "FORM")]
    pub form_id: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
