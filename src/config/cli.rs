use crate::config::options::{Selection, SyncOptions};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "evento-sync")]
#[command(about = "Synchronises module and student information from an Evento system into Moodle")]
pub struct CliConfig {
    /// Path to the TOML connection settings
    #[arg(long, default_value = "evento-sync.toml")]
    pub config: String,

    /// Create non-existing modules
    #[arg(short = 'c', long = "auto-create")]
    pub auto_create: bool,

    /// Register non-existing participants
    #[arg(short = 'C', long = "auto-register")]
    pub auto_register: bool,

    /// Enrol participants that are not yet course members
    #[arg(short = 'e', long = "auto-enrol")]
    pub auto_enrol: bool,

    /// Display information only; implies -l and unsets -c, -C and -e
    #[arg(short = 'i', long)]
    pub inform: bool,

    /// Display the selection
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Select modules, optionally only the one with this number
    #[arg(short = 'm', long, num_args = 0..=1, require_equals = true, default_missing_value = "")]
    pub modules: Option<String>,

    /// Select only modules whose number contains this text
    #[arg(short = 'M', long)]
    pub spattern: Option<String>,

    /// Display study programs, optionally only the one with this number
    #[arg(short = 'p', long, num_args = 0..=1, require_equals = true, default_missing_value = "")]
    pub programs: Option<String>,

    /// Display a brief report on the actions taken
    #[arg(short = 'r', long)]
    pub report: bool,

    /// Select module participants
    #[arg(short = 's', long)]
    pub students: bool,

    /// Display extensive debug messages
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Emit diagnostics as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl CliConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            verbose: self.verbose,
            list: self.list,
            inform: self.inform,
            programs: Selection::from_flag(self.programs.as_deref()),
            modules: Selection::from_flag(self.modules.as_deref()),
            module_pattern: self.spattern.clone(),
            students: self.students,
            auto_create: self.auto_create,
            auto_register: self.auto_register,
            auto_enrol: self.auto_enrol,
            report: self.report,
        }
        .apply_inform()
    }
}
