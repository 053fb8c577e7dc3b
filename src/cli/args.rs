use std::path::PathBuf;

use clap::Parser;

/// Formatting gate that skips files unchanged since a git baseline.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Project root, inside a git work tree.
    #[clap(short, long, default_value = ".")]
    pub root: PathBuf,
    /// Location of the configuration file, relative to the root.
    #[clap(short, long, default_value = "fmt-ratchet.toml")]
    pub module_location: PathBuf,
    /// Git ref (branch, tag or commit) files are compared against.
    ///
    /// Overrides FMT_RATCHET_BASELINE_REF and `ratchet_from` in the
    /// configuration file.
    #[clap(long)]
    pub ratchet_from: Option<String>,
    /// Location of the task history, relative to the root.
    #[clap(short, long)]
    pub cache_directory: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub enum Command {
    ///Fails if any file changed since the baseline is not formatted
    Check,
    ///Formats every file changed since the baseline
    Apply,
    ///Prints the up-to-date key of each project
    Keys,
    ///Prints whether each path is clean or dirty relative to the baseline
    Status {
        #[clap(short, long, default_value = ".")]
        project: PathBuf,
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
    ///Creates a starter configuration file
    Init,
    ///Forgets the recorded state of every task
    ClearCache,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratchet_from_is_only_set_explicitly() {
        std::env::set_var("FMT_RATCHET_BASELINE_REF", "from-env");
        let implicit = CliArgs::try_parse_from(["fmt-ratchet", "check"]).unwrap();
        let explicit =
            CliArgs::try_parse_from(["fmt-ratchet", "--ratchet-from", "main", "check"]).unwrap();
        std::env::remove_var("FMT_RATCHET_BASELINE_REF");

        assert_eq!(implicit.ratchet_from, None);
        assert_eq!(explicit.ratchet_from.as_deref(), Some("main"));
    }
}
