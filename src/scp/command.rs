//! Interpretation of the `scp -t` / `scp -f` invocation.

use crate::error::{Result, ScpError};
use clap::{ArgAction, ArgGroup, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `-t`: this endpoint is the sink and receives files
    Upload,
    /// `-f`: this endpoint is the source and sends files
    Download,
}

/// What the peer asked for. Built once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: Direction,
    pub recursive: bool,
    pub preserve_metadata: bool,
    pub verbose: bool,
    /// `-d`: the destination must be an existing directory
    pub target_is_dir: bool,
    /// Last positional argument. File vs. directory target is decided by
    /// the engine, not here.
    pub destination: PathBuf,
}

#[derive(Debug, Parser)]
#[command(
    name = "scp",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
#[command(group(ArgGroup::new("role").required(true).args(["sink", "source"])))]
struct ScpArgs {
    #[arg(short = 'r')]
    recursive: bool,

    #[arg(short = 't')]
    sink: bool,

    #[arg(short = 'f')]
    source: bool,

    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    #[arg(short = 'p')]
    preserve: bool,

    #[arg(short = 'd')]
    target_is_dir: bool,

    #[arg(required = true, num_args = 1.., value_name = "PATH")]
    paths: Vec<PathBuf>,
}

impl TransferRequest {
    /// Parse a full argument vector, program name first
    /// (`["scp", "-r", "-t", "--", "/srv/in"]`).
    pub fn parse<I, T>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = ScpArgs::try_parse_from(argv)
            .map_err(|e| ScpError::BadInvocation(e.to_string().trim_end().to_string()))?;

        let destination = args
            .paths
            .last()
            .cloned()
            .ok_or_else(|| ScpError::BadInvocation("missing destination".into()))?;

        Ok(Self {
            direction: if args.sink {
                Direction::Upload
            } else {
                Direction::Download
            },
            recursive: args.recursive,
            preserve_metadata: args.preserve,
            verbose: args.verbose > 0,
            target_is_dir: args.target_is_dir,
            destination,
        })
    }
}
