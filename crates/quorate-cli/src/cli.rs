//! Command-line argument definitions.

use clap::{Parser, Subcommand};

/// Command-line client for the cluster membership daemon.
#[derive(Parser, Debug)]
#[command(name = "quorate", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Operations exposed by the CLI.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Prints membership and quorum state as JSON.
    Status,
    /// Prints one JSON line per cluster node.
    Nodes {
        /// Most nodes to list.
        #[arg(
            long,
            value_name = "N",
            default_value_t = 64,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        max: u32,
    },
    /// Evicts a node from the cluster.
    KillNode {
        /// Node to evict.
        #[arg(value_name = "ID", value_parser = clap::value_parser!(i32).range(1..))]
        node: i32,
    },
    /// Changes the votes held by a node.
    SetVotes {
        /// New vote count.
        #[arg(value_name = "VOTES")]
        votes: i32,
        /// Node to update; the local node when omitted.
        #[arg(long, value_name = "ID", default_value_t = 0)]
        node: i32,
    },
    /// Updates the number of votes the cluster expects.
    ExpectedVotes {
        /// Expected vote total.
        #[arg(value_name = "N")]
        votes: i32,
    },
    /// Leaves the cluster.
    Leave {
        /// Reason code reported to the other members.
        #[arg(long, value_name = "N", default_value_t = 0)]
        reason: i32,
    },
    /// Prints events, and data received on a port, as JSON lines.
    Listen {
        /// Data port to bind; events only when omitted.
        #[arg(long, value_name = "PORT")]
        port: Option<u8>,
        /// Stops after this many records.
        #[arg(long, value_name = "N")]
        count: Option<usize>,
    },
}

impl CliCommand {
    /// Returns true for commands that need the administrative socket.
    pub(crate) const fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::KillNode { .. }
                | Self::SetVotes { .. }
                | Self::ExpectedVotes { .. }
                | Self::Leave { .. }
        )
    }
}
