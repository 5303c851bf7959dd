use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod admin;
mod ledger_cmds;
mod output;

/// CLI для HoldLedger: история владения интервалами поверх FileStore.
#[derive(Parser, Debug)]
#[command(
    name = "holdledger",
    version,
    about = "Per-entity holding-interval ledger with move semantics",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Initialize holders: alternating ENTITY TIMESTAMP pairs
    ///
    /// Пример:
    ///   holdledger init --path ./ledger alice 5 bob 8
    Init {
        #[arg(long)]
        path: PathBuf,
        /// ENTITY TIMESTAMP [ENTITY TIMESTAMP ...]
        #[arg(allow_hyphen_values = true)]
        pairs: Vec<String>,
    },
    /// Move the open holding from one entity to another
    Move {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Boundary timestamp (integer)
        #[arg(long, allow_hyphen_values = true)]
        at: String,
    },
    /// Print the raw stored record of an entity
    Query {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        entity: String,
        /// Print decoded intervals instead of raw bytes
        #[arg(long, default_value_t = false)]
        decoded: bool,
    },
    /// Print raw records of all entities in [start, end), concatenated
    QueryRange {
        #[arg(long)]
        path: PathBuf,
        /// Inclusive start key (empty = from the first key)
        #[arg(long, default_value = "")]
        start: String,
        /// Exclusive end key (empty = to the last key)
        #[arg(long, default_value = "")]
        end: String,
    },
    /// Delete an entity's record (absent entity is not an error)
    Delete {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        entity: String,
    },
    /// Raw invoke form: FUNCTION ACTION ARGS... (e.g. `invoke move alice bob 12`)
    Invoke {
        #[arg(long)]
        path: PathBuf,
        function: String,
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print store and metrics summary
    Status {
        #[arg(long)]
        path: PathBuf,
        /// JSON output (single object)
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Rewrite the journal keeping only live records
    Compact {
        #[arg(long)]
        path: PathBuf,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Init { path, pairs } => ledger_cmds::cmd_init(path, pairs),
        Cmd::Move { path, from, to, at } => ledger_cmds::cmd_move(path, from, to, at),
        Cmd::Query {
            path,
            entity,
            decoded,
        } => ledger_cmds::cmd_query(path, entity, decoded),
        Cmd::QueryRange { path, start, end } => ledger_cmds::cmd_query_range(path, start, end),
        Cmd::Delete { path, entity } => ledger_cmds::cmd_delete(path, entity),
        Cmd::Invoke {
            path,
            function,
            args,
        } => ledger_cmds::cmd_invoke(path, function, args),
        Cmd::Status { path, json } => admin::cmd_status(path, json),
        Cmd::Compact { path } => admin::cmd_compact(path),
    }
}
