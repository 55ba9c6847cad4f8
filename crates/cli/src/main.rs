//! `peacedb` — interactive and one-shot CLI for a PeaceDatabase node.
//!
//! Three modes:
//! - **Shell mode**: `peacedb [flags] COMMAND ARGS...` — single command, exit.
//! - **REPL mode**: `peacedb [flags]` — interactive prompt, if stdin is a TTY.
//! - **Pipe mode**: `echo "seq" | peacedb` — line-by-line from stdin.
//!
//! Storage is always local-mode in this binary (an in-process
//! `peacedb_service::Topology::build_local`): every shard's primary and
//! replicas get their own on-disk storage engine rooted under
//! `--data-dir`. `--config` layers a TOML sharding/replication config over
//! the defaults; see spec.md §6.4.

mod commands;
mod dispatch;
mod format;
mod parse;
mod repl;
mod state;

use commands::build_cli;
use dispatch::execute;
use format::OutputMode;
use parse::matches_to_action;
use peacedb_service::{ReplicatedDocumentService, ReplicationConfig, ShardingConfig, Topology};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

fn load_config(path: Option<&str>) -> (ShardingConfig, ReplicationConfig) {
    match path {
        Some(p) => {
            let sharding = ShardingConfig::from_file(std::path::Path::new(p)).unwrap_or_else(|e| {
                eprintln!("warning: {e}; using default sharding config");
                ShardingConfig::default()
            });
            (sharding, ReplicationConfig::default())
        }
        None => (ShardingConfig::default(), ReplicationConfig::default()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::try_init().ok();

    let cli = build_cli();
    let matches = cli.get_matches();

    let output_mode = if matches.get_flag("json") {
        OutputMode::Json
    } else if matches.get_flag("raw") {
        OutputMode::Raw
    } else {
        OutputMode::Human
    };

    let data_dir: PathBuf = matches.get_one::<String>("data-dir").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".peacedb"));
    let default_db = matches.get_one::<String>("db").cloned().unwrap_or_else(|| "_default".to_string());
    let (sharding, replication) = load_config(matches.get_one::<String>("config").map(|s| s.as_str()));

    let topology = match Topology::build_local(&data_dir, &sharding, &replication) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to open {}: {e}", data_dir.display());
            return ExitCode::FAILURE;
        }
    };
    let write_quorum = if replication.enabled { replication.write_quorum } else { 1 };
    let service = ReplicatedDocumentService::new(topology.router, topology.coordinator, write_quorum);

    if let Some((name, sub)) = matches.subcommand() {
        let action = match matches_to_action(name, sub) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        };
        println!("{}", execute(&service, &default_db, output_mode, action).await);
        return ExitCode::SUCCESS;
    }

    if std::io::stdin().is_terminal() {
        if let Err(e) = repl::run_repl(&service, &default_db, output_mode).await {
            eprintln!("repl error: {e}");
            return ExitCode::FAILURE;
        }
    } else {
        repl::run_pipe(&service, &default_db, output_mode).await;
    }
    ExitCode::SUCCESS
}
