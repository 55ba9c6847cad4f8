//! Clap command tree definition.
//!
//! Builds the full `clap::Command` tree used by both shell mode (directly)
//! and REPL/pipe mode (via `try_get_matches_from` on one typed-in line).

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree, shared between shell mode and
/// REPL/pipe mode.
pub fn build_cli() -> Command {
    Command::new("peacedb")
        .about("Command-line client for a PeaceDatabase document store")
        .subcommand_required(false)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .help("Data root for local-mode storage (default: .peacedb)")
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML file with sharding/replication config")
                .global(true),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .help("Database name (default: _default)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .conflicts_with("raw")
                .global(true),
        )
        .arg(
            Arg::new("raw")
                .long("raw")
                .help("Raw output mode (values only, no framing)")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("create-db").about("Create a database (idempotent)"))
        .subcommand(Command::new("delete-db").about("Delete a database"))
        .subcommand(
            Command::new("get")
                .about("Fetch a document by id, optionally at a specific rev")
                .arg(Arg::new("id").required(true))
                .arg(Arg::new("rev").long("rev")),
        )
        .subcommand(
            Command::new("put")
                .about("Update a document; --rev is required unless this is a first write")
                .arg(Arg::new("id").required(true))
                .arg(Arg::new("data").required(true).help("JSON object literal for the document body"))
                .arg(Arg::new("rev").long("rev"))
                .arg(Arg::new("tags").long("tags").help("comma-separated tags"))
                .arg(Arg::new("content").long("content").help("free-text content")),
        )
        .subcommand(
            Command::new("post")
                .about("Create a document, server-assigning an id if none is given")
                .arg(Arg::new("data").required(true).help("JSON object literal for the document body"))
                .arg(Arg::new("id").long("id"))
                .arg(Arg::new("tags").long("tags").help("comma-separated tags"))
                .arg(Arg::new("content").long("content").help("free-text content")),
        )
        .subcommand(
            Command::new("delete")
                .about("Soft-delete a document at its current rev")
                .arg(Arg::new("id").required(true))
                .arg(Arg::new("rev").required(true)),
        )
        .subcommand(
            Command::new("all-docs")
                .about("Page through every head in id order")
                .arg(Arg::new("skip").long("skip").default_value("0"))
                .arg(Arg::new("limit").long("limit").default_value("50"))
                .arg(Arg::new("include-deleted").long("include-deleted").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("find-by-fields")
                .about("Equality + numeric-range query")
                .arg(Arg::new("eq").long("eq").action(ArgAction::Append).help("field=value, repeatable"))
                .arg(Arg::new("range-field").long("range-field"))
                .arg(Arg::new("range-min").long("range-min"))
                .arg(Arg::new("range-max").long("range-max"))
                .arg(Arg::new("skip").long("skip").default_value("0"))
                .arg(Arg::new("limit").long("limit").default_value("50")),
        )
        .subcommand(
            Command::new("find-by-tags")
                .about("Tag-set query: all-of ∩ any-of ∖ none-of")
                .arg(Arg::new("all").long("all").action(ArgAction::Append))
                .arg(Arg::new("any").long("any").action(ArgAction::Append))
                .arg(Arg::new("none").long("none").action(ArgAction::Append))
                .arg(Arg::new("skip").long("skip").default_value("0"))
                .arg(Arg::new("limit").long("limit").default_value("50")),
        )
        .subcommand(
            Command::new("search")
                .about("Full-text AND search over tokenized content")
                .arg(Arg::new("query").required(true))
                .arg(Arg::new("skip").long("skip").default_value("0"))
                .arg(Arg::new("limit").long("limit").default_value("50")),
        )
        .subcommand(Command::new("seq").about("Current sequence number"))
        .subcommand(Command::new("stats").about("Per-database document and index counters"))
}
