//! Turns a parsed [`clap::ArgMatches`] into a [`CliAction`] the dispatcher in
//! `main.rs`/`repl.rs` can execute against a
//! [`peacedb_service::ReplicatedDocumentService`].

use clap::ArgMatches;
use peacedb_core::{Document, Value};
use peacedb_index::NumericRange;
use std::collections::BTreeMap;

/// One fully-parsed CLI invocation, independent of output formatting.
#[derive(Debug, Clone)]
pub enum CliAction {
    CreateDb,
    DeleteDb,
    Get { id: String, rev: Option<String> },
    Put { doc: Document },
    Post { doc: Document },
    Delete { id: String, rev: String },
    AllDocs { skip: usize, limit: usize, include_deleted: bool },
    FindByFields { equals: BTreeMap<String, String>, range: Option<NumericRange>, skip: usize, limit: usize },
    FindByTags { all_of: Vec<String>, any_of: Vec<String>, none_of: Vec<String>, skip: usize, limit: usize },
    Search { query: String, skip: usize, limit: usize },
    Seq,
    Stats,
}

fn parse_tags(raw: Option<&String>) -> Vec<String> {
    raw.map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()).unwrap_or_default()
}

fn parse_data_object(raw: &str) -> Result<BTreeMap<String, Value>, String> {
    let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    match Value::from_json(json) {
        Value::Map(m) => Ok(m),
        _ => Err("document body must be a JSON object".to_string()),
    }
}

fn parse_usize(matches: &ArgMatches, name: &str) -> Result<usize, String> {
    matches
        .get_one::<String>(name)
        .map(|s| s.parse::<usize>().map_err(|_| format!("{name} must be a non-negative integer")))
        .unwrap_or(Ok(0))
}

/// Convert one subcommand's matches into a [`CliAction`].
pub fn matches_to_action(name: &str, matches: &ArgMatches) -> Result<CliAction, String> {
    match name {
        "create-db" => Ok(CliAction::CreateDb),
        "delete-db" => Ok(CliAction::DeleteDb),
        "get" => Ok(CliAction::Get {
            id: matches.get_one::<String>("id").unwrap().clone(),
            rev: matches.get_one::<String>("rev").cloned(),
        }),
        "put" => {
            let id = matches.get_one::<String>("id").unwrap().clone();
            let data = parse_data_object(matches.get_one::<String>("data").unwrap())?;
            let doc = Document {
                id,
                rev: matches.get_one::<String>("rev").cloned(),
                deleted: false,
                data,
                tags: parse_tags(matches.get_one::<String>("tags")),
                content: matches.get_one::<String>("content").cloned(),
            };
            Ok(CliAction::Put { doc })
        }
        "post" => {
            let data = parse_data_object(matches.get_one::<String>("data").unwrap())?;
            let doc = Document {
                id: matches.get_one::<String>("id").cloned().unwrap_or_default(),
                rev: None,
                deleted: false,
                data,
                tags: parse_tags(matches.get_one::<String>("tags")),
                content: matches.get_one::<String>("content").cloned(),
            };
            Ok(CliAction::Post { doc })
        }
        "delete" => Ok(CliAction::Delete {
            id: matches.get_one::<String>("id").unwrap().clone(),
            rev: matches.get_one::<String>("rev").unwrap().clone(),
        }),
        "all-docs" => Ok(CliAction::AllDocs {
            skip: parse_usize(matches, "skip")?,
            limit: parse_usize(matches, "limit")?,
            include_deleted: matches.get_flag("include-deleted"),
        }),
        "find-by-fields" => {
            let mut equals = BTreeMap::new();
            for pair in matches.get_many::<String>("eq").unwrap_or_default() {
                let Some((k, v)) = pair.split_once('=') else {
                    return Err(format!("--eq must be field=value, got {pair}"));
                };
                equals.insert(k.to_string(), v.to_string());
            }
            let range = match matches.get_one::<String>("range-field") {
                Some(field) => {
                    let min = matches
                        .get_one::<String>("range-min")
                        .map(|s| s.parse::<f64>())
                        .transpose()
                        .map_err(|_| "range-min must be numeric".to_string())?;
                    let max = matches
                        .get_one::<String>("range-max")
                        .map(|s| s.parse::<f64>())
                        .transpose()
                        .map_err(|_| "range-max must be numeric".to_string())?;
                    Some(NumericRange { field: field.clone(), min, max })
                }
                None => None,
            };
            Ok(CliAction::FindByFields { equals, range, skip: parse_usize(matches, "skip")?, limit: parse_usize(matches, "limit")? })
        }
        "find-by-tags" => Ok(CliAction::FindByTags {
            all_of: matches.get_many::<String>("all").unwrap_or_default().cloned().collect(),
            any_of: matches.get_many::<String>("any").unwrap_or_default().cloned().collect(),
            none_of: matches.get_many::<String>("none").unwrap_or_default().cloned().collect(),
            skip: parse_usize(matches, "skip")?,
            limit: parse_usize(matches, "limit")?,
        }),
        "search" => Ok(CliAction::Search {
            query: matches.get_one::<String>("query").unwrap().clone(),
            skip: parse_usize(matches, "skip")?,
            limit: parse_usize(matches, "limit")?,
        }),
        "seq" => Ok(CliAction::Seq),
        "stats" => Ok(CliAction::Stats),
        other => Err(format!("unknown command: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_cli;

    fn action_for(args: &[&str]) -> CliAction {
        let matches = build_cli().try_get_matches_from(args).unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        matches_to_action(name, sub).unwrap()
    }

    #[test]
    fn put_parses_json_body_and_rev() {
        match action_for(&["peacedb", "put", "x", "{\"n\":1}", "--rev", "1-abc"]) {
            CliAction::Put { doc } => {
                assert_eq!(doc.id, "x");
                assert_eq!(doc.rev.as_deref(), Some("1-abc"));
                assert_eq!(doc.data.get("n"), Some(&Value::Int(1)));
            }
            other => panic!("wrong action: {other:?}"),
        }
    }

    #[test]
    fn post_without_id_leaves_it_empty_for_server_assignment() {
        match action_for(&["peacedb", "post", "{}"]) {
            CliAction::Post { doc } => assert!(doc.id.is_empty()),
            other => panic!("wrong action: {other:?}"),
        }
    }

    #[test]
    fn find_by_fields_parses_eq_and_range() {
        match action_for(&[
            "peacedb",
            "find-by-fields",
            "--eq",
            "status=open",
            "--range-field",
            "n",
            "--range-min",
            "1",
            "--range-max",
            "5",
        ]) {
            CliAction::FindByFields { equals, range, .. } => {
                assert_eq!(equals.get("status"), Some(&"open".to_string()));
                let range = range.unwrap();
                assert_eq!(range.field, "n");
                assert_eq!(range.min, Some(1.0));
                assert_eq!(range.max, Some(5.0));
            }
            other => panic!("wrong action: {other:?}"),
        }
    }

    #[test]
    fn put_rejects_non_object_body() {
        let matches = build_cli().try_get_matches_from(["peacedb", "put", "x", "[1,2]"]).unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert!(matches_to_action(name, sub).is_err());
    }
}
