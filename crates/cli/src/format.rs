//! Output formatting: human-readable, JSON, or raw.

use peacedb_core::Document;
use peacedb_sharding::ShardStats;

/// Output rendering selected by `--json`/`--raw`/neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
    Raw,
}

fn doc_json(doc: &Document) -> serde_json::Value {
    serde_json::json!({
        "id": doc.id,
        "rev": doc.rev,
        "deleted": doc.deleted,
        "data": doc.data.iter().map(|(k, v)| (k.clone(), v.to_json())).collect::<serde_json::Map<_, _>>(),
        "tags": doc.tags,
        "content": doc.content,
    })
}

/// Render one document.
pub fn format_document(mode: OutputMode, doc: &Document) -> String {
    match mode {
        OutputMode::Json => doc_json(doc).to_string(),
        OutputMode::Raw => serde_json::to_string(&doc_json(doc)["data"]).unwrap_or_default(),
        OutputMode::Human => {
            let rev = doc.rev.as_deref().unwrap_or("-");
            let tombstone = if doc.deleted { " [deleted]" } else { "" };
            format!("{} @ {}{}\n{}", doc.id, rev, tombstone, doc_json(doc)["data"])
        }
    }
}

/// Render a page of documents.
pub fn format_documents(mode: OutputMode, docs: &[Document]) -> String {
    match mode {
        OutputMode::Json => serde_json::Value::Array(docs.iter().map(doc_json).collect()).to_string(),
        _ => docs.iter().map(|d| format_document(mode, d)).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a bare `u64` (e.g. `seq`).
pub fn format_u64(mode: OutputMode, value: u64) -> String {
    match mode {
        OutputMode::Json => serde_json::json!({ "value": value }).to_string(),
        _ => value.to_string(),
    }
}

/// Render [`ShardStats`].
pub fn format_stats(mode: OutputMode, stats: &ShardStats) -> String {
    match mode {
        OutputMode::Json => serde_json::json!({
            "db": stats.db,
            "seq": stats.seq,
            "docsTotal": stats.docs_total,
            "docsAlive": stats.docs_alive,
            "docsDeleted": stats.docs_deleted,
            "eqIndexFields": stats.eq_index_fields,
            "tagIndexCount": stats.tag_index_count,
            "fullTextTokens": stats.full_text_tokens,
        })
        .to_string(),
        _ => format!(
            "db={} seq={} total={} alive={} deleted={} eqFields={} tags={} tokens={}",
            stats.db,
            stats.seq,
            stats.docs_total,
            stats.docs_alive,
            stats.docs_deleted,
            stats.eq_index_fields,
            stats.tag_index_count,
            stats.full_text_tokens
        ),
    }
}

/// Render an accepted no-output operation (`create-db`, `delete-db`).
pub fn format_ok(mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::json!({ "ok": true }).to_string(),
        _ => "ok".to_string(),
    }
}

/// Render an error, always to be printed to stderr by the caller.
pub fn format_error(mode: OutputMode, err: impl std::fmt::Display) -> String {
    match mode {
        OutputMode::Json => serde_json::json!({ "error": err.to_string() }).to_string(),
        _ => format!("error: {err}"),
    }
}
