//! Executes a [`CliAction`] against a live service and renders the result
//! with the selected [`OutputMode`]. Shared by shell, REPL, and pipe modes.

use crate::format::{format_document, format_documents, format_error, format_ok, format_stats, format_u64, OutputMode};
use crate::parse::CliAction;
use peacedb_service::ReplicatedDocumentService;

/// Run `action` against `db` and render the outcome as a single string.
pub async fn execute(service: &ReplicatedDocumentService, db: &str, mode: OutputMode, action: CliAction) -> String {
    match action {
        CliAction::CreateDb => match service.create_db(db).await {
            Ok(()) => format_ok(mode),
            Err(e) => format_error(mode, e),
        },
        CliAction::DeleteDb => match service.delete_db(db).await {
            Ok(()) => format_ok(mode),
            Err(e) => format_error(mode, e),
        },
        CliAction::Get { id, rev } => match service.get(db, &id, rev.as_deref()).await {
            Ok(Some(doc)) => format_document(mode, &doc),
            Ok(None) => format_error(mode, "not found"),
            Err(e) => format_error(mode, e),
        },
        CliAction::Put { doc } => match service.put(db, doc).await {
            Ok(doc) => format_document(mode, &doc),
            Err(e) => format_error(mode, e),
        },
        CliAction::Post { doc } => match service.post(db, doc).await {
            Ok(doc) => format_document(mode, &doc),
            Err(e) => format_error(mode, e),
        },
        CliAction::Delete { id, rev } => match service.delete(db, &id, &rev).await {
            Ok(doc) => format_document(mode, &doc),
            Err(e) => format_error(mode, e),
        },
        CliAction::AllDocs { skip, limit, include_deleted } => match service.all_docs(db, skip, limit, include_deleted).await {
            Ok(docs) => format_documents(mode, &docs),
            Err(e) => format_error(mode, e),
        },
        CliAction::FindByFields { equals, range, skip, limit } => {
            match service.find_by_fields(db, &equals, range.as_ref(), skip, limit).await {
                Ok(docs) => format_documents(mode, &docs),
                Err(e) => format_error(mode, e),
            }
        }
        CliAction::FindByTags { all_of, any_of, none_of, skip, limit } => {
            match service.find_by_tags(db, &all_of, &any_of, &none_of, skip, limit).await {
                Ok(docs) => format_documents(mode, &docs),
                Err(e) => format_error(mode, e),
            }
        }
        CliAction::Search { query, skip, limit } => match service.full_text_search(db, &query, skip, limit).await {
            Ok(docs) => format_documents(mode, &docs),
            Err(e) => format_error(mode, e),
        },
        CliAction::Seq => match service.seq(db).await {
            Ok(seq) => format_u64(mode, seq),
            Err(e) => format_error(mode, e),
        },
        CliAction::Stats => match service.stats(db).await {
            Ok(stats) => format_stats(mode, &stats),
            Err(e) => format_error(mode, e),
        },
    }
}
