//! The listening side of the §6.2 wire protocol: one process running a
//! [`crate::client::ShardClient`] (almost always a [`crate::client::LocalShardClient`])
//! and answering `{id, op, params}` requests from peers' [`crate::client::RemoteShardClient`]s.
//!
//! This is the counterpart the "Remote" shard client dials; without it
//! `RemoteShardClient` would have nothing on the other end of the wire.

use crate::client::ShardClient;
use crate::wire::{Command, Output, Request, Response, WireError};
use peacedb_core::{Error, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Dispatch one [`Command`] against `client`, mapping its result onto the
/// wire's [`Output`] enum. `getReplicationState`/`replicate`/
/// `replicateBatch`/`getWalEntries` are part of the §6.2 contract but have
/// no implementation here: catch-up of a stale replica is a full `AllDocs`
/// scan (spec.md §9 open question), not WAL streaming, so nothing in this
/// workspace ever sends those commands — they're answered with a
/// transport error rather than silently doing the wrong thing.
pub async fn dispatch(client: &dyn ShardClient, command: Command) -> Result<Output> {
    match command {
        Command::HealthCheck => Ok(Output::Health { ok: client.health_check().await }),
        Command::CreateDb { db } => {
            client.create_db(&db).await?;
            Ok(Output::Ack)
        }
        Command::DeleteDb { db } => {
            client.delete_db(&db).await?;
            Ok(Output::Ack)
        }
        Command::Get { db, id, rev } => {
            let doc = client.get(&db, &id, rev.as_deref()).await?;
            Ok(Output::Doc { doc })
        }
        Command::Put { db, doc } => {
            let doc = client.put(&db, doc).await?;
            Ok(Output::Doc { doc: Some(doc) })
        }
        Command::Post { db, doc } => {
            let doc = client.post(&db, doc).await?;
            Ok(Output::Doc { doc: Some(doc) })
        }
        Command::Delete { db, id, rev } => {
            let doc = client.delete(&db, &id, &rev).await?;
            Ok(Output::Doc { doc: Some(doc) })
        }
        Command::AllDocs { db, skip, limit, include_deleted } => {
            let docs = client.all_docs(&db, skip, limit, include_deleted).await?;
            Ok(Output::Docs { docs })
        }
        Command::FindByFields { db, equals, numeric_range, skip, limit } => {
            let docs = client.find_by_fields(&db, &equals, numeric_range.as_ref(), skip, limit).await?;
            Ok(Output::Docs { docs })
        }
        Command::FindByTags { db, all_of, any_of, none_of, skip, limit } => {
            let docs = client.find_by_tags(&db, &all_of, &any_of, &none_of, skip, limit).await?;
            Ok(Output::Docs { docs })
        }
        Command::FullTextSearch { db, query, skip, limit } => {
            let docs = client.full_text_search(&db, &query, skip, limit).await?;
            Ok(Output::Docs { docs })
        }
        Command::Seq { db } => Ok(Output::Seq { seq: client.seq(&db).await? }),
        Command::Stats { db } => {
            let stats = client.stats(&db).await?;
            Ok(Output::Stats {
                db: stats.db,
                seq: stats.seq,
                docs_total: stats.docs_total,
                docs_alive: stats.docs_alive,
                docs_deleted: stats.docs_deleted,
                eq_index_fields: stats.eq_index_fields,
                tag_index_count: stats.tag_index_count,
                full_text_tokens: stats.full_text_tokens,
            })
        }
        Command::Promote => {
            client.promote().await?;
            Ok(Output::Ack)
        }
        Command::SetPrimary { primary_url } => {
            client.set_primary(&primary_url).await?;
            Ok(Output::Ack)
        }
        Command::GetReplicationState
        | Command::Replicate { .. }
        | Command::ReplicateBatch { .. }
        | Command::GetWalEntries { .. } => {
            Err(Error::Transport("not implemented by this node".to_string()))
        }
    }
}

/// Serve `client` on every connection accepted by `listener`, one line-
/// delimited request/response pair at a time, until `shutdown` reports
/// `true` (spec.md §5 "Background loop cancellation").
pub async fn serve(listener: TcpListener, client: Arc<dyn ShardClient>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let client = client.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(stream, client.as_ref()).await {
                                warn!(%peer, error = %err, "wire connection ended with an error");
                            }
                        });
                    }
                    Err(err) => warn!(error = %err, "failed to accept connection"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("wire server shutting down");
                    break;
                }
            }
        }
    }
}

/// Handle every line-delimited request on one connection until the peer
/// closes it or sends a malformed line.
pub async fn serve_connection(stream: TcpStream, client: &dyn ShardClient) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await.map_err(Error::Io)?;
        if bytes_read == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => match dispatch(client, request.command).await {
                Ok(output) => Response::ok(request.id, output),
                Err(err) => Response::err(request.id, &WireError::from(&err).code, err.to_string()),
            },
            Err(err) => Response::err("unknown".to_string(), "validation", format!("malformed request: {err}")),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        write_half.write_all(&out).await.map_err(Error::Io)?;
    }
}
