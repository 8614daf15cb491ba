//! Config emitters: one per generated Postfix file.
//!
//! | kind        | live-query                    | pre-rendered      |
//! |-------------|-------------------------------|-------------------|
//! | `MainCf`    | `main.cf`                     | `main.cf`         |
//! | `DomainMap` | `mysql_virtual_domains.cf`    | `virtual_domains` |
//! | `AliasMap`  | `mysql_virtual_alias_maps.cf` | `virtual_alias`   |
//!
//! Every emitter owns the writer it is given and ends it on every exit
//! path. When both the body and `end` fail, the body's error is returned.

use std::fmt;

use serde::Serialize;
use tokio::io::AsyncWrite;

use postsync_core::{ConnectionDescriptor, MapMode, SyncSnapshot};
use postsync_renderer::TemplateEngine;
use postsync_store::{RelayCursor, Repository};

use crate::cancel::CancelSignal;
use crate::error::SyncError;
use crate::writer::{SequentialWriter, WriteSummary};

pub const MAIN_CF: &str = "main.cf";

/// Lookup query for the live domain map. `%s` is filled in by Postfix.
pub const DOMAIN_QUERY: &str = "SELECT name FROM domains WHERE name = '%s'";

/// Lookup query for the live alias map.
pub const ALIAS_QUERY: &str =
    "SELECT destination FROM relays WHERE alias = '%s' AND enabled = 1 AND deleted = 0";

/// Separator between key and value in pre-rendered tables.
const COLUMN_GAP: &str = "   ";

/// The three generated files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    MainCf,
    DomainMap,
    AliasMap,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::MainCf, FileKind::DomainMap, FileKind::AliasMap];

    /// Output file name under the configured directory.
    pub fn file_name(&self, mode: MapMode) -> &'static str {
        match self {
            FileKind::MainCf => MAIN_CF,
            FileKind::DomainMap => mode.domain_map_file(),
            FileKind::AliasMap => mode.alias_map_file(),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::MainCf => write!(f, "main-cf"),
            FileKind::DomainMap => write!(f, "domain-map"),
            FileKind::AliasMap => write!(f, "alias-map"),
        }
    }
}

/// Shared, read-only inputs of one run.
pub struct EmitContext<'a> {
    pub snapshot: &'a SyncSnapshot,
    pub repository: &'a dyn Repository,
    pub engine: &'a TemplateEngine,
    pub cancel: &'a CancelSignal,
}

/// Produce the file for `kind` into `writer`, then end the writer.
pub async fn emit<W>(
    kind: FileKind,
    ctx: &EmitContext<'_>,
    mut writer: SequentialWriter<W>,
) -> Result<WriteSummary, SyncError>
where
    W: AsyncWrite + Unpin,
{
    let body = match kind {
        FileKind::MainCf => emit_main_cf(ctx, &mut writer).await,
        FileKind::DomainMap => match ctx.snapshot.map_mode {
            MapMode::LiveQuery => {
                emit_live_map(ctx, &mut writer, DOMAIN_QUERY).await
            }
            MapMode::PreRendered => emit_domain_table(ctx, &mut writer).await,
        },
        FileKind::AliasMap => match ctx.snapshot.map_mode {
            MapMode::LiveQuery => emit_live_map(ctx, &mut writer, ALIAS_QUERY).await,
            MapMode::PreRendered => emit_alias_table(ctx, &mut writer).await,
        },
    };

    let closed = writer.end().await;
    match body {
        Ok(()) => {
            let summary = closed?;
            tracing::info!(
                file = %summary.label.display(),
                bytes = summary.bytes,
                lines = summary.lines,
                "file written"
            );
            Ok(summary)
        }
        Err(err) => Err(err),
    }
}

async fn line<W: AsyncWrite + Unpin>(
    ctx: &EmitContext<'_>,
    writer: &mut SequentialWriter<W>,
    text: &str,
) -> Result<(), SyncError> {
    ctx.cancel.check()?;
    writer.write_line(text).await
}

async fn emit_main_cf<W: AsyncWrite + Unpin>(
    ctx: &EmitContext<'_>,
    writer: &mut SequentialWriter<W>,
) -> Result<(), SyncError> {
    let rendered = ctx.engine.render_snapshot(ctx.snapshot)?;
    for text in rendered.lines() {
        line(ctx, writer, text).await?;
    }
    Ok(())
}

/// Connection parameters for a Postfix `mysql:` table.
fn connection_lines(conn: &ConnectionDescriptor) -> [String; 4] {
    [
        format!("user = {}", conn.user),
        format!("password = {}", conn.password),
        format!("hosts = {}", conn.hosts()),
        format!("dbname = {}", conn.database),
    ]
}

async fn emit_live_map<W: AsyncWrite + Unpin>(
    ctx: &EmitContext<'_>,
    writer: &mut SequentialWriter<W>,
    query: &str,
) -> Result<(), SyncError> {
    let conn = &ctx.snapshot.connection;
    if conn.is_sqlite() {
        tracing::warn!(
            file = %writer.label().display(),
            "live-query maps use the mysql table type; a sqlite store is not reachable from Postfix"
        );
    }
    for text in connection_lines(conn) {
        line(ctx, writer, &text).await?;
    }
    line(ctx, writer, &format!("query = {query}")).await
}

async fn emit_domain_table<W: AsyncWrite + Unpin>(
    ctx: &EmitContext<'_>,
    writer: &mut SequentialWriter<W>,
) -> Result<(), SyncError> {
    ctx.cancel.check()?;
    let domains = ctx.repository.get_all_domains().await?;
    tracing::debug!(count = domains.len(), "domains fetched");
    for domain in &domains {
        line(ctx, writer, &format!("{}{COLUMN_GAP}OK", domain.name)).await?;
    }
    Ok(())
}

async fn emit_alias_table<W: AsyncWrite + Unpin>(
    ctx: &EmitContext<'_>,
    writer: &mut SequentialWriter<W>,
) -> Result<(), SyncError> {
    let snapshot = ctx.snapshot;
    let mut cursor = RelayCursor::new(
        ctx.repository,
        snapshot.page_size,
        snapshot.include_disabled,
    );
    loop {
        ctx.cancel.check()?;
        let Some(page) = cursor.next_page().await? else {
            break;
        };
        for relay in &page {
            line(
                ctx,
                writer,
                &format!("{}{COLUMN_GAP}{}", relay.alias, relay.destination),
            )
            .await?;
        }
    }
    tracing::debug!(pages = cursor.calls(), last = %cursor.position(), "alias table complete");
    Ok(())
}
