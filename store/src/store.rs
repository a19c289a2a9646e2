//! The persistent Store (C1): the only component that owns state.

use std::path::Path;

use rusqlite::Connection;
use rusqlite::OptionalExtension as _;
use rusqlite::params;
use smartctx_error::Error;
use smartctx_error::ErrorCode;
use smartctx_error::Result;

use crate::conn::AsyncConnection;
use crate::model::Chunk;
use crate::model::ChunkKind;
use crate::model::ChunkSummary;
use crate::model::Embedding;
use crate::model::EvidencePack;
use crate::model::FileEdge;
use crate::model::FileEdgeKind;
use crate::model::FileRecord;
use crate::model::IndentStyle;
use crate::model::LineRange;
use crate::model::NewlineStyle;
use crate::model::PackItem;
use crate::model::PackRole;
use crate::model::Symbol;
use crate::model::SymbolEdge;
use crate::model::SymbolKind;
use crate::model::SymbolRelation;
use crate::model::TransactionLogEntry;
use crate::model::TxnState;

/// Persistent storage for one project's content-addressed index.
///
/// Every multi-row mutation in this type is transactional (§4.1): readers
/// never observe a partially replaced chunk set.
pub struct Store {
    conn: AsyncConnection,
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let newline_style: String = row.get("newline_style")?;
    let indent_style: String = row.get("indent_style")?;
    Ok(FileRecord {
        path: row.get("path")?,
        content_hash: row.get("content_hash")?,
        size_bytes: row.get::<_, i64>("size_bytes")? as u64,
        line_count: row.get::<_, i64>("line_count")? as u32,
        mtime: row.get("mtime")?,
        language_tag: row.get("language_tag")?,
        newline_style: match newline_style.as_str() {
            "cr_lf" => NewlineStyle::CrLf,
            _ => NewlineStyle::Lf,
        },
        indent_style: match indent_style.as_str() {
            "spaces2" => IndentStyle::Spaces2,
            "spaces4" => IndentStyle::Spaces4,
            "tabs" => IndentStyle::Tabs,
            _ => IndentStyle::Unknown,
        },
    })
}

fn newline_style_str(s: NewlineStyle) -> &'static str {
    match s {
        NewlineStyle::Lf => "lf",
        NewlineStyle::CrLf => "cr_lf",
    }
}

fn indent_style_str(s: IndentStyle) -> &'static str {
    match s {
        IndentStyle::Spaces2 => "spaces2",
        IndentStyle::Spaces4 => "spaces4",
        IndentStyle::Tabs => "tabs",
        IndentStyle::Unknown => "unknown",
    }
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let kind: String = row.get("kind")?;
    let section_path: String = row.get("section_path")?;
    Ok(Chunk {
        id: row.get("id")?,
        path: row.get("path")?,
        kind: ChunkKind::parse(&kind).unwrap_or(ChunkKind::Text),
        section_path: serde_json::from_str(&section_path).unwrap_or_default(),
        heading: row.get("heading")?,
        heading_level: row.get::<_, Option<i64>>("heading_level")?.map(|v| v as u32),
        range: LineRange::new(
            row.get::<_, i64>("start_line")? as u32,
            row.get::<_, i64>("end_line")? as u32,
        ),
        text: row.get("text")?,
        content_hash: row.get("content_hash")?,
    })
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            conn: AsyncConnection::open(db_path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: AsyncConnection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &AsyncConnection {
        &self.conn
    }

    // ---- files -----------------------------------------------------

    pub async fn upsert_file(&self, file: FileRecord) -> Result<()> {
        self.conn
            .with(move |conn| {
                conn.execute(
                    "INSERT INTO files (path, content_hash, size_bytes, line_count, mtime, language_tag, newline_style, indent_style)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(path) DO UPDATE SET
                        content_hash = excluded.content_hash,
                        size_bytes = excluded.size_bytes,
                        line_count = excluded.line_count,
                        mtime = excluded.mtime,
                        language_tag = excluded.language_tag,
                        newline_style = excluded.newline_style,
                        indent_style = excluded.indent_style",
                    params![
                        file.path,
                        file.content_hash,
                        file.size_bytes as i64,
                        file.line_count as i64,
                        file.mtime,
                        file.language_tag,
                        newline_style_str(file.newline_style),
                        indent_style_str(file.indent_style),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let path = path.to_string();
        self.conn
            .with(move |conn| {
                Ok(conn
                    .query_row("SELECT * FROM files WHERE path = ?1", params![path], row_to_file)
                    .optional()?)
            })
            .await
    }

    pub async fn remove_file(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.conn
            .with(move |conn| {
                conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
                Ok(())
            })
            .await
    }

    pub async fn list_files_matching(&self, globs: Vec<String>) -> Result<Vec<String>> {
        self.conn
            .with(move |conn| {
                let mut stmt = conn.prepare("SELECT path FROM files ORDER BY path")?;
                let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    let path = row?;
                    if globs.is_empty() || globs.iter().any(|g| glob_match(g, &path)) {
                        out.push(path);
                    }
                }
                Ok(out)
            })
            .await
    }

    pub async fn all_files(&self) -> Result<Vec<FileRecord>> {
        self.conn
            .with(move |conn| {
                let mut stmt = conn.prepare("SELECT * FROM files ORDER BY path")?;
                let rows = stmt.query_map([], row_to_file)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    // ---- chunks ------------------------------------------------------

    /// Atomic: delete all chunks of `path`, insert `new_chunks`, cascade
    /// delete embeddings whose content hash no longer matches any new chunk.
    pub async fn replace_chunks(&self, path: String, new_chunks: Vec<Chunk>) -> Result<()> {
        self.conn
            .with_txn(move |tx| {
                let mut old_ids_stmt = tx.prepare("SELECT id FROM chunks WHERE path = ?1")?;
                let old_ids: Vec<String> = old_ids_stmt
                    .query_map(params![path], |r| r.get(0))?
                    .collect::<std::result::Result<_, _>>()?;
                drop(old_ids_stmt);

                tx.execute("DELETE FROM chunks WHERE path = ?1", params![path])?;

                let new_ids: std::collections::HashSet<&str> =
                    new_chunks.iter().map(|c| c.id.as_str()).collect();
                for old_id in &old_ids {
                    if !new_ids.contains(old_id.as_str()) {
                        tx.execute("DELETE FROM embeddings WHERE chunk_id = ?1", params![old_id])?;
                    }
                }

                for chunk in &new_chunks {
                    tx.execute(
                        "INSERT INTO chunks (id, path, kind, section_path, heading, heading_level, start_line, end_line, text, content_hash)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        params![
                            chunk.id,
                            chunk.path,
                            chunk.kind.as_str(),
                            serde_json::to_string(&chunk.section_path).unwrap_or_default(),
                            chunk.heading,
                            chunk.heading_level.map(|v| v as i64),
                            chunk.range.start_line as i64,
                            chunk.range.end_line as i64,
                            chunk.text,
                            chunk.content_hash,
                        ],
                    )?;
                    // Drop any embedding whose stored chunk hash diverges from
                    // the freshly written chunk (handles the case where an old
                    // chunk id happens to be reused with different text).
                    tx.execute(
                        "DELETE FROM embeddings WHERE chunk_id = ?1 AND ?1 NOT IN (SELECT id FROM chunks WHERE id = ?1 AND content_hash = ?2)",
                        params![chunk.id, chunk.content_hash],
                    )?;
                }
                Ok(())
            })
            .await
    }

    pub async fn get_chunks_for_path(&self, path: &str) -> Result<Vec<Chunk>> {
        let path = path.to_string();
        self.conn
            .with(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT * FROM chunks WHERE path = ?1 ORDER BY start_line")?;
                let rows = stmt.query_map(params![path], row_to_chunk)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let chunk_id = chunk_id.to_string();
        self.conn
            .with(move |conn| {
                Ok(conn
                    .query_row("SELECT * FROM chunks WHERE id = ?1", params![chunk_id], row_to_chunk)
                    .optional()?)
            })
            .await
    }

    pub async fn get_chunks(&self, chunk_ids: Vec<String>) -> Result<Vec<Chunk>> {
        self.conn
            .with(move |conn| {
                let mut out = Vec::with_capacity(chunk_ids.len());
                for id in &chunk_ids {
                    if let Some(c) = conn
                        .query_row("SELECT * FROM chunks WHERE id = ?1", params![id], row_to_chunk)
                        .optional()?
                    {
                        out.push(c);
                    }
                }
                Ok(out)
            })
            .await
    }

    /// Cheap staleness probe: the chunk's current content hash, if it still exists.
    pub async fn get_content_hash(&self, chunk_id: &str) -> Result<Option<String>> {
        let chunk_id = chunk_id.to_string();
        self.conn
            .with(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT content_hash FROM chunks WHERE id = ?1",
                        params![chunk_id],
                        |r| r.get::<_, String>(0),
                    )
                    .optional()?)
            })
            .await
    }

    // ---- embeddings ----------------------------------------------------

    pub async fn upsert_embedding(&self, embedding: Embedding) -> Result<()> {
        self.conn
            .with(move |conn| {
                conn.execute(
                    "INSERT INTO embeddings (chunk_id, provider, model, dims, vector, l2_norm)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(chunk_id, provider, model) DO UPDATE SET
                        dims = excluded.dims, vector = excluded.vector, l2_norm = excluded.l2_norm",
                    params![
                        embedding.chunk_id,
                        embedding.provider,
                        embedding.model,
                        embedding.dims as i64,
                        encode_vector(&embedding.vector),
                        embedding.l2_norm,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_embedding(
        &self,
        chunk_id: &str,
        provider: &str,
        model: &str,
    ) -> Result<Option<Embedding>> {
        let (chunk_id, provider, model) =
            (chunk_id.to_string(), provider.to_string(), model.to_string());
        self.conn
            .with(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT chunk_id, provider, model, dims, vector, l2_norm FROM embeddings
                         WHERE chunk_id = ?1 AND provider = ?2 AND model = ?3",
                        params![chunk_id, provider, model],
                        |row| {
                            let vector: Vec<u8> = row.get(4)?;
                            Ok(Embedding {
                                chunk_id: row.get(0)?,
                                provider: row.get(1)?,
                                model: row.get(2)?,
                                dims: row.get::<_, i64>(3)? as u32,
                                vector: decode_vector(&vector),
                                l2_norm: row.get(5)?,
                            })
                        },
                    )
                    .optional()?)
            })
            .await
    }

    // ---- symbols -------------------------------------------------------

    pub async fn replace_symbols(&self, path: String, symbols: Vec<Symbol>) -> Result<()> {
        self.conn
            .with_txn(move |tx| {
                tx.execute("DELETE FROM symbols WHERE file_path = ?1", params![path])?;
                for s in &symbols {
                    tx.execute(
                        "INSERT INTO symbols (name, kind, file_path, start_line, end_line, signature)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            s.name,
                            s.kind.as_str(),
                            s.file_path,
                            s.range.start_line as i64,
                            s.range.end_line as i64,
                            s.signature,
                        ],
                    )?;
                }
                Ok(())
            })
            .await
    }

    pub async fn symbols_for_path(&self, path: &str) -> Result<Vec<Symbol>> {
        let path = path.to_string();
        self.conn
            .with(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT * FROM symbols WHERE file_path = ?1 ORDER BY start_line")?;
                let rows = stmt.query_map(params![path], row_to_symbol)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn find_symbol(&self, name: &str) -> Result<Vec<Symbol>> {
        let name = name.to_string();
        self.conn
            .with(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT * FROM symbols WHERE name = ?1 ORDER BY file_path")?;
                let rows = stmt.query_map(params![name], row_to_symbol)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn symbols_like(&self, needle: &str, limit: usize) -> Result<Vec<Symbol>> {
        let pattern = format!("%{needle}%");
        self.conn
            .with(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM symbols WHERE name LIKE ?1 ORDER BY name LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![pattern, limit as i64], row_to_symbol)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    // ---- edges ----------------------------------------------------------

    pub async fn replace_file_edges(&self, from_path: String, edges: Vec<FileEdge>) -> Result<()> {
        self.conn
            .with_txn(move |tx| {
                tx.execute(
                    "DELETE FROM file_edges WHERE from_path = ?1",
                    params![from_path],
                )?;
                for e in &edges {
                    tx.execute(
                        "INSERT OR IGNORE INTO file_edges (from_path, to_path, edge_kind) VALUES (?1, ?2, ?3)",
                        params![e.from_path, e.to_path, e.edge_kind.as_str()],
                    )?;
                }
                Ok(())
            })
            .await
    }

    pub async fn file_edges(&self, path: &str, direction: Direction) -> Result<Vec<FileEdge>> {
        let path = path.to_string();
        self.conn
            .with(move |conn| {
                let sql = match direction {
                    Direction::Upstream => {
                        "SELECT * FROM file_edges WHERE to_path = ?1 ORDER BY from_path"
                    }
                    Direction::Downstream => {
                        "SELECT * FROM file_edges WHERE from_path = ?1 ORDER BY to_path"
                    }
                };
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt.query_map(params![path], |row| {
                    Ok(FileEdge {
                        from_path: row.get("from_path")?,
                        to_path: row.get("to_path")?,
                        edge_kind: FileEdgeKind::parse(&row.get::<_, String>("edge_kind")?)
                            .unwrap_or(FileEdgeKind::Import),
                    })
                })?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn all_file_edges(&self) -> Result<Vec<FileEdge>> {
        self.conn
            .with(move |conn| {
                let mut stmt = conn.prepare("SELECT * FROM file_edges")?;
                let rows = stmt.query_map([], |row| {
                    Ok(FileEdge {
                        from_path: row.get("from_path")?,
                        to_path: row.get("to_path")?,
                        edge_kind: FileEdgeKind::parse(&row.get::<_, String>("edge_kind")?)
                            .unwrap_or(FileEdgeKind::Import),
                    })
                })?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn all_symbol_edges(&self) -> Result<Vec<SymbolEdge>> {
        self.conn
            .with(move |conn| {
                let mut stmt = conn.prepare("SELECT * FROM symbol_edges")?;
                let rows = stmt.query_map([], |row| {
                    Ok(SymbolEdge {
                        from_symbol: row.get("from_symbol")?,
                        to_symbol: row.get("to_symbol")?,
                        relation: SymbolRelation::parse(&row.get::<_, String>("relation")?)
                            .unwrap_or(SymbolRelation::Calls),
                    })
                })?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn remove_file_edges_touching(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.conn
            .with(move |conn| {
                conn.execute(
                    "DELETE FROM file_edges WHERE from_path = ?1 OR to_path = ?1",
                    params![path],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn replace_symbol_edges(&self, from_symbol: String, edges: Vec<SymbolEdge>) -> Result<()> {
        self.conn
            .with_txn(move |tx| {
                tx.execute(
                    "DELETE FROM symbol_edges WHERE from_symbol = ?1",
                    params![from_symbol],
                )?;
                for e in &edges {
                    tx.execute(
                        "INSERT OR IGNORE INTO symbol_edges (from_symbol, to_symbol, relation) VALUES (?1, ?2, ?3)",
                        params![e.from_symbol, e.to_symbol, e.relation.as_str()],
                    )?;
                }
                Ok(())
            })
            .await
    }

    pub async fn symbol_edges(&self, symbol: &str, direction: Direction) -> Result<Vec<SymbolEdge>> {
        let symbol = symbol.to_string();
        self.conn
            .with(move |conn| {
                let sql = match direction {
                    Direction::Upstream => {
                        "SELECT * FROM symbol_edges WHERE to_symbol = ?1 ORDER BY from_symbol"
                    }
                    Direction::Downstream => {
                        "SELECT * FROM symbol_edges WHERE from_symbol = ?1 ORDER BY to_symbol"
                    }
                };
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt.query_map(params![symbol], |row| {
                    Ok(SymbolEdge {
                        from_symbol: row.get("from_symbol")?,
                        to_symbol: row.get("to_symbol")?,
                        relation: SymbolRelation::parse(&row.get::<_, String>("relation")?)
                            .unwrap_or(SymbolRelation::Calls),
                    })
                })?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    // ---- transactions / WAL --------------------------------------------

    pub async fn write_transaction(&self, entry: TransactionLogEntry) -> Result<()> {
        self.conn
            .with(move |conn| {
                conn.execute(
                    "INSERT INTO transactions (id, started_at, state, snapshots, inverse_edits)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET state = excluded.state, snapshots = excluded.snapshots, inverse_edits = excluded.inverse_edits",
                    params![
                        entry.id,
                        entry.started_at,
                        entry.state.as_str(),
                        serde_json::to_string(&entry.snapshots).unwrap_or_default(),
                        serde_json::to_string(&entry.inverse_edits).unwrap_or_default(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Option<TransactionLogEntry>> {
        let id = id.to_string();
        self.conn
            .with(move |conn| Ok(Self::get_transaction_sync(conn, &id)?))
            .await
    }

    fn get_transaction_sync(conn: &Connection, id: &str) -> rusqlite::Result<Option<TransactionLogEntry>> {
        conn.query_row(
            "SELECT * FROM transactions WHERE id = ?1",
            params![id],
            row_to_txn,
        )
        .optional()
    }

    pub async fn pending_transactions(&self) -> Result<Vec<TransactionLogEntry>> {
        self.conn
            .with(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT * FROM transactions WHERE state = 'pending' ORDER BY started_at")?;
                let rows = stmt.query_map([], row_to_txn)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn recent_transactions(&self, limit: usize) -> Result<Vec<TransactionLogEntry>> {
        self.conn
            .with(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT * FROM transactions ORDER BY started_at DESC LIMIT ?1")?;
                let rows = stmt.query_map(params![limit as i64], row_to_txn)?;
                Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await
    }

    pub async fn push_undo(&self, transaction_id: String) -> Result<()> {
        self.conn
            .with(move |conn| {
                conn.execute(
                    "INSERT INTO undo_stack (transaction_id) VALUES (?1)",
                    params![transaction_id],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn pop_undo(&self) -> Result<Option<String>> {
        self.conn
            .with(move |conn| {
                let top: Option<(i64, String)> = conn
                    .query_row(
                        "SELECT seq, transaction_id FROM undo_stack ORDER BY seq DESC LIMIT 1",
                        [],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .optional()?;
                if let Some((seq, id)) = &top {
                    conn.execute("DELETE FROM undo_stack WHERE seq = ?1", params![seq])?;
                }
                Ok(top.map(|(_, id)| id))
            })
            .await
    }

    pub async fn push_redo(&self, transaction_id: String) -> Result<()> {
        self.conn
            .with(move |conn| {
                conn.execute(
                    "INSERT INTO redo_stack (transaction_id) VALUES (?1)",
                    params![transaction_id],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn pop_redo(&self) -> Result<Option<String>> {
        self.conn
            .with(move |conn| {
                let top: Option<(i64, String)> = conn
                    .query_row(
                        "SELECT seq, transaction_id FROM redo_stack ORDER BY seq DESC LIMIT 1",
                        [],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .optional()?;
                if let Some((seq, _)) = &top {
                    conn.execute("DELETE FROM redo_stack WHERE seq = ?1", params![seq])?;
                }
                Ok(top.map(|(_, id)| id))
            })
            .await
    }

    pub async fn clear_redo(&self) -> Result<()> {
        self.conn
            .with(move |conn| {
                conn.execute("DELETE FROM redo_stack", [])?;
                Ok(())
            })
            .await
    }

    pub async fn undo_depth(&self) -> Result<u64> {
        self.conn
            .with(move |conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM undo_stack", [], |r| r.get::<_, i64>(0))? as u64)
            })
            .await
    }

    pub async fn redo_depth(&self) -> Result<u64> {
        self.conn
            .with(move |conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM redo_stack", [], |r| r.get::<_, i64>(0))? as u64)
            })
            .await
    }

    // ---- evidence packs --------------------------------------------------

    pub async fn upsert_pack(&self, pack: EvidencePack) -> Result<()> {
        self.conn
            .with(move |conn| {
                conn.execute(
                    "INSERT INTO evidence_packs (pack_id, created_at, expires_at, items)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(pack_id) DO UPDATE SET created_at = excluded.created_at, expires_at = excluded.expires_at, items = excluded.items",
                    params![
                        pack.pack_id,
                        pack.created_at,
                        pack.expires_at,
                        serde_json::to_string(&pack.items).unwrap_or_default(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_pack(&self, pack_id: &str) -> Result<Option<EvidencePack>> {
        let pack_id = pack_id.to_string();
        self.conn
            .with(move |conn| {
                conn.query_row(
                    "SELECT * FROM evidence_packs WHERE pack_id = ?1",
                    params![pack_id],
                    row_to_pack,
                )
                .optional()
                .map_err(Error::from)
            })
            .await
    }

    pub async fn evict_pack(&self, pack_id: &str) -> Result<()> {
        let pack_id = pack_id.to_string();
        self.conn
            .with(move |conn| {
                conn.execute("DELETE FROM evidence_packs WHERE pack_id = ?1", params![pack_id])?;
                Ok(())
            })
            .await
    }

    pub async fn pack_count(&self) -> Result<u64> {
        self.conn
            .with(move |conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM evidence_packs", [], |r| {
                    r.get::<_, i64>(0)
                })? as u64)
            })
            .await
    }

    /// Oldest-created pack id, used for LRU-ish eviction when the cache is full.
    pub async fn oldest_pack_id(&self) -> Result<Option<String>> {
        self.conn
            .with(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT pack_id FROM evidence_packs ORDER BY created_at ASC LIMIT 1",
                        [],
                        |r| r.get::<_, String>(0),
                    )
                    .optional()?)
            })
            .await
    }

    // ---- summaries ---------------------------------------------------

    pub async fn upsert_summary(&self, summary: ChunkSummary) -> Result<()> {
        self.conn
            .with(move |conn| {
                conn.execute(
                    "INSERT INTO chunk_summaries (chunk_id, summary) VALUES (?1, ?2)
                     ON CONFLICT(chunk_id) DO UPDATE SET summary = excluded.summary",
                    params![summary.chunk_id, summary.summary],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_summary(&self, chunk_id: &str) -> Result<Option<String>> {
        let chunk_id = chunk_id.to_string();
        self.conn
            .with(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT summary FROM chunk_summaries WHERE chunk_id = ?1",
                        params![chunk_id],
                        |r| r.get::<_, String>(0),
                    )
                    .optional()?)
            })
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Upstream,
    Downstream,
}

fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<Symbol> {
    let kind: String = row.get("kind")?;
    Ok(Symbol {
        name: row.get("name")?,
        kind: SymbolKind::parse(&kind).unwrap_or(SymbolKind::Function),
        file_path: row.get("file_path")?,
        range: LineRange::new(
            row.get::<_, i64>("start_line")? as u32,
            row.get::<_, i64>("end_line")? as u32,
        ),
        signature: row.get("signature")?,
    })
}

fn row_to_txn(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransactionLogEntry> {
    let state: String = row.get("state")?;
    let snapshots: String = row.get("snapshots")?;
    let inverse_edits: String = row.get("inverse_edits")?;
    Ok(TransactionLogEntry {
        id: row.get("id")?,
        started_at: row.get("started_at")?,
        state: TxnState::parse(&state).unwrap_or(TxnState::Pending),
        snapshots: serde_json::from_str(&snapshots).unwrap_or_default(),
        inverse_edits: serde_json::from_str(&inverse_edits).unwrap_or_default(),
    })
}

fn row_to_pack(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvidencePack> {
    let items: String = row.get("items")?;
    Ok(EvidencePack {
        pack_id: row.get("pack_id")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        items: serde_json::from_str(&items).unwrap_or_default(),
    })
}

/// Minimal glob matcher supporting `*` and `**`, enough for the scope globs
/// in §4.7 (`docs/**`, `*.rs`, ...). Not a general-purpose implementation.
fn glob_match(pattern: &str, path: &str) -> bool {
    fn compile(pattern: &str) -> String {
        let mut out = String::from("^");
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        out.push_str(".*");
                    } else {
                        out.push_str("[^/]*");
                    }
                }
                '.' | '+' | '(' | ')' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                    out.push('\\');
                    out.push(c);
                }
                other => out.push(other),
            }
        }
        out.push('$');
        out
    }
    match regex::Regex::new(&compile(pattern)) {
        Ok(re) => re.is_match(path),
        Err(_) => path == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChunkKind;

    fn sample_file(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            content_hash: "h1".into(),
            size_bytes: 10,
            line_count: 2,
            mtime: 0,
            language_tag: None,
            newline_style: NewlineStyle::Lf,
            indent_style: IndentStyle::Unknown,
        }
    }

    fn sample_chunk(path: &str, start: u32, end: u32, hash: &str) -> Chunk {
        Chunk {
            id: Chunk::derive_id(path, LineRange::new(start, end)),
            path: path.to_string(),
            kind: ChunkKind::Text,
            section_path: vec![],
            heading: None,
            heading_level: None,
            range: LineRange::new(start, end),
            text: "hello".into(),
            content_hash: hash.into(),
        }
    }

    #[tokio::test]
    async fn upsert_and_get_file_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_file(sample_file("a.txt")).await.unwrap();
        let got = store.get_file("a.txt").await.unwrap().unwrap();
        assert_eq!(got.content_hash, "h1");
    }

    #[tokio::test]
    async fn replace_chunks_drops_stale_embeddings() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_file(sample_file("a.txt")).await.unwrap();
        let c1 = sample_chunk("a.txt", 1, 2, "hash1");
        store
            .replace_chunks("a.txt".into(), vec![c1.clone()])
            .await
            .unwrap();
        store
            .upsert_embedding(Embedding::new(c1.id.clone(), "p".into(), "m".into(), vec![1.0, 2.0]))
            .await
            .unwrap();
        assert!(store.get_embedding(&c1.id, "p", "m").await.unwrap().is_some());

        // Reindex with a different chunk id for the same range: old chunk
        // (and its embedding) must disappear.
        let c2 = sample_chunk("a.txt", 1, 3, "hash2");
        store
            .replace_chunks("a.txt".into(), vec![c2.clone()])
            .await
            .unwrap();
        assert!(store.get_chunk(&c1.id).await.unwrap().is_none());
        assert!(store.get_embedding(&c1.id, "p", "m").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undo_redo_stacks_are_lifo() {
        let store = Store::open_in_memory().unwrap();
        store.push_undo("t1".into()).await.unwrap();
        store.push_undo("t2".into()).await.unwrap();
        assert_eq!(store.pop_undo().await.unwrap(), Some("t2".into()));
        assert_eq!(store.pop_undo().await.unwrap(), Some("t1".into()));
        assert_eq!(store.pop_undo().await.unwrap(), None);
    }

    #[tokio::test]
    async fn glob_matching_supports_double_star() {
        assert!(glob_match("docs/**", "docs/a/b.md"));
        assert!(glob_match("*.rs", "main.rs"));
        assert!(!glob_match("*.rs", "main.py"));
    }
}
