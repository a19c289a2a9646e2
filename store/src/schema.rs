//! SQLite schema for the index store (§4.1, §6 `index.db`).

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, strftime('%s', 'now'));

CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    line_count INTEGER NOT NULL,
    mtime INTEGER NOT NULL,
    language_tag TEXT,
    newline_style TEXT NOT NULL,
    indent_style TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    section_path TEXT NOT NULL, -- JSON array
    heading TEXT,
    heading_level INTEGER,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    text TEXT NOT NULL,
    content_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path);
CREATE INDEX IF NOT EXISTS idx_chunks_hash ON chunks(content_hash);

CREATE TABLE IF NOT EXISTS embeddings (
    chunk_id TEXT NOT NULL REFERENCES chunks(id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    dims INTEGER NOT NULL,
    vector BLOB NOT NULL,
    l2_norm REAL NOT NULL,
    PRIMARY KEY (chunk_id, provider, model)
);

CREATE TABLE IF NOT EXISTS symbols (
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    file_path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    signature TEXT,
    PRIMARY KEY (file_path, name, start_line)
);

CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_path);

CREATE TABLE IF NOT EXISTS file_edges (
    from_path TEXT NOT NULL,
    to_path TEXT NOT NULL,
    edge_kind TEXT NOT NULL,
    PRIMARY KEY (from_path, to_path, edge_kind)
);

CREATE INDEX IF NOT EXISTS idx_file_edges_from ON file_edges(from_path);
CREATE INDEX IF NOT EXISTS idx_file_edges_to ON file_edges(to_path);

CREATE TABLE IF NOT EXISTS symbol_edges (
    from_symbol TEXT NOT NULL,
    to_symbol TEXT NOT NULL,
    relation TEXT NOT NULL,
    PRIMARY KEY (from_symbol, to_symbol, relation)
);

CREATE INDEX IF NOT EXISTS idx_symbol_edges_from ON symbol_edges(from_symbol);
CREATE INDEX IF NOT EXISTS idx_symbol_edges_to ON symbol_edges(to_symbol);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    started_at INTEGER NOT NULL,
    state TEXT NOT NULL,
    snapshots TEXT NOT NULL,     -- JSON array of FileSnapshot
    inverse_edits TEXT NOT NULL  -- JSON array of InverseEdit
);

CREATE INDEX IF NOT EXISTS idx_transactions_state ON transactions(state);

CREATE TABLE IF NOT EXISTS evidence_packs (
    pack_id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    items TEXT NOT NULL -- JSON array of PackItem
);

CREATE TABLE IF NOT EXISTS chunk_summaries (
    chunk_id TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
    summary TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS undo_stack (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS redo_stack (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id TEXT NOT NULL
);
"#;
