//! SQLite schema definition

/// SQL schema for the local store.
///
/// Every statement is conditional so the whole script is re-applied on each
/// launch. Indexes over columns added later by [`super::migrate`] live in the
/// column migration step instead, since older stores lack those columns
/// until it has run.
pub const SCHEMA_SQL: &str = r#"
-- Projects: named groupings of documents
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Documents: PDF artifacts with extracted content and metadata.
-- project_id is the deprecated single-project reference; membership lives
-- in project_documents.
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    project_id TEXT REFERENCES projects(id) ON DELETE SET NULL,
    file_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_hash TEXT,
    title TEXT,
    page_count INTEGER,
    extracted_text TEXT,
    inferred_metadata_json TEXT,
    user_metadata_json TEXT,
    analysis_status TEXT NOT NULL DEFAULT 'pending',
    company_name TEXT,
    report_year INTEGER,
    metadata_confirmed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Project <-> Document membership
CREATE TABLE IF NOT EXISTS project_documents (
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    added_at TEXT NOT NULL,
    PRIMARY KEY (project_id, document_id)
);

-- Collections: filtered or curated subsets of a project's documents
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    kind TEXT NOT NULL DEFAULT 'manual',
    filter_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS collection_documents (
    collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    added_at TEXT NOT NULL,
    PRIMARY KEY (collection_id, document_id)
);

-- Analysis results: cached JSON keyed by document and analysis kind
CREATE TABLE IF NOT EXISTS analysis_results (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    analysis_type TEXT NOT NULL,
    result_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(document_id, analysis_type)
);

-- Keyword lists: builtin frameworks (framework_key set) or user-defined
CREATE TABLE IF NOT EXISTS keyword_lists (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    is_builtin INTEGER NOT NULL DEFAULT 0,
    framework_key TEXT,
    category TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS keyword_categories (
    id TEXT PRIMARY KEY,
    list_id TEXT NOT NULL REFERENCES keyword_lists(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE(list_id, name)
);

CREATE TABLE IF NOT EXISTS keywords (
    id TEXT PRIMARY KEY,
    list_id TEXT NOT NULL REFERENCES keyword_lists(id) ON DELETE CASCADE,
    category_id TEXT REFERENCES keyword_categories(id) ON DELETE SET NULL,
    term TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Cached keyword and n-gram searches
CREATE TABLE IF NOT EXISTS keyword_search_cache (
    id TEXT PRIMARY KEY,
    list_id TEXT REFERENCES keyword_lists(id) ON DELETE CASCADE,
    scope_hash TEXT NOT NULL,
    result_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(list_id, scope_hash)
);

CREATE TABLE IF NOT EXISTS ngram_cache (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    n INTEGER NOT NULL,
    result_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(document_id, n)
);

-- Reference data
CREATE TABLE IF NOT EXISTS countries (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    region TEXT
);

CREATE TABLE IF NOT EXISTS industries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    sector TEXT
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(file_hash);
CREATE INDEX IF NOT EXISTS idx_documents_legacy_project ON documents(project_id);
CREATE INDEX IF NOT EXISTS idx_project_documents_doc ON project_documents(document_id);
CREATE INDEX IF NOT EXISTS idx_collections_project ON collections(project_id);
CREATE INDEX IF NOT EXISTS idx_collection_documents_doc ON collection_documents(document_id);
CREATE INDEX IF NOT EXISTS idx_analysis_document ON analysis_results(document_id);
CREATE INDEX IF NOT EXISTS idx_keywords_list ON keywords(list_id);
CREATE INDEX IF NOT EXISTS idx_keyword_categories_list ON keyword_categories(list_id);
CREATE INDEX IF NOT EXISTS idx_keyword_lists_framework_key ON keyword_lists(framework_key);
"#;

/// Columns added after the first release, applied by column introspection.
///
/// Order matters: the `keyword_lists.category` back-fill in
/// [`super::migrate`] runs after this ledger has been applied.
pub const COLUMN_MIGRATIONS: &[ColumnMigration] = &[
    ColumnMigration {
        table: "documents",
        column: "company_name",
        definition: "TEXT",
    },
    ColumnMigration {
        table: "documents",
        column: "report_year",
        definition: "INTEGER",
    },
    ColumnMigration {
        table: "documents",
        column: "metadata_confirmed",
        definition: "INTEGER NOT NULL DEFAULT 0",
    },
    ColumnMigration {
        table: "keyword_lists",
        column: "category",
        definition: "TEXT",
    },
];

/// Indexes over migrated columns, created once the columns exist
pub const MIGRATED_INDEXES_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_documents_company ON documents(company_name);
CREATE INDEX IF NOT EXISTS idx_keyword_lists_category ON keyword_lists(category);
"#;

/// One builtin list per framework key. Matches the seeding predicate, so user
/// lists that reuse a framework key are unaffected. Created only once no
/// duplicate builtin keys remain.
pub const BUILTIN_KEY_INDEX_SQL: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_keyword_lists_builtin_key
    ON keyword_lists(framework_key) WHERE is_builtin = 1 AND framework_key IS NOT NULL
"#;

/// A column that may be missing from stores created by older releases
#[derive(Debug, Clone, Copy)]
pub struct ColumnMigration {
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
}

/// Tables reported by store statistics
pub const STAT_TABLES: &[&str] = &[
    "projects",
    "documents",
    "project_documents",
    "collections",
    "analysis_results",
    "keyword_lists",
    "keywords",
    "countries",
    "industries",
    "settings",
];
