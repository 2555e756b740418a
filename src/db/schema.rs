pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
PRAGMA foreign_keys = ON;
";

pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    last_known_version INTEGER NOT NULL,
    recently_updated INTEGER NOT NULL DEFAULT 0,
    checked_this_run INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS findings (
    page_id TEXT PRIMARY KEY REFERENCES pages(id) ON DELETE CASCADE ON UPDATE CASCADE,
    title TEXT NOT NULL,
    image_map TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS staleness (
    page_id TEXT PRIMARY KEY REFERENCES findings(page_id) ON DELETE CASCADE ON UPDATE CASCADE,
    last_checked TEXT NOT NULL,
    cumulative_stale_days INTEGER NOT NULL DEFAULT 0 CHECK (cumulative_stale_days >= 0)
);

CREATE TABLE IF NOT EXISTS authors (
    username TEXT PRIMARY KEY,
    email TEXT NOT NULL DEFAULT 'not found',
    fullname TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignments (
    page_id TEXT NOT NULL REFERENCES findings(page_id) ON DELETE CASCADE ON UPDATE CASCADE,
    username TEXT NOT NULL REFERENCES authors(username) ON DELETE CASCADE ON UPDATE CASCADE,
    PRIMARY KEY (page_id, username)
);

CREATE TABLE IF NOT EXISTS task_flags (
    task TEXT PRIMARY KEY CHECK (task IN ('discovery', 'audit', 'notify')),
    description TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_pages_recently_updated ON pages(recently_updated);
CREATE INDEX IF NOT EXISTS idx_assignments_username ON assignments(username);
CREATE INDEX IF NOT EXISTS idx_authors_email ON authors(email);
";
