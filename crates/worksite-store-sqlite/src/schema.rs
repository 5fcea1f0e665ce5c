//! SQL schema for the worksite SQLite store.
//!
//! The whole batch runs at connection startup; `CREATE TABLE IF NOT EXISTS`
//! makes it a no-op on an already-initialized database. `PRAGMA user_version`
//! is stamped so a future migration step has a version to compare against,
//! but nothing reads it yet.
//!
//! Note there is no UNIQUE constraint on entity name or code: uniqueness is
//! a policy rule enforced by the conflict detector, and two entities
//! legitimately share a pending identity mid-merge.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS entities (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    code        TEXT NOT NULL,
    parent_id   TEXT,            -- NULL for customers; a customer id for sites
    approval    TEXT NOT NULL,   -- 'pending' | 'approved'
    site_count  INTEGER NOT NULL DEFAULT 0,
    phone       TEXT,
    email       TEXT,
    site_name   TEXT,            -- site-specific identity fields
    site_code   TEXT,
    created_at  TEXT NOT NULL,   -- ISO 8601 UTC
    updated_at  TEXT NOT NULL
);

-- Timesheets reference an entity only via the denormalized (name, code)
-- snapshot; re-pointing them is a first-class operation, not a FK cascade.
CREATE TABLE IF NOT EXISTS timesheets (
    id             TEXT PRIMARY KEY,
    customer_name  TEXT NOT NULL,
    customer_code  TEXT NOT NULL,
    work_date      TEXT NOT NULL,  -- ISO 8601 date
    hours          REAL NOT NULL,
    operator       TEXT,
    machine        TEXT,
    note           TEXT,
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS entities_name_idx   ON entities(name);
CREATE INDEX IF NOT EXISTS entities_code_idx   ON entities(code);
CREATE INDEX IF NOT EXISTS entities_parent_idx ON entities(parent_id);
CREATE INDEX IF NOT EXISTS timesheets_name_idx ON timesheets(customer_name);

PRAGMA user_version = 1;
";
