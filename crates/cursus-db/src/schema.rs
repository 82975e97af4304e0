//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Catalog mirror (written by the content side, read by the ledger)
-- ============================================================

CREATE TABLE IF NOT EXISTS courses (
    course_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    is_published INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'draft'
        CHECK (status IN ('draft', 'open', 'closed', 'archived')),
    lesson_count INTEGER NOT NULL DEFAULT 0,
    content_revision INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS lessons (
    course_id TEXT NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
    lesson_id TEXT NOT NULL,
    module_id TEXT NOT NULL,
    title TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    is_published INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (course_id, lesson_id)
);

CREATE INDEX IF NOT EXISTS idx_lessons_module ON lessons(course_id, module_id);

-- ============================================================
-- Enrollments
-- ============================================================

CREATE TABLE IF NOT EXISTS enrollments (
    user_id TEXT NOT NULL,
    course_id TEXT NOT NULL REFERENCES courses(course_id),
    status TEXT NOT NULL
        CHECK (status IN ('active', 'pending', 'completed', 'canceled', 'rejected', 'expired')),
    payment_status TEXT NOT NULL
        CHECK (payment_status IN ('unpaid', 'pending', 'paid', 'failed', 'refunded')),
    approval_status TEXT NOT NULL
        CHECK (approval_status IN ('pending_review', 'approved', 'rejected')),
    subscription_status TEXT NOT NULL
        CHECK (subscription_status IN ('active', 'trialing', 'past_due', 'unpaid', 'canceled',
                                       'incomplete', 'incomplete_expired', 'paused')),
    completed_lesson_count INTEGER NOT NULL DEFAULT 0,
    total_lessons INTEGER NOT NULL DEFAULT 0,
    percent INTEGER NOT NULL DEFAULT 0 CHECK (percent BETWEEN 0 AND 100),
    course_revision INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    paid_at INTEGER,
    approved_at INTEGER,
    last_accessed_at INTEGER,
    completed_at INTEGER,
    access_until INTEGER,
    PRIMARY KEY (user_id, course_id)
);

CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments(course_id);

-- ============================================================
-- Lesson progress
-- ============================================================

CREATE TABLE IF NOT EXISTS lesson_progress (
    user_id TEXT NOT NULL,
    course_id TEXT NOT NULL,
    lesson_id TEXT NOT NULL,
    module_id TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('in_progress', 'completed')),
    percent INTEGER NOT NULL DEFAULT 0 CHECK (percent BETWEEN 0 AND 100),
    max_watched_second INTEGER NOT NULL DEFAULT 0,
    completed_at INTEGER,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, course_id, lesson_id)
);

-- ============================================================
-- Certificates
-- ============================================================

CREATE TABLE IF NOT EXISTS certificates (
    certificate_id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    course_id TEXT NOT NULL,
    issued_at INTEGER NOT NULL,
    course_revision INTEGER NOT NULL,
    lessons_considered INTEGER NOT NULL,
    integrity_hash TEXT NOT NULL,
    issued_by TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'issued' CHECK (status IN ('issued', 'revoked')),
    UNIQUE (user_id, course_id)
);

CREATE INDEX IF NOT EXISTS idx_certificates_user ON certificates(user_id, issued_at);

-- ============================================================
-- Payment-signal ledger
-- ============================================================

CREATE TABLE IF NOT EXISTS payment_events (
    event_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    course_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('processing', 'done', 'error')),
    last_error TEXT,
    attempts INTEGER NOT NULL DEFAULT 1,
    received_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- ============================================================
-- Audit log
-- ============================================================

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor TEXT NOT NULL,
    action TEXT NOT NULL,
    user_id TEXT NOT NULL,
    course_id TEXT NOT NULL,
    detail TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_pair ON audit_log(user_id, course_id, created_at);
"#;
