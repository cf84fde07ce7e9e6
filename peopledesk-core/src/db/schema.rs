pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'employee' CHECK (role IN ('employee', 'supervisor', 'manager', 'hr')),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS checklists (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS checklist_items (
    id TEXT PRIMARY KEY,
    checklist_id TEXT NOT NULL REFERENCES checklists(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS checklist_assignments (
    id TEXT PRIMARY KEY,
    checklist_id TEXT NOT NULL REFERENCES checklists(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    assigned_at TEXT NOT NULL,
    UNIQUE (checklist_id, user_id)
);

-- Derived from checklist_assignments x checklist_items; rebuilt by maintenance.
CREATE TABLE IF NOT EXISTS checklist_progress (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    item_id TEXT NOT NULL REFERENCES checklist_items(id) ON DELETE CASCADE,
    completed INTEGER NOT NULL DEFAULT 0,
    note TEXT,
    verification TEXT NOT NULL DEFAULT 'unverified' CHECK (verification IN ('unverified', 'verified', 'rejected')),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, item_id)
);

CREATE TABLE IF NOT EXISTS surveys (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS survey_questions (
    id TEXT PRIMARY KEY,
    survey_id TEXT NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
    prompt TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS survey_responses (
    id TEXT PRIMARY KEY,
    survey_id TEXT NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
    respondent_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    submitted_at TEXT NOT NULL,
    UNIQUE (respondent_id, survey_id)
);

-- No ON DELETE action: purging responses ahead of their answers needs deferred checks.
CREATE TABLE IF NOT EXISTS survey_answers (
    id TEXT PRIMARY KEY,
    response_id TEXT NOT NULL REFERENCES survey_responses(id),
    question_id TEXT NOT NULL REFERENCES survey_questions(id) ON DELETE CASCADE,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS maintenance_runs (
    id TEXT PRIMARY KEY,
    projection TEXT NOT NULL,
    inserted INTEGER NOT NULL,
    deleted INTEGER NOT NULL,
    unchanged INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_checklist ON checklist_items(checklist_id);
CREATE INDEX IF NOT EXISTS idx_assignments_user ON checklist_assignments(user_id);
CREATE INDEX IF NOT EXISTS idx_assignments_checklist ON checklist_assignments(checklist_id);
CREATE INDEX IF NOT EXISTS idx_progress_item ON checklist_progress(item_id);
CREATE INDEX IF NOT EXISTS idx_questions_survey ON survey_questions(survey_id);
CREATE INDEX IF NOT EXISTS idx_responses_survey ON survey_responses(survey_id);
CREATE INDEX IF NOT EXISTS idx_answers_response ON survey_answers(response_id);
CREATE INDEX IF NOT EXISTS idx_runs_finished ON maintenance_runs(finished_at);
"#;
