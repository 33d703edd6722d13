/// Ordered schema migrations; index + 1 is the resulting `user_version`.
pub const MIGRATIONS: &[&str] = &[MIG_0001_SESSIONS];

const MIG_0001_SESSIONS: &str = r#"
BEGIN;

CREATE TABLE IF NOT EXISTS sessions (
  position        INTEGER PRIMARY KEY,
  device          TEXT NOT NULL UNIQUE,
  start_time      TEXT NOT NULL,
  end_time        TEXT NOT NULL,
  duration_s      REAL NOT NULL CHECK (duration_s >= 0),
  applications    TEXT NOT NULL
);

COMMIT;
"#;
