use super::topology::Backend;

/// A relation whose rows live in exactly one backend.
///
/// `ddl` is written in the owner's dialect and only ever runs there: the
/// embedded store never gets tables owned by the network store.
#[derive(Debug, Clone, Copy)]
pub struct LogicalTable {
    pub name: &'static str,
    pub owner: Backend,
    pub ddl: &'static [&'static str],
}

pub const IDENTITY_TABLE: &str = "admin";

pub const TABLES: &[LogicalTable] = &[
    LogicalTable {
        name: IDENTITY_TABLE,
        owner: Backend::Network,
        ddl: &[
            r#"
            CREATE TABLE IF NOT EXISTS admin (
                id BIGSERIAL PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'staff',
                department TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_admin_department ON admin(department)",
        ],
    },
    LogicalTable {
        name: "documents",
        owner: Backend::Network,
        ddl: &[
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id BIGSERIAL PRIMARY KEY,
                owner_id BIGINT REFERENCES admin(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                object_key TEXT NOT NULL UNIQUE,
                content_type TEXT,
                size_bytes BIGINT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id)",
        ],
    },
    LogicalTable {
        name: "devices",
        owner: Backend::Embedded,
        ddl: &[r#"
            CREATE TABLE IF NOT EXISTS devices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_uid TEXT NOT NULL UNIQUE,
                label TEXT,
                location TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#],
    },
    LogicalTable {
        name: "sensor_readings",
        owner: Backend::Embedded,
        ddl: &[
            r#"
            CREATE TABLE IF NOT EXISTS sensor_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_uid TEXT NOT NULL,
                metric TEXT NOT NULL,
                value REAL NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_sensor_readings_device_time ON sensor_readings(device_uid, recorded_at)",
        ],
    },
    LogicalTable {
        name: "sensor_events",
        owner: Backend::Embedded,
        ddl: &[
            r#"
            CREATE TABLE IF NOT EXISTS sensor_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_uid TEXT NOT NULL,
                kind TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'info',
                payload TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_sensor_events_created ON sensor_events(created_at)",
        ],
    },
];

pub fn owned_by(backend: Backend) -> impl Iterator<Item = &'static LogicalTable> {
    TABLES.iter().filter(move |t| t.owner == backend)
}
