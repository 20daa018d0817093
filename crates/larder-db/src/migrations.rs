use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE,
                password_hash       TEXT,
                first_name          TEXT NOT NULL DEFAULT '',
                last_name           TEXT NOT NULL DEFAULT '',
                role                TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'farmer')),
                notify_email        INTEGER NOT NULL DEFAULT 1,
                notify_in_app       INTEGER NOT NULL DEFAULT 1,
                days_before_expiry  INTEGER NOT NULL DEFAULT 3,
                badges              TEXT NOT NULL DEFAULT '{}',
                farmer_details      TEXT,
                latitude            REAL,
                longitude           REAL,
                donations_made      INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE otps (
                email       TEXT PRIMARY KEY,
                otp_hash    TEXT NOT NULL,
                expires_at  TEXT NOT NULL
            );

            CREATE TABLE food_items (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                name        TEXT NOT NULL,
                category    TEXT NOT NULL,
                shelf_life  INTEGER NOT NULL,
                m_date      TEXT NOT NULL,
                expiry_date TEXT NOT NULL,
                is_wasted   INTEGER NOT NULL DEFAULT 0,
                wasted_at   TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_food_items_user_expiry
                ON food_items(user_id, expiry_date);

            CREATE TABLE deleted_food_items (
                id                  TEXT PRIMARY KEY,
                original_id         TEXT NOT NULL,
                user_id             TEXT NOT NULL REFERENCES users(id),
                name                TEXT NOT NULL,
                category            TEXT NOT NULL,
                was_wasted          INTEGER NOT NULL DEFAULT 0,
                wasted_at           TEXT,
                expiry_date         TEXT,
                deleted_at          TEXT NOT NULL,
                cleared_from_graph  INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_deleted_food_items_user
                ON deleted_food_items(user_id, cleared_from_graph);

            CREATE TABLE notifications (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                food_item_id    TEXT NOT NULL REFERENCES food_items(id) ON DELETE CASCADE,
                message         TEXT NOT NULL,
                kind            TEXT NOT NULL CHECK (kind IN ('warning', 'expired', 'suggestion')),
                is_read         INTEGER NOT NULL DEFAULT 0,
                suggestions     TEXT NOT NULL DEFAULT '[]',
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, created_at);

            -- One open warning and one expired notice per (user, item)
            CREATE UNIQUE INDEX idx_notifications_once
                ON notifications(user_id, food_item_id, kind)
                WHERE kind IN ('warning', 'expired');

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                sender_id       TEXT NOT NULL REFERENCES users(id),
                recipient_id    TEXT NOT NULL REFERENCES users(id),
                text            TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                deleted         INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_messages_sender
                ON messages(sender_id, created_at);
            CREATE INDEX idx_messages_recipient
                ON messages(recipient_id, created_at);

            CREATE TABLE donations (
                id          TEXT PRIMARY KEY,
                donor_id    TEXT NOT NULL REFERENCES users(id),
                farmer_id   TEXT NOT NULL REFERENCES users(id),
                food_id     TEXT NOT NULL,
                food_name   TEXT NOT NULL,
                donated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_donations_farmer
                ON donations(farmer_id, donated_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
