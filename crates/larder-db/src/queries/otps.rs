use anyhow::Result;
use chrono::{DateTime, Utc};

use super::OptionalExt;
use crate::Database;
use crate::codec::{get_ts, ts};
use crate::models::OtpRow;

impl Database {
    /// Store a one-time code for `email`, replacing any earlier one.
    pub fn upsert_otp(&self, email: &str, otp_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO otps (email, otp_hash, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET otp_hash = excluded.otp_hash,
                                                  expires_at = excluded.expires_at",
                (email, otp_hash, ts(expires_at)),
            )?;
            Ok(())
        })
    }

    pub fn get_otp(&self, email: &str) -> Result<Option<OtpRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT email, otp_hash, expires_at FROM otps WHERE email = ?1",
                [email],
                |row| {
                    Ok(OtpRow {
                        email: row.get(0)?,
                        otp_hash: row.get(1)?,
                        expires_at: get_ts(row, 2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_otp(&self, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM otps WHERE email = ?1", [email])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::fixtures;
    use chrono::TimeDelta;

    #[test]
    fn newer_code_replaces_older() {
        let db = fixtures::db();
        let later = crate::now() + TimeDelta::minutes(10);
        db.upsert_otp("a@x.io", "first", later).unwrap();
        db.upsert_otp("a@x.io", "second", later).unwrap();

        let row = db.get_otp("a@x.io").unwrap().unwrap();
        assert_eq!(row.otp_hash, "second");
        assert_eq!(row.expires_at, later);

        db.delete_otp("a@x.io").unwrap();
        assert!(db.get_otp("a@x.io").unwrap().is_none());
    }
}
