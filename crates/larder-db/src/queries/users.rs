use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use larder_types::models::{FarmerDetails, Location, NotificationPreferences};

use super::OptionalExt;
use crate::Database;
use crate::codec::{get_id, get_json, get_json_opt, get_role, get_ts, ts};
use crate::models::{NewUser, UserRow};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, \
     notify_email, notify_in_app, days_before_expiry, badges, farmer_details, \
     latitude, longitude, donations_made, created_at";

impl Database {
    /// Insert a user. Returns `false` when the email is already registered.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "INSERT INTO users (id, email, password_hash, first_name, last_name, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(email) DO NOTHING",
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.role.as_str(),
                    ts(user.created_at),
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    /// Batch-fetch users for a set of ids. Unknown ids are skipped.
    pub fn get_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(id_strings.iter()), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn list_farmers(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = 'farmer' ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password_hash = ?2 WHERE id = ?1",
                (user_id.to_string(), password_hash),
            )?;
            Ok(n == 1)
        })
    }

    pub fn update_preferences(&self, user_id: Uuid, prefs: &NotificationPreferences) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET notify_email = ?2, notify_in_app = ?3, days_before_expiry = ?4
                 WHERE id = ?1",
                rusqlite::params![
                    user_id.to_string(),
                    prefs.email,
                    prefs.in_app,
                    prefs.days_before_expiry
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn update_farmer_details(&self, user_id: Uuid, details: &FarmerDetails) -> Result<bool> {
        let json = serde_json::to_string(details)?;
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET farmer_details = ?2 WHERE id = ?1 AND role = 'farmer'",
                (user_id.to_string(), json),
            )?;
            Ok(n == 1)
        })
    }

    pub fn update_location(&self, user_id: Uuid, location: Location) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET latitude = ?2, longitude = ?3 WHERE id = ?1",
                rusqlite::params![user_id.to_string(), location.latitude, location.longitude],
            )?;
            Ok(n == 1)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    stmt.query_row([value], map_user).optional()
}

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let latitude: Option<f64> = row.get(11)?;
    let longitude: Option<f64> = row.get(12)?;

    Ok(UserRow {
        id: get_id(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: get_role(row, 5)?,
        preferences: NotificationPreferences {
            email: row.get(6)?,
            in_app: row.get(7)?,
            days_before_expiry: row.get(8)?,
        },
        badges: get_json(row, 9)?,
        farmer_details: get_json_opt(row, 10)?,
        location: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| Location { latitude, longitude }),
        donations_made: row.get(13)?,
        created_at: get_ts(row, 14)?,
    })
}

#[cfg(test)]
mod tests {
    use larder_types::models::Role;

    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn duplicate_email_is_reported_not_raised() {
        let db = fixtures::db();
        let first = fixtures::user(&db, "a@x.io", Role::User);
        let inserted = db
            .create_user(&NewUser {
                id: Uuid::new_v4(),
                email: "a@x.io",
                password_hash: None,
                first_name: "Other",
                last_name: "",
                role: Role::Farmer,
                created_at: crate::now(),
            })
            .unwrap();
        assert!(!inserted);

        let row = db.get_user_by_email("a@x.io").unwrap().unwrap();
        assert_eq!(row.id, first);
        assert_eq!(row.role, Role::User);
    }

    #[test]
    fn new_users_get_default_preferences() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "b@x.io", Role::User);
        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(row.preferences, NotificationPreferences::default());
        assert!(!row.badges.donation_champion.earned);
        assert!(row.location.is_none());
    }

    #[test]
    fn farmer_details_only_stick_to_farmers() {
        let db = fixtures::db();
        let farmer = fixtures::user(&db, "f@x.io", Role::Farmer);
        let consumer = fixtures::user(&db, "c@x.io", Role::User);
        let details = FarmerDetails {
            crops: Some("kale, leeks".into()),
            ..Default::default()
        };

        assert!(db.update_farmer_details(farmer, &details).unwrap());
        assert!(!db.update_farmer_details(consumer, &details).unwrap());

        let farmers = db.list_farmers().unwrap();
        assert_eq!(farmers.len(), 1);
        assert_eq!(farmers[0].farmer_details.as_ref().unwrap().crops.as_deref(), Some("kale, leeks"));
    }

    #[test]
    fn batch_lookup_skips_unknown_ids() {
        let db = fixtures::db();
        let a = fixtures::user(&db, "a@x.io", Role::User);
        let b = fixtures::user(&db, "b@x.io", Role::Farmer);
        let rows = db.get_users_by_ids(&[a, b, Uuid::new_v4()]).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
