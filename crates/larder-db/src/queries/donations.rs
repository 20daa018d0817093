use anyhow::{Context, Result};
use rusqlite::Row;
use uuid::Uuid;

use larder_types::models::{Badges, Donation};

use crate::Database;
use crate::codec::{get_id, get_json, get_ts, ts};
use crate::models::DonationOutcome;

impl Database {
    /// Store a donation and bump the donor's counter. The donation-champion
    /// badge is awarded once the counter reaches `champion_threshold`.
    pub fn record_donation(&self, donation: &Donation, champion_threshold: u32) -> Result<DonationOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let donor = donation.donor_id.to_string();

            tx.execute(
                "INSERT INTO donations (id, donor_id, farmer_id, food_id, food_name, donated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    donation.id.to_string(),
                    &donor,
                    donation.farmer_id.to_string(),
                    donation.food_id.to_string(),
                    &donation.food_name,
                    ts(donation.donated_at),
                ),
            )?;
            tx.execute(
                "UPDATE users SET donations_made = donations_made + 1 WHERE id = ?1",
                [&donor],
            )?;

            let (donations_made, mut badges): (u32, Badges) = tx
                .query_row(
                    "SELECT donations_made, badges FROM users WHERE id = ?1",
                    [&donor],
                    |r| Ok((r.get(0)?, get_json(r, 1)?)),
                )
                .context("donor not found")?;

            let badge_awarded = donations_made >= champion_threshold
                && badges.donation_champion.award(donation.donated_at);
            if badge_awarded {
                tx.execute(
                    "UPDATE users SET badges = ?2 WHERE id = ?1",
                    (&donor, serde_json::to_string(&badges)?),
                )?;
            }

            tx.commit()?;
            Ok(DonationOutcome {
                donations_made,
                badge_awarded,
            })
        })
    }

    /// Donations the user made or received, newest first.
    pub fn list_donations(&self, user_id: Uuid) -> Result<Vec<Donation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, donor_id, farmer_id, food_id, food_name, donated_at FROM donations
                 WHERE donor_id = ?1 OR farmer_id = ?1
                 ORDER BY donated_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], map_donation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_donation(row: &Row<'_>) -> rusqlite::Result<Donation> {
    Ok(Donation {
        id: get_id(row, 0)?,
        donor_id: get_id(row, 1)?,
        farmer_id: get_id(row, 2)?,
        food_id: get_id(row, 3)?,
        food_name: row.get(4)?,
        donated_at: get_ts(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use larder_types::models::Role;

    use super::*;
    use crate::queries::fixtures;

    fn donation(donor_id: Uuid, farmer_id: Uuid) -> Donation {
        Donation {
            id: Uuid::new_v4(),
            donor_id,
            farmer_id,
            food_id: Uuid::new_v4(),
            food_name: "Carrot peels".into(),
            donated_at: crate::now(),
        }
    }

    #[test]
    fn champion_badge_is_awarded_once_at_threshold() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice@x.io", Role::User);
        let farmer = fixtures::user(&db, "farm@x.io", Role::Farmer);

        let first = db.record_donation(&donation(alice, farmer), 2).unwrap();
        assert_eq!(first, DonationOutcome { donations_made: 1, badge_awarded: false });

        let second = db.record_donation(&donation(alice, farmer), 2).unwrap();
        assert!(second.badge_awarded);

        let third = db.record_donation(&donation(alice, farmer), 2).unwrap();
        assert_eq!(third.donations_made, 3);
        assert!(!third.badge_awarded);

        let user = db.get_user_by_id(alice).unwrap().unwrap();
        assert!(user.badges.donation_champion.earned);
        assert_eq!(user.donations_made, 3);
    }

    #[test]
    fn both_parties_see_the_donation() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice@x.io", Role::User);
        let farmer = fixtures::user(&db, "farm@x.io", Role::Farmer);
        let carol = fixtures::user(&db, "carol@x.io", Role::User);
        let d = donation(alice, farmer);
        db.record_donation(&d, 5).unwrap();

        assert_eq!(db.list_donations(alice).unwrap(), vec![d.clone()]);
        assert_eq!(db.list_donations(farmer).unwrap(), vec![d]);
        assert!(db.list_donations(carol).unwrap().is_empty());
    }
}
