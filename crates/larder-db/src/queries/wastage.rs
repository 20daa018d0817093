//! Wastage aggregation over live and archived food items.
//!
//! Every query takes the owner as `?1` and the inclusive window as
//! `?2..=?3`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use larder_types::api::{CategoryBreakdown, CategoryCount};
use larder_types::bucket::Bucket;

use crate::Database;
use crate::codec::{count, ts};
use crate::models::WastageReset;

/// Live items that count as wasted or expired in the window.
const LIVE_IN_WINDOW: &str = "user_id = ?1 AND (
        (is_wasted = 1 AND wasted_at BETWEEN ?2 AND ?3)
        OR expiry_date BETWEEN ?2 AND ?3
    )";

/// Archived items still shown on the chart for the window.
const ARCHIVED_IN_WINDOW: &str = "user_id = ?1 AND cleared_from_graph = 0 AND (
        (was_wasted = 1 AND wasted_at BETWEEN ?2 AND ?3)
        OR expiry_date BETWEEN ?2 AND ?3
        OR deleted_at BETWEEN ?2 AND ?3
    )";

impl Database {
    pub fn wastage_by_category(&self, user_id: Uuid, bucket: &Bucket) -> Result<Vec<CategoryCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT category, COUNT(*) FROM (
                    SELECT category FROM food_items WHERE {LIVE_IN_WINDOW}
                    UNION ALL
                    SELECT category FROM deleted_food_items WHERE {ARCHIVED_IN_WINDOW}
                 )
                 GROUP BY category
                 ORDER BY category"
            ))?;

            let rows = stmt
                .query_map((user_id.to_string(), ts(bucket.start), ts(bucket.end)), |r| {
                    Ok(CategoryCount {
                        name: r.get(0)?,
                        value: count(r.get(1)?),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Undo wastage for one window: clear waste flags set inside it, move
    /// unwasted expiry dates inside it to the day after its end, and hide
    /// archived records from the chart. Runs as a single transaction.
    pub fn reset_wastage(&self, user_id: Uuid, bucket: &Bucket) -> Result<WastageReset> {
        let uid = user_id.to_string();
        let (start, end) = (ts(bucket.start), ts(bucket.end));
        let moved_to = ts(bucket.day_after_end());

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let wasted_cleared = tx.execute(
                "UPDATE food_items SET is_wasted = 0, wasted_at = NULL
                 WHERE user_id = ?1 AND is_wasted = 1 AND wasted_at BETWEEN ?2 AND ?3",
                (&uid, &start, &end),
            )?;

            let expiries_moved = tx.execute(
                "UPDATE food_items SET expiry_date = ?4
                 WHERE user_id = ?1 AND is_wasted = 0 AND expiry_date BETWEEN ?2 AND ?3",
                (&uid, &start, &end, &moved_to),
            )?;

            let archived_cleared = tx.execute(
                &format!(
                    "UPDATE deleted_food_items SET cleared_from_graph = 1 WHERE {ARCHIVED_IN_WINDOW}"
                ),
                (&uid, &start, &end),
            )?;

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM food_items
                 WHERE user_id = ?1 AND is_wasted = 1 AND wasted_at BETWEEN ?2 AND ?3",
                (&uid, &start, &end),
                |r| r.get(0),
            )?;

            tx.commit()?;

            Ok(WastageReset {
                wasted_cleared: wasted_cleared as u64,
                expiries_moved: expiries_moved as u64,
                archived_cleared: archived_cleared as u64,
                remaining_wasted: count(remaining),
            })
        })
    }

    /// Clear every waste flag and hide every archived record. Expiry dates
    /// are left as they are.
    pub fn reset_all_wastage(&self, user_id: Uuid) -> Result<WastageReset> {
        let uid = user_id.to_string();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let wasted_cleared = tx.execute(
                "UPDATE food_items SET is_wasted = 0, wasted_at = NULL
                 WHERE user_id = ?1 AND is_wasted = 1",
                [&uid],
            )?;
            let archived_cleared = tx.execute(
                "UPDATE deleted_food_items SET cleared_from_graph = 1
                 WHERE user_id = ?1 AND cleared_from_graph = 0",
                [&uid],
            )?;

            tx.commit()?;

            Ok(WastageReset {
                wasted_cleared: wasted_cleared as u64,
                archived_cleared: archived_cleared as u64,
                ..Default::default()
            })
        })
    }

    /// Live items created inside the window.
    pub fn count_created_in(&self, user_id: Uuid, bucket: &Bucket) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM food_items WHERE user_id = ?1 AND created_at BETWEEN ?2 AND ?3",
                (user_id.to_string(), ts(bucket.start), ts(bucket.end)),
                |r| r.get(0),
            )?;
            Ok(count(n))
        })
    }

    /// Live items wasted in the window, or expired in the window before `now`,
    /// grouped by category.
    pub fn wasted_breakdown(
        &self,
        user_id: Uuid,
        bucket: &Bucket,
        now: DateTime<Utc>,
    ) -> Result<Vec<CategoryBreakdown>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) FROM food_items
                 WHERE user_id = ?1 AND (
                    (is_wasted = 1 AND wasted_at BETWEEN ?2 AND ?3)
                    OR (expiry_date < ?4 AND expiry_date BETWEEN ?2 AND ?3)
                 )
                 GROUP BY category
                 ORDER BY category",
            )?;
            let rows = stmt
                .query_map(
                    (user_id.to_string(), ts(bucket.start), ts(bucket.end), ts(now)),
                    |r| {
                        Ok(CategoryBreakdown {
                            category: r.get(0)?,
                            count: count(r.get(1)?),
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta, TimeZone};
    use larder_types::bucket::BucketMode;
    use larder_types::models::Role;

    use super::*;
    use crate::queries::fixtures;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    fn june(d: u32) -> Bucket {
        Bucket::resolve(BucketMode::Day, NaiveDate::from_ymd_opt(2024, 6, d).unwrap()).unwrap()
    }

    fn total(counts: &[CategoryCount]) -> u64 {
        counts.iter().map(|c| c.value).sum()
    }

    /// Alice: a wasted apple and an expiring yogurt on June 10, a deleted
    /// carrot archived that day, and rice that expires much later.
    fn seeded() -> (Database, Uuid) {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice@x.io", Role::User);

        let apple = fixtures::food(&db, alice, "Apple", "Fruits", at(20, 12));
        db.mark_wasted(alice, apple.id, at(10, 9)).unwrap();
        fixtures::food(&db, alice, "Yogurt", "Dairy Products", at(10, 18));
        fixtures::food(&db, alice, "Rice", "Grains & Cereals", at(28, 12));
        let carrot = fixtures::food(&db, alice, "Carrot", "Vegetables", at(25, 12));
        db.archive_food(alice, carrot.id, Uuid::new_v4(), at(10, 20)).unwrap();

        (db, alice)
    }

    #[test]
    fn chart_unions_live_and_archived_records() {
        let (db, alice) = seeded();
        let counts = db.wastage_by_category(alice, &june(10)).unwrap();

        let names: Vec<_> = counts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Dairy Products", "Fruits", "Vegetables"]);
        assert_eq!(total(&counts), 3);
        assert!(db.wastage_by_category(alice, &june(11)).unwrap().is_empty());
    }

    #[test]
    fn item_both_wasted_and_expiring_counts_once() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice@x.io", Role::User);
        let fish = fixtures::food(&db, alice, "Cod", "Seafood", at(10, 8));
        db.mark_wasted(alice, fish.id, at(10, 7)).unwrap();

        let counts = db.wastage_by_category(alice, &june(10)).unwrap();
        assert_eq!(total(&counts), 1);
    }

    #[test]
    fn reset_empties_the_window_and_is_idempotent() {
        let (db, alice) = seeded();
        let bucket = june(10);

        let first = db.reset_wastage(alice, &bucket).unwrap();
        assert_eq!(first.wasted_cleared, 1);
        assert_eq!(first.expiries_moved, 1);
        assert_eq!(first.archived_cleared, 1);
        assert_eq!(first.remaining_wasted, 0);
        assert!(db.wastage_by_category(alice, &bucket).unwrap().is_empty());

        let second = db.reset_wastage(alice, &bucket).unwrap();
        assert_eq!(second.affected(), 0);
    }

    #[test]
    fn reset_moves_expiry_past_window_end() {
        let (db, alice) = seeded();
        let bucket = june(10);
        db.reset_wastage(alice, &bucket).unwrap();

        let yogurt = db
            .list_food(alice)
            .unwrap()
            .into_iter()
            .find(|f| f.name == "Yogurt")
            .unwrap();
        assert_eq!(yogurt.expiry_date, bucket.end + TimeDelta::days(1));
    }

    #[test]
    fn reset_leaves_other_windows_and_users_alone() {
        let (db, alice) = seeded();
        let bob = fixtures::user(&db, "bob@x.io", Role::User);
        let bread = fixtures::food(&db, bob, "Bread", "Grains & Cereals", at(10, 12));
        db.mark_wasted(bob, bread.id, at(10, 13)).unwrap();

        db.reset_wastage(alice, &june(10)).unwrap();

        let rice = db
            .list_food(alice)
            .unwrap()
            .into_iter()
            .find(|f| f.name == "Rice")
            .unwrap();
        assert_eq!(rice.expiry_date, at(28, 12));
        assert_eq!(total(&db.wastage_by_category(bob, &june(10)).unwrap()), 1);
    }

    #[test]
    fn reset_all_clears_flags_and_archive_without_moving_expiry() {
        let (db, alice) = seeded();

        let outcome = db.reset_all_wastage(alice).unwrap();
        assert_eq!(outcome.wasted_cleared, 1);
        assert_eq!(outcome.archived_cleared, 1);
        assert_eq!(outcome.expiries_moved, 0);

        // The yogurt still expires on the 10th
        let counts = db.wastage_by_category(alice, &june(10)).unwrap();
        assert_eq!(
            counts,
            vec![CategoryCount {
                name: "Dairy Products".into(),
                value: 1
            }]
        );
        assert_eq!(db.reset_all_wastage(alice).unwrap().affected(), 0);
    }

    #[test]
    fn breakdown_only_counts_expiry_before_now() {
        let (db, alice) = seeded();
        let bucket = june(10);

        // Before the yogurt expires, only the wasted apple counts
        let early = db.wasted_breakdown(alice, &bucket, at(10, 12)).unwrap();
        assert_eq!(
            early,
            vec![CategoryBreakdown {
                category: "Fruits".into(),
                count: 1
            }]
        );

        let late = db.wasted_breakdown(alice, &bucket, at(11, 0)).unwrap();
        assert_eq!(late.len(), 2);
    }
}
