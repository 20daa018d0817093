use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use larder_types::api::CategoryCount;
use larder_types::bucket::Bucket;
use larder_types::models::FoodItem;

use super::OptionalExt;
use crate::Database;
use crate::codec::{count, get_id, get_ts, get_ts_opt, ts, ts_opt};
use crate::models::FoodTotals;

pub(crate) const FOOD_COLUMNS: &str =
    "id, user_id, name, category, shelf_life, m_date, expiry_date, is_wasted, wasted_at, created_at";

impl Database {
    pub fn insert_food(&self, item: &FoodItem) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO food_items
                    (id, user_id, name, category, shelf_life, m_date, expiry_date, is_wasted, wasted_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    item.id.to_string(),
                    item.user_id.to_string(),
                    item.name,
                    item.category,
                    item.shelf_life,
                    ts(item.m_date),
                    ts(item.expiry_date),
                    item.is_wasted,
                    ts_opt(item.wasted_at),
                    ts(item.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_food(&self, user_id: Uuid) -> Result<Vec<FoodItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FOOD_COLUMNS} FROM food_items WHERE user_id = ?1 ORDER BY expiry_date, rowid"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], map_food)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_food(&self, user_id: Uuid, id: Uuid) -> Result<Option<FoodItem>> {
        self.with_conn(|conn| query_food(conn, user_id, id))
    }

    /// Overwrite the editable fields of an item owned by `item.user_id`.
    pub fn update_food(&self, item: &FoodItem) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE food_items
                 SET name = ?3, category = ?4, shelf_life = ?5, m_date = ?6, expiry_date = ?7
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![
                    item.id.to_string(),
                    item.user_id.to_string(),
                    item.name,
                    item.category,
                    item.shelf_life,
                    ts(item.m_date),
                    ts(item.expiry_date),
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn mark_wasted(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<Option<FoodItem>> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE food_items SET is_wasted = 1, wasted_at = ?3 WHERE id = ?1 AND user_id = ?2",
                (id.to_string(), user_id.to_string(), ts(at)),
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_food(conn, user_id, id)
        })
    }

    /// Move a live item into `deleted_food_items`. Snapshot and removal
    /// happen in one transaction.
    pub fn archive_food(
        &self,
        user_id: Uuid,
        id: Uuid,
        archive_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<Option<FoodItem>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(item) = query_food(&tx, user_id, id)? else {
                return Ok(None);
            };

            tx.execute(
                "INSERT INTO deleted_food_items
                    (id, original_id, user_id, name, category, was_wasted, wasted_at, expiry_date, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    archive_id.to_string(),
                    item.id.to_string(),
                    item.user_id.to_string(),
                    item.name,
                    item.category,
                    item.is_wasted,
                    ts_opt(item.wasted_at),
                    ts(item.expiry_date),
                    ts(deleted_at),
                ],
            )?;
            tx.execute("DELETE FROM food_items WHERE id = ?1", [id.to_string()])?;
            tx.commit()?;

            Ok(Some(item))
        })
    }

    pub fn food_totals(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<FoodTotals> {
        self.with_conn(|conn| {
            let uid = user_id.to_string();
            let (total, wasted, expired): (i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(is_wasted), 0),
                        COALESCE(SUM(CASE WHEN is_wasted = 0 AND expiry_date < ?2 THEN 1 ELSE 0 END), 0)
                 FROM food_items WHERE user_id = ?1",
                (&uid, ts(now)),
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;
            let deleted_wasted: i64 = conn.query_row(
                "SELECT COUNT(*) FROM deleted_food_items WHERE user_id = ?1 AND was_wasted = 1",
                [&uid],
                |r| r.get(0),
            )?;

            Ok(FoodTotals {
                total: count(total),
                explicitly_wasted: count(wasted),
                expired: count(expired),
                deleted_wasted: count(deleted_wasted),
            })
        })
    }

    /// Live items flagged as wasted with `wasted_at` in `[start, end)`.
    pub fn count_wasted_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM food_items
                 WHERE user_id = ?1 AND is_wasted = 1 AND wasted_at >= ?2 AND wasted_at < ?3",
                (user_id.to_string(), ts(start), ts(end)),
                |r| r.get(0),
            )?;
            Ok(count(n))
        })
    }

    /// Category counts of items that were in stock at some point of the
    /// window: manufactured by its end and either unexpired at its start or
    /// marked wasted.
    pub fn inventory_by_category(&self, user_id: Uuid, bucket: &Bucket) -> Result<Vec<CategoryCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) FROM food_items
                 WHERE user_id = ?1 AND m_date <= ?3 AND (expiry_date >= ?2 OR is_wasted = 1)
                 GROUP BY category ORDER BY category",
            )?;
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
}

fn query_food(conn: &Connection, user_id: Uuid, id: Uuid) -> Result<Option<FoodItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FOOD_COLUMNS} FROM food_items WHERE id = ?1 AND user_id = ?2"
    ))?;
    stmt.query_row((id.to_string(), user_id.to_string()), map_food)
        .optional()
}

pub(crate) fn map_food(row: &Row<'_>) -> rusqlite::Result<FoodItem> {
    Ok(FoodItem {
        id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        shelf_life: row.get(4)?,
        m_date: get_ts(row, 5)?,
        expiry_date: get_ts(row, 6)?,
        is_wasted: row.get(7)?,
        wasted_at: get_ts_opt(row, 8)?,
        created_at: get_ts(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use larder_types::bucket::BucketMode;
    use larder_types::models::Role;

    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn items_are_scoped_to_their_owner() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice@x.io", Role::User);
        let bob = fixtures::user(&db, "bob@x.io", Role::User);
        let item = fixtures::food(&db, alice, "Milk", "Dairy Products", crate::now());

        assert!(db.get_food(bob, item.id).unwrap().is_none());
        assert!(db.mark_wasted(bob, item.id, crate::now()).unwrap().is_none());
        assert_eq!(db.list_food(alice).unwrap(), vec![item]);
    }

    #[test]
    fn archive_moves_item_and_keeps_snapshot() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice@x.io", Role::User);
        let item = fixtures::food(&db, alice, "Kale", "Vegetables", crate::now());
        db.mark_wasted(alice, item.id, crate::now()).unwrap();

        let archived = db
            .archive_food(alice, item.id, Uuid::new_v4(), crate::now())
            .unwrap()
            .unwrap();
        assert!(archived.is_wasted);
        assert!(db.list_food(alice).unwrap().is_empty());

        let totals = db.food_totals(alice, crate::now()).unwrap();
        assert_eq!(totals.total, 0);
        assert_eq!(totals.deleted_wasted, 1);

        // Second delete finds nothing
        assert!(db.archive_food(alice, item.id, Uuid::new_v4(), crate::now()).unwrap().is_none());
    }

    #[test]
    fn totals_split_wasted_and_expired() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice@x.io", Role::User);
        let now = crate::now();
        let wasted = fixtures::food(&db, alice, "Bread", "Grains & Cereals", now + TimeDelta::days(2));
        fixtures::food(&db, alice, "Yogurt", "Dairy Products", now - TimeDelta::days(1));
        fixtures::food(&db, alice, "Rice", "Grains & Cereals", now + TimeDelta::days(90));
        db.mark_wasted(alice, wasted.id, now).unwrap();

        let totals = db.food_totals(alice, now).unwrap();
        assert_eq!(
            totals,
            FoodTotals {
                total: 3,
                explicitly_wasted: 1,
                expired: 1,
                deleted_wasted: 0
            }
        );
    }

    #[test]
    fn inventory_counts_items_in_stock_during_window() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice@x.io", Role::User);
        let now = crate::now();
        fixtures::food(&db, alice, "Apple", "Fruits", now + TimeDelta::days(3));
        fixtures::food(&db, alice, "Pear", "Fruits", now + TimeDelta::days(4));
        // Expired long before the window starts
        fixtures::food(&db, alice, "Old milk", "Dairy Products", now - TimeDelta::days(40));

        let bucket = Bucket::resolve(BucketMode::Day, now.date_naive()).unwrap();
        let counts = db.inventory_by_category(alice, &bucket).unwrap();
        assert_eq!(
            counts,
            vec![CategoryCount {
                name: "Fruits".into(),
                value: 2
            }]
        );
    }
}
