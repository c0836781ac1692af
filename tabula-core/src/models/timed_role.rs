//! Timed role assignments.
//!
//! One row per temporary role grant: who holds which role in which guild,
//! when the grant lapses, and how to notify once it does. Expiry times are
//! unix seconds so the scheduler can compare them with a single integer
//! filter.

use crate::db::{Column, Executor, Filter, Model, Op, Order, Record, TableSchema, Value};
use crate::error::{Error, Result};
use chrono::Utc;

/// Table name for timed role grants.
pub const TABLE: &str = "timed_roles";

/// Schema for the `timed_roles` table.
pub fn model() -> Model {
    Model::new(TableSchema::new(
        TABLE,
        vec![
            Column::integer("id").primary_key().autoincrement(),
            Column::integer("guild_id").not_null(),
            Column::integer("user_id").not_null(),
            Column::integer("role_id").not_null(),
            Column::integer("expires_at").not_null(),
            Column::integer("added_by").not_null(),
            Column::text("reason"),
            Column::integer("auto_remove").default_value(1),
            Column::integer("notify_user").default_value(1),
            Column::integer("notify_channel_id"),
            // Comma-separated role ids to ping on expiry
            Column::text("notify_role_ids"),
        ],
    ))
}

/// A new grant to record. `duration_secs` is relative; the stored
/// `expires_at` is computed at insert time.
#[derive(Debug, Clone)]
pub struct NewTimedRole {
    pub guild_id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub duration_secs: i64,
    pub added_by: i64,
    pub reason: Option<String>,
    pub auto_remove: bool,
    pub notify_user: bool,
    pub notify_channel_id: Option<i64>,
    pub notify_role_ids: Vec<i64>,
}

impl NewTimedRole {
    pub fn new(guild_id: i64, user_id: i64, role_id: i64, duration_secs: i64, added_by: i64) -> Self {
        Self {
            guild_id,
            user_id,
            role_id,
            duration_secs,
            added_by,
            reason: None,
            auto_remove: true,
            notify_user: true,
            notify_channel_id: None,
            notify_role_ids: Vec::new(),
        }
    }
}

/// Typed operations over the timed role table.
#[derive(Debug, Clone)]
pub struct TimedRoles {
    model: Model,
}

impl Default for TimedRoles {
    fn default() -> Self {
        Self::new()
    }
}

impl TimedRoles {
    pub fn new() -> Self {
        Self { model: model() }
    }

    /// The underlying model, for registration.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Records a grant and returns its row id.
    pub fn add(&self, exec: &impl Executor, grant: &NewTimedRole) -> Result<i64> {
        let expires_at = Utc::now().timestamp() + grant.duration_secs;

        let notify_role_ids = if grant.notify_role_ids.is_empty() {
            Value::Null
        } else {
            let joined = grant
                .notify_role_ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            Value::from(joined)
        };

        let data = Record::new()
            .with("guild_id", grant.guild_id)
            .with("user_id", grant.user_id)
            .with("role_id", grant.role_id)
            .with("expires_at", expires_at)
            .with("added_by", grant.added_by)
            .with("reason", grant.reason.clone())
            .with("auto_remove", grant.auto_remove)
            .with("notify_user", grant.notify_user)
            .with("notify_channel_id", grant.notify_channel_id)
            .with("notify_role_ids", notify_role_ids);

        let key = self.model.create(exec, &data)?;
        key.as_i64()
            .ok_or_else(|| Error::Query("engine returned a non-integer row id".to_string()))
    }

    /// Grants whose expiry is at or before `now` (unix seconds).
    pub fn expired(&self, exec: &impl Executor, now: i64) -> Result<Vec<Record>> {
        self.model
            .find(exec, &Filter::new().cmp("expires_at", Op::Le, now))
    }

    /// A user's still-active grants, soonest expiry first.
    pub fn active_for_user(
        &self,
        exec: &impl Executor,
        user_id: i64,
        now: i64,
    ) -> Result<Vec<Record>> {
        self.model.find(
            exec,
            &Filter::new()
                .eq("user_id", user_id)
                .cmp("expires_at", Op::Gt, now)
                .order_by("expires_at", Order::Asc),
        )
    }

    /// Drops a grant record by row id.
    pub fn remove(&self, exec: &impl Executor, id: i64) -> Result<usize> {
        self.model.delete(exec, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> (Database, TimedRoles) {
        let db = Database::open_in_memory().unwrap();
        let roles = TimedRoles::new();
        roles.model().create_table(&db).unwrap();
        (db, roles)
    }

    #[test]
    fn add_populates_defaults() {
        let (db, roles) = setup();
        let id = roles
            .add(&db, &NewTimedRole::new(1, 10, 100, 3600, 7))
            .unwrap();

        let record = roles.model().get_by_id(&db, id).unwrap().unwrap();
        assert_eq!(record.get("guild_id"), Some(&Value::Integer(1)));
        assert_eq!(record.get("auto_remove").unwrap().as_bool(), Some(true));
        assert_eq!(record.get("reason"), Some(&Value::Null));
        assert_eq!(record.get("notify_role_ids"), Some(&Value::Null));
        assert!(record.get("expires_at").unwrap().as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn notify_role_ids_join() {
        let (db, roles) = setup();
        let mut grant = NewTimedRole::new(1, 10, 100, 60, 7);
        grant.notify_role_ids = vec![5, 6, 7];
        let id = roles.add(&db, &grant).unwrap();

        let record = roles.model().get_by_id(&db, id).unwrap().unwrap();
        assert_eq!(
            record.get("notify_role_ids").unwrap().as_str(),
            Some("5,6,7")
        );
    }

    #[test]
    fn expired_and_active_split_on_now() {
        let (db, roles) = setup();
        // One grant already lapsed, one still running.
        roles
            .add(&db, &NewTimedRole::new(1, 10, 100, -60, 7))
            .unwrap();
        let active_id = roles
            .add(&db, &NewTimedRole::new(1, 10, 101, 3600, 7))
            .unwrap();

        let now = Utc::now().timestamp();
        let expired = roles.expired(&db, now).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].get("role_id"), Some(&Value::Integer(100)));

        let active = roles.active_for_user(&db, 10, now).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].get("id").unwrap().as_i64(), Some(active_id));
    }

    #[test]
    fn active_grants_sorted_by_expiry() {
        let (db, roles) = setup();
        roles
            .add(&db, &NewTimedRole::new(1, 10, 100, 7200, 7))
            .unwrap();
        roles
            .add(&db, &NewTimedRole::new(1, 10, 101, 3600, 7))
            .unwrap();
        roles
            .add(&db, &NewTimedRole::new(1, 99, 102, 60, 7))
            .unwrap();

        let now = Utc::now().timestamp();
        let active = roles.active_for_user(&db, 10, now).unwrap();
        let role_ids: Vec<_> = active
            .iter()
            .map(|r| r.get("role_id").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(role_ids, vec![101, 100]);
    }

    #[test]
    fn remove_is_noop_on_missing_id() {
        let (db, roles) = setup();
        let id = roles
            .add(&db, &NewTimedRole::new(1, 10, 100, 60, 7))
            .unwrap();
        assert_eq!(roles.remove(&db, id).unwrap(), 1);
        assert_eq!(roles.remove(&db, id).unwrap(), 0);
    }
}
