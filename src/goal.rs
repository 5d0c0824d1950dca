//! Savings goals and contributions towards them.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::GoalId,
    db::{get_optional_timestamp, lock_connection, require_text, to_millis, validate_amount},
};

/// A savings target.
///
/// The current amount may exceed the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: GoalId,
    pub title: String,
    pub target_amount: f64,
    pub current_amount: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub created_by: Option<String>,
}

impl Goal {
    /// The fraction of the target saved so far, `None` for a zero target.
    pub fn progress(&self) -> Option<f64> {
        (self.target_amount > 0.0).then(|| self.current_amount / self.target_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub created_by: Option<String>,
}

/// A goal along with its progress, as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress: Option<f64>,
}

impl From<Goal> for GoalProgress {
    fn from(goal: Goal) -> Self {
        Self {
            progress: goal.progress(),
            goal,
        }
    }
}

const GOAL_COLUMNS: &str = "id, title, target_amount, current_amount, due_date, created_by";

pub fn create_goal(goal: NewGoal, connection: &Connection) -> Result<Goal, Error> {
    let title = require_text(&goal.title, "title")?;
    let target_amount = validate_amount(goal.target_amount)?;
    let current_amount = validate_amount(goal.current_amount)?;

    let goal = connection
        .prepare(&format!(
            "INSERT INTO goal (title, target_amount, current_amount, due_date, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {GOAL_COLUMNS}"
        ))?
        .query_row(
            (
                title,
                target_amount,
                current_amount,
                goal.due_date.map(to_millis),
                goal.created_by,
            ),
            map_goal_row,
        )?;

    Ok(goal)
}

/// Get all goals, soonest due first. Goals without a due date come last.
pub fn get_goals(connection: &Connection) -> Result<Vec<Goal>, Error> {
    connection
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goal ORDER BY due_date IS NULL, due_date ASC, id ASC"
        ))?
        .query_map([], map_goal_row)?
        .map(|maybe_goal| maybe_goal.map_err(Error::from))
        .collect()
}

/// Add `amount` to the current amount of a goal.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if `amount` is negative or not a finite number,
/// - [Error::UpdateMissingGoal] if there is no goal with `id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn contribute_to_goal(id: GoalId, amount: f64, connection: &Connection) -> Result<Goal, Error> {
    let amount = validate_amount(amount)?;

    connection
        .prepare(&format!(
            "UPDATE goal SET current_amount = current_amount + ?1 WHERE id = ?2
             RETURNING {GOAL_COLUMNS}"
        ))?
        .query_row((amount, id), map_goal_row)
        .optional()?
        .ok_or(Error::UpdateMissingGoal)
}

/// Delete a goal by ID. Returns an error if the goal doesn't exist.
pub fn delete_goal(id: GoalId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM goal WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingGoal);
    }

    Ok(())
}

pub fn create_goal_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS goal (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            target_amount REAL NOT NULL CHECK (target_amount >= 0),
            current_amount REAL NOT NULL DEFAULT 0 CHECK (current_amount >= 0),
            due_date INTEGER,
            created_by TEXT
        )",
        (),
    )?;

    Ok(())
}

fn map_goal_row(row: &Row) -> Result<Goal, rusqlite::Error> {
    Ok(Goal {
        id: row.get(0)?,
        title: row.get(1)?,
        target_amount: row.get(2)?,
        current_amount: row.get(3)?,
        due_date: get_optional_timestamp(row, 4)?,
        created_by: row.get(5)?,
    })
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct GoalState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GoalState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContributionForm {
    pub amount: f64,
}

pub async fn create_goal_endpoint(
    State(state): State<GoalState>,
    Json(new_goal): Json<NewGoal>,
) -> Result<(StatusCode, Json<GoalProgress>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let goal = create_goal(new_goal, &connection)?;
    tracing::info!("Created goal {} \"{}\"", goal.id, goal.title);

    Ok((StatusCode::CREATED, Json(goal.into())))
}

pub async fn get_goals_endpoint(
    State(state): State<GoalState>,
) -> Result<Json<Vec<GoalProgress>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let goals = get_goals(&connection)?;

    Ok(Json(goals.into_iter().map(GoalProgress::from).collect()))
}

pub async fn contribute_to_goal_endpoint(
    State(state): State<GoalState>,
    Path(goal_id): Path<GoalId>,
    Json(form): Json<ContributionForm>,
) -> Result<Json<GoalProgress>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let goal = contribute_to_goal(goal_id, form.amount, &connection)?;
    tracing::info!("Added {} to goal {goal_id}", form.amount);

    Ok(Json(goal.into()))
}

pub async fn delete_goal_endpoint(
    State(state): State<GoalState>,
    Path(goal_id): Path<GoalId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_goal(goal_id, &connection)?;
    tracing::info!("Deleted goal {goal_id}");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{Error, test_utils::get_test_connection};

    use super::{NewGoal, contribute_to_goal, create_goal, delete_goal, get_goals};

    fn new_goal(title: &str, target_amount: f64) -> NewGoal {
        NewGoal {
            title: title.to_owned(),
            target_amount,
            current_amount: 0.0,
            due_date: None,
            created_by: None,
        }
    }

    #[test]
    fn contributions_accumulate() {
        let conn = get_test_connection();
        let goal = create_goal(new_goal("Cold room", 50_000.0), &conn).unwrap();

        contribute_to_goal(goal.id, 10_000.0, &conn).unwrap();
        let goal = contribute_to_goal(goal.id, 2_500.0, &conn).unwrap();

        assert_eq!(goal.current_amount, 12_500.0);
        assert_eq!(goal.progress(), Some(0.25));
    }

    #[test]
    fn current_amount_may_exceed_target() {
        let conn = get_test_connection();
        let goal = create_goal(new_goal("Seed fund", 100.0), &conn).unwrap();

        let goal = contribute_to_goal(goal.id, 150.0, &conn).unwrap();

        assert_eq!(goal.progress(), Some(1.5));
    }

    #[test]
    fn zero_target_has_no_progress() {
        let conn = get_test_connection();

        let goal = create_goal(new_goal("Someday", 0.0), &conn).unwrap();

        assert_eq!(goal.progress(), None);
    }

    #[test]
    fn contributing_to_missing_goal_fails() {
        let conn = get_test_connection();

        assert_eq!(
            contribute_to_goal(9, 10.0, &conn),
            Err(Error::UpdateMissingGoal)
        );
    }

    #[test]
    fn negative_contribution_is_rejected() {
        let conn = get_test_connection();
        let goal = create_goal(new_goal("Cold room", 50_000.0), &conn).unwrap();

        assert_eq!(
            contribute_to_goal(goal.id, -1.0, &conn),
            Err(Error::InvalidAmount(-1.0))
        );
    }

    #[test]
    fn goals_are_sorted_by_due_date() {
        let conn = get_test_connection();
        create_goal(new_goal("No date", 10.0), &conn).unwrap();
        create_goal(
            NewGoal {
                due_date: Some(datetime!(2026-01-01 00:00 UTC)),
                ..new_goal("Later", 10.0)
            },
            &conn,
        )
        .unwrap();
        create_goal(
            NewGoal {
                due_date: Some(datetime!(2025-09-01 00:00 UTC)),
                ..new_goal("Sooner", 10.0)
            },
            &conn,
        )
        .unwrap();

        let titles: Vec<String> = get_goals(&conn)
            .unwrap()
            .into_iter()
            .map(|goal| goal.title)
            .collect();

        assert_eq!(titles, vec!["Sooner", "Later", "No date"]);
    }

    #[test]
    fn delete_missing_goal_fails() {
        let conn = get_test_connection();

        assert_eq!(delete_goal(1, &conn), Err(Error::DeleteMissingGoal));
    }
}

#[cfg(test)]
mod goal_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::get_test_server,
    };

    #[tokio::test]
    async fn contribute_updates_progress() {
        let (server, _) = get_test_server();
        let created = server
            .post(endpoints::GOALS)
            .json(&json!({ "title": "Greenhouse", "targetAmount": 2000.0 }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<Value>()["id"].as_i64().unwrap();

        let response = server
            .post(&format_endpoint(endpoints::GOAL_CONTRIBUTE, id))
            .json(&json!({ "amount": 500.0 }))
            .await;

        response.assert_status_ok();
        response.assert_json_contains(&json!({
            "currentAmount": 500.0,
            "progress": 0.25,
        }));
    }

    #[tokio::test]
    async fn list_then_delete() {
        let (server, _) = get_test_server();
        let id = server
            .post(endpoints::GOALS)
            .json(&json!({ "title": "Greenhouse", "targetAmount": 2000.0 }))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();

        let goals = server.get(endpoints::GOALS).await.json::<Vec<Value>>();
        assert_eq!(goals.len(), 1);

        server
            .delete(&format_endpoint(endpoints::GOAL, id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let goals = server.get(endpoints::GOALS).await.json::<Vec<Value>>();
        assert!(goals.is_empty());
    }
}
