//! SQLite conversation store.
//!
//! A session row holds the intake state and slot values; turns live in their
//! own table and are only ever appended.

use advisor_core::domain::artifact::AnalysisArtifact;
use advisor_core::domain::capability::Capability;
use advisor_core::domain::session::{Session, SessionId, Turn, TurnRole};
use advisor_core::domain::slot::SlotMap;
use advisor_core::flows::IntakeState;
use advisor_core::store::{ConversationStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, state, capability, slots_json, topic, optional_offered, pending_choice_json,
                created_at, updated_at
            FROM advisor_session
            WHERE id = ?
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let mut session = session_from_row(&row)?;
        let turns = sqlx::query(
            r#"
            SELECT role, text, capability, artifact_json, occurred_at
            FROM advisor_turn
            WHERE session_id = ?
            ORDER BY turn_number ASC
            "#,
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;
        session.history = turns.iter().map(turn_from_row).collect::<Result<_, _>>()?;

        Ok(Some(session))
    }

    async fn save_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let slots_json = serde_json::to_string(&session.slots)
            .map_err(|e| RepositoryError::Decode(format!("cannot encode slots: {e}")))?;
        let pending_keys =
            session.pending_choice.iter().map(|capability| capability.as_key()).collect::<Vec<_>>();
        let pending_choice_json = serde_json::to_string(&pending_keys)
            .map_err(|e| RepositoryError::Decode(format!("cannot encode pending choice: {e}")))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO advisor_session (
                id, state, capability, slots_json, topic, optional_offered, pending_choice_json,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                capability = excluded.capability,
                slots_json = excluded.slots_json,
                topic = excluded.topic,
                optional_offered = excluded.optional_offered,
                pending_choice_json = excluded.pending_choice_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.id.0)
        .bind(session.state.label())
        .bind(session.state.capability().map(|capability| capability.as_key()))
        .bind(slots_json)
        .bind(session.topic.as_deref())
        .bind(session.optional_offered)
        .bind(pending_choice_json)
        .bind(format_timestamp(session.created_at))
        .bind(format_timestamp(session.updated_at))
        .execute(&mut *tx)
        .await?;

        // turns are append-only; only those past the stored count are new
        let stored_turns: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM advisor_turn WHERE session_id = ?")
                .bind(&session.id.0)
                .fetch_one(&mut *tx)
                .await?;
        let first_new = usize::try_from(stored_turns).unwrap_or(0);

        for (turn_number, turn) in session.history.iter().enumerate().skip(first_new) {
            let artifact_json = turn
                .artifact
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| RepositoryError::Decode(format!("cannot encode artifact: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO advisor_turn (
                    session_id, turn_number, role, text, capability, artifact_json, occurred_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(session_id, turn_number) DO NOTHING
                "#,
            )
            .bind(&session.id.0)
            .bind(turn_number as i64)
            .bind(turn.role.as_str())
            .bind(&turn.text)
            .bind(turn.capability.map(|capability| capability.as_key()))
            .bind(artifact_json)
            .bind(format_timestamp(turn.occurred_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqlConversationStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.load_session(id).await.map_err(|error| store_error(id, error))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.save_session(session).await.map_err(|error| store_error(&session.id, error))
    }

    async fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM advisor_session WHERE updated_at < ?")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;

        debug!(
            event_name = "store.sessions_pruned",
            removed = result.rows_affected(),
            cutoff = %cutoff,
            "pruned idle sessions"
        );
        Ok(result.rows_affected())
    }
}

fn store_error(id: &SessionId, error: RepositoryError) -> StoreError {
    match error {
        RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
        RepositoryError::Decode(reason) => StoreError::Corrupt { session_id: id.0.clone(), reason },
    }
}

fn session_from_row(row: &SqliteRow) -> Result<Session, RepositoryError> {
    let id: String = row.try_get("id")?;
    let state: String = row.try_get("state")?;
    let capability: Option<String> = row.try_get("capability")?;
    let slots_json: String = row.try_get("slots_json")?;
    let pending_choice_json: String = row.try_get("pending_choice_json")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let capability = capability.map(|key| parse_capability(&key)).transpose()?;
    let slots: SlotMap = serde_json::from_str(&slots_json)
        .map_err(|e| RepositoryError::Decode(format!("invalid slots_json: {e}")))?;
    let pending_keys: Vec<String> = serde_json::from_str(&pending_choice_json)
        .map_err(|e| RepositoryError::Decode(format!("invalid pending_choice_json: {e}")))?;
    let pending_choice =
        pending_keys.iter().map(|key| parse_capability(key)).collect::<Result<Vec<_>, _>>()?;

    Ok(Session {
        id: SessionId(id),
        state: IntakeState::parse(&state, capability)
            .ok_or_else(|| RepositoryError::Decode(format!("invalid state: {state}")))?,
        slots,
        topic: row.try_get("topic")?,
        optional_offered: row.try_get("optional_offered")?,
        pending_choice,
        history: Vec::new(),
        created_at: parse_timestamp("created_at", created_at)?,
        updated_at: parse_timestamp("updated_at", updated_at)?,
    })
}

fn turn_from_row(row: &SqliteRow) -> Result<Turn, RepositoryError> {
    let role: String = row.try_get("role")?;
    let capability: Option<String> = row.try_get("capability")?;
    let artifact_json: Option<String> = row.try_get("artifact_json")?;
    let occurred_at: String = row.try_get("occurred_at")?;

    Ok(Turn {
        role: TurnRole::parse(&role)
            .ok_or_else(|| RepositoryError::Decode(format!("invalid role: {role}")))?,
        text: row.try_get("text")?,
        capability: capability.map(|key| parse_capability(&key)).transpose()?,
        artifact: artifact_json
            .map(|json| serde_json::from_str::<AnalysisArtifact>(&json))
            .transpose()
            .map_err(|e| RepositoryError::Decode(format!("invalid artifact_json: {e}")))?,
        occurred_at: parse_timestamp("occurred_at", occurred_at)?,
    })
}

fn parse_capability(key: &str) -> Result<Capability, RepositoryError> {
    Capability::from_key(key)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid capability: {key}")))
}

// fixed-width UTC so text comparison in `prune_idle` orders correctly
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}
