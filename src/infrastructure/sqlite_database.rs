use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::{CommentId, FriendshipId, IdeaId, MessageId, UserId, VoteId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{
    DatabaseInterface, DatabaseTransaction, IdeaQuery, IdeaSort, VoteTable, VoteTally,
};
use crate::infrastructure::schema::CREATE_SCHEMA;
use crate::models::{
    Comment, FriendStatus, Friendship, Idea, IdeaStatus, Message, PrincipalDecision,
    PrincipalStatus, Profile, SocialPlatform, TeacherReview, UserRole, VoteRecord, VoteType,
};

/// SQLite implementation of the database interface
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (creating if missing) the database behind a `sqlite:` url and apply the schema.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid DATABASE_URL {}: {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e)))?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Private in-memory database. One pinned connection, since every new SQLite memory
    /// connection would otherwise see an empty database.
    pub async fn new_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::DatabaseError(format!("Invalid in-memory url: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    pub async fn initialize(&self) -> AppResult<()> {
        for statement in CREATE_SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Failed to apply schema", e))?;
        }
        Ok(())
    }

    pub fn pool_stats(&self) -> (u32, u32) {
        (self.pool.num_idle() as u32, self.pool.size())
    }
}

fn db_error(context: &str, err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::Conflict(format!("{}: {}", context, db_err.message()));
        }
    }
    AppError::DatabaseError(format!("{}: {}", context, err))
}

fn parse_column<T>(row: &SqliteRow, column: &str) -> AppResult<T>
where
    T: FromStr<Err = AppError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
}

fn parse_optional_column<T>(row: &SqliteRow, column: &str) -> AppResult<Option<T>>
where
    T: FromStr<Err = AppError>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse()).transpose()
}

fn map_profile(row: &SqliteRow) -> AppResult<Profile> {
    Ok(Profile {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        role: parse_column(row, "role")?,
        avatar_url: row.try_get("avatar_url")?,
        instagram: row.try_get("instagram")?,
        tiktok: row.try_get("tiktok")?,
        reputation: row.try_get("reputation")?,
        join_date: row.try_get("join_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_idea(row: &SqliteRow) -> AppResult<Idea> {
    Ok(Idea {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        author_id: row.try_get("author_id")?,
        category: parse_column(row, "category")?,
        votes: row.try_get("votes")?,
        comment_count: row.try_get("comment_count")?,
        status: parse_column(row, "status")?,
        teacher_notes: row.try_get("teacher_notes")?,
        reviewed_by: row.try_get("reviewed_by")?,
        forwarded_date: row.try_get("forwarded_date")?,
        principal_status: parse_optional_column(row, "principal_status")?,
        principal_notes: row.try_get("principal_notes")?,
        budget: row.try_get("budget")?,
        priority: parse_optional_column(row, "priority")?,
        implementation_date: row.try_get("implementation_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_vote(row: &SqliteRow) -> AppResult<VoteRecord> {
    Ok(VoteRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        subject_id: row.try_get("subject_id")?,
        vote_type: parse_column(row, "vote_type")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_comment(row: &SqliteRow) -> AppResult<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        idea_id: row.try_get("idea_id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        parent_id: row.try_get("parent_id")?,
        votes: row.try_get("votes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_friendship(row: &SqliteRow) -> AppResult<Friendship> {
    Ok(Friendship {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        friend_id: row.try_get("friend_id")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_message(row: &SqliteRow) -> AppResult<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        recipient_id: row.try_get("recipient_id")?,
        content: row.try_get("content")?,
        read: row.try_get("read")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_rows<T>(rows: Vec<SqliteRow>, map: fn(&SqliteRow) -> AppResult<T>) -> AppResult<Vec<T>> {
    rows.iter().map(map).collect()
}

#[async_trait]
impl DatabaseInterface for SqliteDatabase {
    async fn begin_transaction(&self) -> AppResult<DatabaseTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;
        Ok(DatabaseTransaction::new_sqlite(tx))
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Database health check failed", e))?;
        Ok(())
    }

    async fn create_profile(&self, profile: &Profile) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, username, full_name, role, avatar_url, instagram, tiktok, reputation,
                join_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(profile.role.as_str())
        .bind(&profile.avatar_url)
        .bind(&profile.instagram)
        .bind(&profile.tiktok)
        .bind(profile.reputation)
        .bind(profile.join_date)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to create profile {}", profile.username), e))?;
        Ok(())
    }

    async fn get_profile(&self, id: UserId) -> AppResult<Option<Profile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to get profile {}", id), e))?;
        row.as_ref().map(map_profile).transpose()
    }

    async fn get_profile_by_username(&self, username: &str) -> AppResult<Option<Profile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to look up username", e))?;
        row.as_ref().map(map_profile).transpose()
    }

    async fn list_profiles(&self) -> AppResult<Vec<Profile>> {
        let rows = sqlx::query("SELECT * FROM profiles ORDER BY created_at DESC, rowid DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list profiles", e))?;
        map_rows(rows, map_profile)
    }

    async fn update_profile_names(
        &self,
        id: UserId,
        full_name: Option<&str>,
        username: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET full_name = ?, username = ?, updated_at = ? WHERE id = ?",
        )
        .bind(full_name)
        .bind(username)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to update profile {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_profile_role(
        &self,
        id: UserId,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query("UPDATE profiles SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to update role of {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_social_link(
        &self,
        id: UserId,
        platform: SocialPlatform,
        handle: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        // Column name comes from the enum, never from input
        let sql = format!(
            "UPDATE profiles SET {} = ?, updated_at = ? WHERE id = ?",
            platform.as_str()
        );
        let result = sqlx::query(&sql)
            .bind(handle)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to update {} link of {}", platform, id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_profile_tx(&self, tx: &mut DatabaseTransaction, id: UserId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(id)
            .execute(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error(&format!("Failed to delete profile {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_idea(&self, idea: &Idea) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO ideas (id, title, description, author_id, category, votes, comment_count, status,
                teacher_notes, reviewed_by, forwarded_date, principal_status, principal_notes, budget,
                priority, implementation_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(idea.id)
        .bind(&idea.title)
        .bind(&idea.description)
        .bind(idea.author_id)
        .bind(idea.category.as_str())
        .bind(idea.votes)
        .bind(idea.comment_count)
        .bind(idea.status.as_str())
        .bind(&idea.teacher_notes)
        .bind(idea.reviewed_by)
        .bind(idea.forwarded_date)
        .bind(idea.principal_status.map(|s| s.as_str()))
        .bind(&idea.principal_notes)
        .bind(idea.budget)
        .bind(idea.priority.map(|p| p.as_str()))
        .bind(idea.implementation_date)
        .bind(idea.created_at)
        .bind(idea.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to create idea {}", idea.id), e))?;
        Ok(())
    }

    async fn get_idea(&self, id: IdeaId) -> AppResult<Option<Idea>> {
        let row = sqlx::query("SELECT * FROM ideas WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to get idea {}", id), e))?;
        row.as_ref().map(map_idea).transpose()
    }

    async fn list_ideas(&self, query: &IdeaQuery) -> AppResult<Vec<Idea>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM ideas WHERE 1 = 1");

        if let Some(category) = query.category {
            qb.push(" AND category = ");
            qb.push_bind(category.as_str());
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }

        qb.push(match query.sort {
            IdeaSort::Recent => " ORDER BY created_at DESC, rowid DESC",
            IdeaSort::Popular => " ORDER BY votes DESC, created_at DESC, rowid DESC",
            IdeaSort::Comments => " ORDER BY comment_count DESC, created_at DESC, rowid DESC",
        });

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list ideas", e))?;
        map_rows(rows, map_idea)
    }

    async fn count_ideas_by_status(&self) -> AppResult<HashMap<IdeaStatus, i64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS total FROM ideas GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count ideas", e))?;

        let mut counts = HashMap::new();
        for row in &rows {
            let status: IdeaStatus = parse_column(row, "status")?;
            counts.insert(status, row.try_get::<i64, _>("total")?);
        }
        Ok(counts)
    }

    async fn apply_teacher_review(
        &self,
        id: IdeaId,
        expected: IdeaStatus,
        review: &TeacherReview,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE ideas SET
                status = ?,
                teacher_notes = COALESCE(?, teacher_notes),
                reviewed_by = ?,
                forwarded_date = COALESCE(?, forwarded_date),
                principal_status = COALESCE(?, principal_status),
                updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(review.status.as_str())
        .bind(&review.teacher_notes)
        .bind(review.reviewed_by)
        .bind(review.forwarded_date)
        .bind(review.principal_status.map(|s| s.as_str()))
        .bind(review.updated_at)
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to review idea {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_principal_decision(
        &self,
        id: IdeaId,
        expected: Option<PrincipalStatus>,
        decision: &PrincipalDecision,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE ideas SET
                principal_status = ?,
                principal_notes = ?,
                budget = COALESCE(?, budget),
                priority = COALESCE(?, priority),
                implementation_date = COALESCE(?, implementation_date),
                updated_at = ?
             WHERE id = ? AND status = 'forwarded' AND principal_status IS ?",
        )
        .bind(decision.principal_status.as_str())
        .bind(&decision.principal_notes)
        .bind(decision.budget)
        .bind(decision.priority.map(|p| p.as_str()))
        .bind(decision.implementation_date)
        .bind(decision.updated_at)
        .bind(id)
        .bind(expected.map(|s| s.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to record decision on idea {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_idea(&self, id: IdeaId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM ideas WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to delete idea {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn vote_counter_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
    ) -> AppResult<Option<i64>> {
        let sql = format!("SELECT votes FROM {} WHERE id = ?", table.counter_table());
        let row = sqlx::query(&sql)
            .bind(subject_id)
            .fetch_optional(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to read vote counter", e))?;
        Ok(row.map(|r| r.try_get::<i64, _>("votes")).transpose()?)
    }

    async fn find_vote_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
        user_id: UserId,
    ) -> AppResult<Option<VoteRecord>> {
        let sql = format!(
            "SELECT id, user_id, {col} AS subject_id, vote_type, created_at FROM {table}
             WHERE {col} = ? AND user_id = ?",
            col = table.subject_column(),
            table = table.table(),
        );
        let row = sqlx::query(&sql)
            .bind(subject_id)
            .bind(user_id)
            .fetch_optional(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to look up vote", e))?;
        row.as_ref().map(map_vote).transpose()
    }

    async fn insert_vote_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        vote: &VoteRecord,
    ) -> AppResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, user_id, {}, vote_type, created_at) VALUES (?, ?, ?, ?, ?)",
            table.table(),
            table.subject_column(),
        );
        sqlx::query(&sql)
            .bind(vote.id)
            .bind(vote.user_id)
            .bind(vote.subject_id)
            .bind(vote.vote_type.as_str())
            .bind(vote.created_at)
            .execute(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to insert vote", e))?;
        Ok(())
    }

    async fn update_vote_type_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        id: VoteId,
        vote_type: VoteType,
    ) -> AppResult<()> {
        let sql = format!("UPDATE {} SET vote_type = ? WHERE id = ?", table.table());
        sqlx::query(&sql)
            .bind(vote_type.as_str())
            .bind(id)
            .execute(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to switch vote", e))?;
        Ok(())
    }

    async fn delete_vote_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        id: VoteId,
    ) -> AppResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", table.table());
        sqlx::query(&sql)
            .bind(id)
            .execute(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to remove vote", e))?;
        Ok(())
    }

    async fn adjust_vote_counter_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
        delta: i64,
    ) -> AppResult<i64> {
        let sql = format!(
            "UPDATE {} SET votes = votes + ? WHERE id = ? RETURNING votes",
            table.counter_table()
        );
        let row = sqlx::query(&sql)
            .bind(delta)
            .bind(subject_id)
            .fetch_optional(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to adjust vote counter", e))?;
        match row {
            Some(row) => Ok(row.try_get("votes")?),
            None => Err(AppError::NotFound(format!(
                "{} row {} not found",
                table.counter_table(),
                subject_id
            ))),
        }
    }

    async fn tally_votes_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
    ) -> AppResult<VoteTally> {
        let sql = format!(
            "SELECT
                COALESCE(SUM(CASE WHEN vote_type = 'up' THEN 1 ELSE 0 END), 0) AS up,
                COALESCE(SUM(CASE WHEN vote_type = 'down' THEN 1 ELSE 0 END), 0) AS down
             FROM {} WHERE {} = ?",
            table.table(),
            table.subject_column(),
        );
        let row = sqlx::query(&sql)
            .bind(subject_id)
            .fetch_one(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to tally votes", e))?;
        Ok(VoteTally {
            up: row.try_get("up")?,
            down: row.try_get("down")?,
        })
    }

    async fn set_vote_counter_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        subject_id: Uuid,
        votes: i64,
    ) -> AppResult<()> {
        let sql = format!("UPDATE {} SET votes = ? WHERE id = ?", table.counter_table());
        sqlx::query(&sql)
            .bind(votes)
            .bind(subject_id)
            .execute(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to store vote counter", e))?;
        Ok(())
    }

    async fn voted_subjects_tx(
        &self,
        tx: &mut DatabaseTransaction,
        table: VoteTable,
        user_id: UserId,
    ) -> AppResult<Vec<Uuid>> {
        let sql = format!(
            "SELECT {} AS subject_id FROM {} WHERE user_id = ?",
            table.subject_column(),
            table.table(),
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to list voted subjects", e))?;
        rows.iter()
            .map(|row| Ok(row.try_get::<Uuid, _>("subject_id")?))
            .collect()
    }

    async fn list_votes(&self, table: VoteTable, subject_id: Uuid) -> AppResult<Vec<VoteRecord>> {
        let sql = format!(
            "SELECT id, user_id, {col} AS subject_id, vote_type, created_at FROM {table}
             WHERE {col} = ? ORDER BY created_at, rowid",
            col = table.subject_column(),
            table = table.table(),
        );
        let rows = sqlx::query(&sql)
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list votes", e))?;
        map_rows(rows, map_vote)
    }

    async fn list_user_votes(
        &self,
        table: VoteTable,
        user_id: UserId,
    ) -> AppResult<HashMap<Uuid, VoteType>> {
        let sql = format!(
            "SELECT {} AS subject_id, vote_type FROM {} WHERE user_id = ?",
            table.subject_column(),
            table.table(),
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list user votes", e))?;

        let mut votes = HashMap::with_capacity(rows.len());
        for row in &rows {
            let subject_id: Uuid = row.try_get("subject_id")?;
            votes.insert(subject_id, parse_column(row, "vote_type")?);
        }
        Ok(votes)
    }

    async fn insert_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        comment: &Comment,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO comments (id, idea_id, author_id, content, parent_id, votes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(comment.id)
        .bind(comment.idea_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(comment.parent_id)
        .bind(comment.votes)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(tx.as_sqlite_mut())
        .await
        .map_err(|e| db_error("Failed to insert comment", e))?;
        Ok(())
    }

    async fn adjust_comment_count_tx(
        &self,
        tx: &mut DatabaseTransaction,
        idea_id: IdeaId,
        delta: i64,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE ideas SET comment_count = comment_count + ? WHERE id = ?")
            .bind(delta)
            .bind(idea_id)
            .execute(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to adjust comment count", e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Idea {} not found", idea_id)));
        }
        Ok(())
    }

    async fn recount_comments_tx(
        &self,
        tx: &mut DatabaseTransaction,
        idea_id: IdeaId,
    ) -> AppResult<Option<i64>> {
        let row = sqlx::query(
            "UPDATE ideas SET comment_count = (SELECT COUNT(*) FROM comments WHERE idea_id = ideas.id)
             WHERE id = ? RETURNING comment_count",
        )
        .bind(idea_id)
        .fetch_optional(tx.as_sqlite_mut())
        .await
        .map_err(|e| db_error("Failed to recount comments", e))?;
        Ok(row.map(|r| r.try_get::<i64, _>("comment_count")).transpose()?)
    }

    async fn commented_ideas_tx(
        &self,
        tx: &mut DatabaseTransaction,
        author_id: UserId,
    ) -> AppResult<Vec<IdeaId>> {
        let rows = sqlx::query("SELECT DISTINCT idea_id FROM comments WHERE author_id = ?")
            .bind(author_id)
            .fetch_all(tx.as_sqlite_mut())
            .await
            .map_err(|e| db_error("Failed to list commented ideas", e))?;
        rows.iter()
            .map(|row| Ok(row.try_get::<IdeaId, _>("idea_id")?))
            .collect()
    }

    async fn get_comment(&self, id: CommentId) -> AppResult<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to get comment {}", id), e))?;
        row.as_ref().map(map_comment).transpose()
    }

    async fn list_comments(&self, idea_id: IdeaId) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT * FROM comments WHERE idea_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(idea_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list comments", e))?;
        map_rows(rows, map_comment)
    }

    async fn create_friendship(&self, friendship: &Friendship) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO friends (id, user_id, friend_id, status, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(friendship.id)
        .bind(friendship.user_id)
        .bind(friendship.friend_id)
        .bind(friendship.status.as_str())
        .bind(friendship.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create friendship", e))?;
        Ok(())
    }

    async fn get_friendship(&self, id: FriendshipId) -> AppResult<Option<Friendship>> {
        let row = sqlx::query("SELECT * FROM friends WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to get friendship {}", id), e))?;
        row.as_ref().map(map_friendship).transpose()
    }

    async fn find_friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> AppResult<Option<Friendship>> {
        let row = sqlx::query("SELECT * FROM friends WHERE user_id = ? AND friend_id = ?")
            .bind(user_id)
            .bind(friend_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to look up friendship", e))?;
        row.as_ref().map(map_friendship).transpose()
    }

    async fn update_friendship_status(
        &self,
        id: FriendshipId,
        status: FriendStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query("UPDATE friends SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to update friendship {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_friendship(&self, id: FriendshipId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM friends WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to delete friendship {}", id), e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_friendships_between(&self, a: UserId, b: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM friends
             WHERE (user_id = ? AND friend_id = ?) OR (user_id = ? AND friend_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to remove friendship", e))?;
        Ok(result.rows_affected())
    }

    async fn list_friendships_from(
        &self,
        user_id: UserId,
        status: FriendStatus,
    ) -> AppResult<Vec<Friendship>> {
        let rows = sqlx::query(
            "SELECT * FROM friends WHERE user_id = ? AND status = ? ORDER BY created_at, rowid",
        )
        .bind(user_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list friendships", e))?;
        map_rows(rows, map_friendship)
    }

    async fn list_friendships_to(
        &self,
        friend_id: UserId,
        status: FriendStatus,
    ) -> AppResult<Vec<Friendship>> {
        let rows = sqlx::query(
            "SELECT * FROM friends WHERE friend_id = ? AND status = ? ORDER BY created_at, rowid",
        )
        .bind(friend_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list friend requests", e))?;
        map_rows(rows, map_friendship)
    }

    async fn create_message(&self, message: &Message) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, sender_id, recipient_id, content, read, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.content)
        .bind(message.read)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to store message", e))?;
        Ok(())
    }

    async fn list_conversation(&self, a: UserId, b: UserId) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages
             WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load conversation", e))?;
        map_rows(rows, map_message)
    }

    async fn list_messages_involving(&self, user_id: UserId) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE sender_id = ? OR recipient_id = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list messages", e))?;
        map_rows(rows, map_message)
    }

    async fn mark_messages_read(&self, recipient: UserId, ids: &[MessageId]) -> AppResult<Vec<Message>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "UPDATE messages SET read = 1 WHERE read = 0 AND recipient_id = ",
        );
        qb.push_bind(recipient);
        qb.push(" AND id IN (");
        let mut separated = qb.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        qb.push(" RETURNING *");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to mark messages read", e))?;
        map_rows(rows, map_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::NaiveDate;

    fn profile(username: &str, role: UserRole) -> Profile {
        let now = Utc::now();
        Profile {
            id: UserId::new(),
            username: username.to_string(),
            full_name: None,
            role,
            avatar_url: None,
            instagram: None,
            tiktok: None,
            reputation: 0,
            join_date: now.date_naive(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_idea_round_trip_keeps_optional_fields() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        let author = profile("author", UserRole::Student);
        db.create_profile(&author).await.unwrap();

        let mut idea = Idea::new(
            author.id,
            "Water fountains".into(),
            "Refill stations on every floor".into(),
            Category::FoodService,
            Utc::now(),
        );
        idea.status = IdeaStatus::Forwarded;
        idea.principal_status = Some(PrincipalStatus::Approved);
        idea.budget = Some(5000.0);
        idea.implementation_date = NaiveDate::from_ymd_opt(2025, 4, 1);
        db.create_idea(&idea).await.unwrap();

        let loaded = db.get_idea(idea.id).await.unwrap().unwrap();
        assert_eq!(loaded.category, Category::FoodService);
        assert_eq!(loaded.principal_status, Some(PrincipalStatus::Approved));
        assert_eq!(loaded.budget, Some(5000.0));
        assert_eq!(loaded.implementation_date, NaiveDate::from_ymd_opt(2025, 4, 1));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        db.create_profile(&profile("same", UserRole::Student)).await.unwrap();
        let err = db
            .create_profile(&profile("same", UserRole::Teacher))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_teacher_review_is_compare_and_swap() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        let author = profile("author", UserRole::Student);
        let teacher = profile("teacher", UserRole::Teacher);
        db.create_profile(&author).await.unwrap();
        db.create_profile(&teacher).await.unwrap();
        let idea = Idea::new(author.id, "t".into(), "d".into(), Category::Other, Utc::now());
        db.create_idea(&idea).await.unwrap();

        let review = TeacherReview {
            status: IdeaStatus::UnderReview,
            teacher_notes: None,
            reviewed_by: teacher.id,
            forwarded_date: None,
            principal_status: None,
            updated_at: Utc::now(),
        };
        assert!(db.apply_teacher_review(idea.id, IdeaStatus::New, &review).await.unwrap());
        // Stale expectation no longer matches
        assert!(!db.apply_teacher_review(idea.id, IdeaStatus::New, &review).await.unwrap());
    }
}
