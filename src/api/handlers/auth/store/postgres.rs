//! Postgres-backed stores for users, linked accounts, and email tokens.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{Instrument, warn};
use uuid::Uuid;

use super::super::utils::{generate_email_token, hash_email_token, is_unique_violation};
use super::{
    CreateUserOutcome, LinkOutcome, LinkedAccountStore, NewUser, PermissionLevel, Role,
    RoleAssignment, TokenConsume, TokenKind, TokenStore, User, UserStore,
};

// Constraint names from sql/schema.sql; used to tell the two link races apart.
const LINK_PROVIDER_ACCOUNT_CONSTRAINT: &str = "linked_accounts_provider_account_key";
const LINK_USER_PROVIDER_CONSTRAINT: &str = "linked_accounts_user_provider_key";

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_roles(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>> {
        let query = r"
            SELECT role, permission_level
            FROM user_roles
            WHERE user_id = $1
            ORDER BY position ASC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to load user roles")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let role_name: String = row.get("role");
                let Some(role) = Role::parse(&role_name) else {
                    // Unknown rows are skipped rather than failing the whole login.
                    warn!(role = %role_name, "ignoring unknown role assignment");
                    return None;
                };
                let permission_level: Option<String> = row.get("permission_level");
                Some(RoleAssignment {
                    role,
                    permission_level: permission_level
                        .as_deref()
                        .and_then(PermissionLevel::parse),
                })
            })
            .collect())
    }

    async fn hydrate(&self, row: sqlx::postgres::PgRow) -> Result<User> {
        let id: Uuid = row.get("id");
        let roles = self.load_roles(id).await?;
        Ok(User {
            id,
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            password_hash: row.get("password_hash"),
            email_verified: row.get("email_verified"),
            is_active: row.get("is_active"),
            roles,
        })
    }
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, password_hash, email_verified, is_active";

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by email")?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by id")?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn create(&self, new_user: NewUser) -> Result<CreateUserOutcome> {
        // User row and role assignments commit together.
        let mut tx = self.pool.begin().await.context("begin create user")?;

        let query = r"
            INSERT INTO users
                (email, first_name, last_name, password_hash, email_verified, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&new_user.email)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.password_hash)
            .bind(new_user.email_verified)
            .bind(new_user.is_active)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await;

        let id: Uuid = match row {
            Ok(row) => row.get("id"),
            Err(err) => {
                if is_unique_violation(&err) {
                    let _ = tx.rollback().await;
                    return Ok(CreateUserOutcome::EmailTaken);
                }
                return Err(err).context("failed to insert user");
            }
        };

        for (position, assignment) in new_user.roles.iter().enumerate() {
            let query = r"
                INSERT INTO user_roles (user_id, role, permission_level, position)
                VALUES ($1, $2, $3, $4)
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(assignment.role.as_str())
                .bind(assignment.permission_level.map(PermissionLevel::as_str))
                .bind(i32::try_from(position).unwrap_or(i32::MAX))
                .execute(&mut *tx)
                .instrument(span)
                .await
                .context("failed to insert role assignment")?;
        }

        tx.commit().await.context("commit create user")?;

        Ok(CreateUserOutcome::Created(User {
            id,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash: new_user.password_hash,
            email_verified: new_user.email_verified,
            is_active: new_user.is_active,
            roles: new_user.roles,
        }))
    }

    async fn set_password_digest(&self, id: Uuid, digest: &str) -> Result<()> {
        let query = r"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(digest)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password digest")?;
        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<()> {
        let query = r"
            UPDATE users
            SET email_verified = TRUE, updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark email verified")?;
        Ok(())
    }

    async fn record_login(&self, id: Uuid) -> Result<()> {
        let query = r"
            UPDATE users
            SET last_login_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record login")?;
        Ok(())
    }

    async fn activate_invited(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
        digest: &str,
    ) -> Result<()> {
        let query = r"
            UPDATE users
            SET first_name = $2,
                last_name = $3,
                password_hash = $4,
                is_active = TRUE,
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(first_name)
            .bind(last_name)
            .bind(digest)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to activate invited user")?;
        Ok(())
    }
}

pub struct PgLinkedAccountStore {
    pool: PgPool,
}

impl PgLinkedAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkedAccountStore for PgLinkedAccountStore {
    async fn find_user_by_provider(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Uuid>> {
        let query = r"
            SELECT user_id
            FROM linked_accounts
            WHERE provider = $1 AND provider_account_id = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(provider)
            .bind(provider_account_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up linked account")?;
        Ok(row.map(|row| row.get("user_id")))
    }

    async fn user_has_provider(&self, user_id: Uuid, provider: &str) -> Result<bool> {
        let query = r"
            SELECT 1 AS present
            FROM linked_accounts
            WHERE user_id = $1 AND provider = $2
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(provider)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to check provider link")?;
        Ok(row.is_some())
    }

    async fn link(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<LinkOutcome> {
        // Uniqueness is enforced by the database at commit time; the unique
        // constraint that fires tells us which race we lost.
        let query = r"
            INSERT INTO linked_accounts (user_id, provider, provider_account_id)
            VALUES ($1, $2, $3)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(provider)
            .bind(provider_account_id)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(LinkOutcome::Linked),
            Err(err) if is_unique_violation(&err) => {
                let constraint = match &err {
                    sqlx::Error::Database(db_err) => db_err.constraint().map(str::to_string),
                    _ => None,
                };
                match constraint.as_deref() {
                    Some(LINK_USER_PROVIDER_CONSTRAINT) => Ok(LinkOutcome::AlreadyLinked),
                    Some(LINK_PROVIDER_ACCOUNT_CONSTRAINT) | None => {
                        Ok(LinkOutcome::ProviderIdentityTaken)
                    }
                    Some(other) => Err(anyhow!("unexpected unique constraint: {other}")),
                }
            }
            Err(err) => Err(err).context("failed to insert linked account"),
        }
    }
}

pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn issue(&self, email: &str, kind: TokenKind, ttl: Duration) -> Result<String> {
        let query = r"
            INSERT INTO email_tokens (token_hash, email, kind, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        let ttl_seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        for _ in 0..3 {
            let token = generate_email_token()?;
            let token_hash = hash_email_token(&token);
            let result = sqlx::query(query)
                .bind(token_hash)
                .bind(email)
                .bind(kind.as_str())
                .bind(ttl_seconds)
                .execute(&self.pool)
                .instrument(span.clone())
                .await;

            match result {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err).context("failed to insert email token"),
            }
        }

        Err(anyhow!("failed to generate unique email token"))
    }

    async fn consume(&self, raw_token: &str, kind: TokenKind) -> Result<TokenConsume> {
        // Single delete-and-return statement: concurrent consumers race on the
        // row delete, so exactly one sees it. Expired rows are removed by the
        // same statement (self-cleaning) and reported distinctly.
        let query = r"
            DELETE FROM email_tokens
            WHERE token_hash = $1 AND kind = $2
            RETURNING email, (expires_at > NOW()) AS live
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(hash_email_token(raw_token))
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume email token")?;

        let Some(row) = row else {
            return Ok(TokenConsume::NotFound);
        };

        if row.get::<bool, _>("live") {
            Ok(TokenConsume::Consumed {
                email: row.get("email"),
            })
        } else {
            Ok(TokenConsume::Expired)
        }
    }

    async fn peek(&self, raw_token: &str, kind: TokenKind) -> Result<Option<String>> {
        let query = r"
            SELECT email
            FROM email_tokens
            WHERE token_hash = $1 AND kind = $2 AND expires_at > NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(hash_email_token(raw_token))
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to peek email token")?;
        Ok(row.map(|row| row.get("email")))
    }

    async fn replace_for_email(&self, email: &str, kind: TokenKind) -> Result<u64> {
        let query = r"
            DELETE FROM email_tokens
            WHERE email = $1 AND kind = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(kind.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to replace email tokens")?;
        Ok(result.rows_affected())
    }

    async fn seconds_since_last_issue(
        &self,
        email: &str,
        kind: TokenKind,
    ) -> Result<Option<i64>> {
        let query = r"
            SELECT FLOOR(EXTRACT(EPOCH FROM (NOW() - MAX(created_at))))::bigint AS age
            FROM email_tokens
            WHERE email = $1 AND kind = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to read last token issuance")?;
        Ok(row.get::<Option<i64>, _>("age"))
    }
}
