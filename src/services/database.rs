//! User persistence over PostgreSQL.
//!
//! The directory service talks to storage through the [`UserStore`] trait;
//! [`Database`] is the production implementation and [`MockUserStore`] is an
//! in-memory stand-in for tests. All reads exclude soft-deleted rows, and
//! email uniqueness among live rows is guarded by a partial unique index
//! with the application-level check acting only as a pre-flight.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::filter::{self, FilterCondition, FilterOperator};
use crate::dtos::user::SortDir;
use crate::error::AppError;
use crate::models::{User, FILTER_FIELDS, SORT_FIELDS};

/// Parameters for one list request, assembled by the directory service.
#[derive(Debug, Clone)]
pub struct UserListQuery {
    pub skip: i64,
    pub limit: i64,
    pub sort_by: Option<String>,
    pub sort_dir: SortDir,
    pub search: Option<String>,
    pub conditions: Option<Vec<FilterCondition>>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;
    async fn list_users(&self, query: &UserListQuery) -> Result<Vec<User>, AppError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn email_in_use(
        &self,
        email: &str,
        exclude_user: Option<Uuid>,
    ) -> Result<bool, AppError>;
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;
    async fn update_user(&self, user: &User) -> Result<(), AppError>;
    async fn soft_delete_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn list_users(&self, query: &UserListQuery) -> Result<Vec<User>, AppError> {
        let mut sql = String::from("SELECT * FROM users WHERE deleted = FALSE");
        let mut next_param = 1;

        // Search takes precedence over structured conditions.
        let compiled = if let Some(term) = query.search.as_deref() {
            filter::build_search_filter(term, FILTER_FIELDS, next_param)
        } else if let Some(conditions) = query.conditions.as_deref() {
            filter::build_query_filter(conditions, FILTER_FIELDS, next_param)?
        } else {
            None
        };

        let mut binds: Vec<String> = Vec::new();
        if let Some(compiled) = compiled {
            sql.push_str(&format!(" AND ({})", compiled.clause));
            next_param += compiled.binds.len();
            binds = compiled.binds;
        }

        // Only allow-listed names are ever interpolated into ORDER BY.
        match query.sort_by.as_deref() {
            Some(field) => {
                filter::validate_sort_field(Some(field), SORT_FIELDS, "user")?;
                sql.push_str(&format!(" ORDER BY {} {}", field, query.sort_dir.as_sql()));
            }
            None => sql.push_str(" ORDER BY created_at DESC"),
        }

        sql.push_str(&format!(" LIMIT ${} OFFSET ${}", next_param, next_param + 1));

        let mut q = sqlx::query_as::<_, User>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }

        q.bind(query.limit)
            .bind(query.skip)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted = FALSE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 AND deleted = FALSE")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn email_in_use(
        &self,
        email: &str,
        exclude_user: Option<Uuid>,
    ) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                SELECT 1 FROM users
                WHERE email = $1 AND deleted = FALSE
                  AND ($2::uuid IS NULL OR id <> $2)
            )",
        )
        .bind(email)
        .bind(exclude_user)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, permissions, created_at, updated_at, deleted)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.permissions)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &user.email))?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users
             SET name = $2, email = $3, password_hash = $4, permissions = $5, updated_at = $6
             WHERE id = $1 AND deleted = FALSE",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.permissions)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &user.email))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "User with ID {} not found",
                user.id
            )));
        }
        Ok(())
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET deleted = TRUE, updated_at = $2
             WHERE id = $1 AND deleted = FALSE
             RETURNING *",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }
}

/// A lost uniqueness race surfaces as a conflict, everything else as a
/// database error.
fn map_unique_violation(err: sqlx::Error, email: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("Email '{}' is already in use", email))
        }
        err => AppError::DatabaseError(anyhow::anyhow!(err)),
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MockUserStore {
    pub users: std::sync::Mutex<Vec<User>>,
}

impl MockUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<User>>, AppError> {
        self.users
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock store mutex poisoned: {}", e)))
    }
}

fn field_value<'a>(user: &'a User, field: &str) -> &'a str {
    match field {
        "name" => &user.name,
        "email" => &user.email,
        _ => "",
    }
}

fn matches_condition(user: &User, condition: &FilterCondition) -> bool {
    let actual = field_value(user, &condition.field);
    match condition.operator {
        FilterOperator::Eq => actual == condition.value,
        FilterOperator::Ne => actual != condition.value,
        FilterOperator::Contains => actual
            .to_lowercase()
            .contains(&condition.value.to_lowercase()),
    }
}

#[async_trait]
impl UserStore for MockUserStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn list_users(&self, query: &UserListQuery) -> Result<Vec<User>, AppError> {
        let users = self.lock()?;

        let mut selected: Vec<User> = if let Some(term) = query.search.as_deref() {
            let needle = term.to_lowercase();
            users
                .iter()
                .filter(|u| !u.deleted)
                .filter(|u| {
                    FILTER_FIELDS
                        .iter()
                        .any(|f| field_value(u, f).to_lowercase().contains(&needle))
                })
                .cloned()
                .collect()
        } else if let Some(conditions) = query.conditions.as_deref() {
            for condition in conditions {
                if !FILTER_FIELDS.contains(&condition.field.as_str()) {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Field '{}' is not valid. Valid fields: {}",
                        condition.field,
                        FILTER_FIELDS.join(", ")
                    )));
                }
            }
            users
                .iter()
                .filter(|u| !u.deleted)
                .filter(|u| conditions.iter().all(|c| matches_condition(u, c)))
                .cloned()
                .collect()
        } else {
            users.iter().filter(|u| !u.deleted).cloned().collect()
        };

        match query.sort_by.as_deref() {
            Some(field) => {
                filter::validate_sort_field(Some(field), SORT_FIELDS, "user")?;
                selected.sort_by(|a, b| {
                    let ordering = field_value(a, field).cmp(field_value(b, field));
                    match query.sort_dir {
                        SortDir::Asc => ordering,
                        SortDir::Desc => ordering.reverse(),
                    }
                });
            }
            None => selected.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        Ok(selected
            .into_iter()
            .skip(query.skip.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let users = self.lock()?;
        Ok(users.iter().find(|u| u.id == id && !u.deleted).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.lock()?;
        Ok(users
            .iter()
            .find(|u| u.email == email && !u.deleted)
            .cloned())
    }

    async fn email_in_use(
        &self,
        email: &str,
        exclude_user: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let users = self.lock()?;
        Ok(users.iter().any(|u| {
            u.email == email && !u.deleted && exclude_user.map_or(true, |id| u.id != id)
        }))
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.lock()?;
        if users.iter().any(|u| u.email == user.email && !u.deleted) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Email '{}' is already in use",
                user.email
            )));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.lock()?;
        if users
            .iter()
            .any(|u| u.email == user.email && !u.deleted && u.id != user.id)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Email '{}' is already in use",
                user.email
            )));
        }
        match users.iter_mut().find(|u| u.id == user.id && !u.deleted) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(anyhow::anyhow!(
                "User with ID {} not found",
                user.id
            ))),
        }
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let mut users = self.lock()?;
        match users.iter_mut().find(|u| u.id == id && !u.deleted) {
            Some(user) => {
                user.deleted = true;
                user.updated_at = Utc::now();
                Ok(Some(user.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Permission;

    fn seeded_store(names: &[(&str, &str)]) -> MockUserStore {
        let store = MockUserStore::new();
        {
            let mut users = store.users.lock().unwrap();
            for (offset, (name, email)) in names.iter().enumerate() {
                let mut user = User::new(
                    name.to_string(),
                    email.to_string(),
                    "hash".to_string(),
                    vec![Permission::User.as_str().to_string()],
                );
                // Spread creation times so the default ordering is stable
                user.created_at += chrono::Duration::seconds(offset as i64);
                user.updated_at = user.created_at;
                users.push(user);
            }
        }
        store
    }

    fn query() -> UserListQuery {
        UserListQuery {
            skip: 0,
            limit: 10,
            sort_by: None,
            sort_dir: SortDir::Asc,
            search: None,
            conditions: None,
        }
    }

    #[tokio::test]
    async fn test_list_defaults_to_newest_first() {
        let store = seeded_store(&[("Ana", "ana@x.com"), ("Bob", "bob@x.com")]);
        let users = store.list_users(&query()).await.unwrap();
        assert_eq!(users[0].name, "Bob");
        assert_eq!(users[1].name, "Ana");
    }

    #[tokio::test]
    async fn test_list_sorts_by_requested_field() {
        let store = seeded_store(&[("Bob", "bob@x.com"), ("Ana", "ana@x.com")]);
        let mut q = query();
        q.sort_by = Some("name".to_string());
        let users = store.list_users(&q).await.unwrap();
        assert_eq!(users[0].name, "Ana");

        q.sort_dir = SortDir::Desc;
        let users = store.list_users(&q).await.unwrap();
        assert_eq!(users[0].name, "Bob");
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_sort_field() {
        let store = seeded_store(&[("Ana", "ana@x.com")]);
        let mut q = query();
        q.sort_by = Some("password_hash".to_string());
        assert!(store.list_users(&q).await.is_err());
    }

    #[tokio::test]
    async fn test_list_applies_skip_and_limit() {
        let store = seeded_store(&[
            ("Ana", "ana@x.com"),
            ("Bob", "bob@x.com"),
            ("Cid", "cid@x.com"),
        ]);
        let mut q = query();
        q.sort_by = Some("name".to_string());
        q.skip = 1;
        q.limit = 1;
        let users = store.list_users(&q).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Bob");
    }

    #[tokio::test]
    async fn test_list_search_matches_any_field() {
        let store = seeded_store(&[("Ana", "ana@x.com"), ("Bob", "bob@x.com")]);
        let mut q = query();
        q.search = Some("BOB".to_string());
        let users = store.list_users(&q).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Bob");
    }

    #[tokio::test]
    async fn test_list_conditions_are_anded() {
        let store = seeded_store(&[("Ana", "ana@x.com"), ("Anita", "anita@x.com")]);
        let mut q = query();
        q.conditions = Some(vec![
            FilterCondition {
                field: "name".to_string(),
                operator: FilterOperator::Contains,
                value: "an".to_string(),
            },
            FilterCondition {
                field: "email".to_string(),
                operator: FilterOperator::Ne,
                value: "ana@x.com".to_string(),
            },
        ]);
        let users = store.list_users(&q).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Anita");
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_are_invisible() {
        let store = seeded_store(&[("Ana", "ana@x.com")]);
        let id = store.users.lock().unwrap()[0].id;

        let deleted = store.soft_delete_user(id).await.unwrap();
        assert!(deleted.is_some());

        assert!(store.find_user_by_id(id).await.unwrap().is_none());
        assert!(store
            .find_user_by_email("ana@x.com")
            .await
            .unwrap()
            .is_none());
        assert!(store.list_users(&query()).await.unwrap().is_empty());
        assert!(!store.email_in_use("ana@x.com", None).await.unwrap());

        // Second delete is a no-op
        assert!(store.soft_delete_user(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_live_duplicate_email() {
        let store = seeded_store(&[("Ana", "ana@x.com")]);
        let duplicate = User::new(
            "Ana Clone".to_string(),
            "ana@x.com".to_string(),
            "hash".to_string(),
            vec![],
        );
        let err = store.insert_user(&duplicate).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
