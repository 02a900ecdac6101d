//! [`ShowcaseStore`] backed by PostgreSQL.
//!
//! Likes live in `project_likes` with one row per (project, user), so a
//! project's like set is read with an `ARRAY(...)` subquery and a repeated
//! like is absorbed by `ON CONFLICT DO NOTHING`. Image count and bio length
//! are also enforced by table constraints, which surface as validation errors.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use store::query::{SortField, SortOrder};
use store::{
    GitHubProfile, LikeAction, Links, NewProject, NewUser, Page, Pagination, Project, ProjectFilter,
    ProjectId, ProjectPatch, ProjectSort, ShowcaseStore, StoreError, StoreResult, User, UserId,
    UserPatch,
};
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "p.id, p.title, p.description, p.created_by, p.images, \
     ARRAY(SELECT l.user_id FROM project_likes l WHERE l.project_id = p.id ORDER BY l.user_id) AS likes, \
     p.tags, p.category, p.project_url, p.created_at, p.updated_at";

const LIKE_COUNT: &str = "(SELECT COUNT(*) FROM project_likes l WHERE l.project_id = p.id)";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_project(&self, sql: &str, id: Uuid) -> StoreResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Project::from))
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    github_id: Option<String>,
    name: String,
    email: String,
    username: String,
    avatar_url: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    website: Option<String>,
    github_link: Option<String>,
    linkedin_url: Option<String>,
    official_website_url: Option<String>,
    followers: Vec<Uuid>,
    following: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            github_id: row.github_id,
            name: row.name,
            email: row.email,
            username: row.username,
            avatar_url: row.avatar_url,
            bio: row.bio,
            location: row.location,
            links: Links {
                website: row.website,
                github: row.github_link,
                linkedin: row.linkedin_url,
                official_website: row.official_website_url,
            },
            followers: row.followers,
            following: row.following,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProjectRow {
    id: Uuid,
    title: String,
    description: Value,
    created_by: Uuid,
    images: Vec<String>,
    likes: Vec<Uuid>,
    tags: Vec<String>,
    category: Option<String>,
    project_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            created_by: row.created_by,
            images: row.images,
            likes: row.likes.into_iter().collect(),
            tags: row.tags,
            category: row.category,
            project_url: row.project_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Map driver errors onto store errors using the Postgres SQLSTATE.
fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => {
                let field = match db.constraint() {
                    Some("users_username_key") => "username",
                    Some("users_github_id_key") => "github account",
                    _ => "email",
                };
                return StoreError::Conflict { field };
            }
            Some("23503") => {
                return match db.constraint() {
                    Some("image_metadata_project_id_fkey" | "project_likes_project_id_fkey") => {
                        StoreError::NotFound("project")
                    }
                    _ => StoreError::NotFound("user"),
                };
            }
            Some("23514") => {
                let message = match db.constraint() {
                    Some("projects_images_limit") => "a project can have at most 3 images",
                    Some("users_bio_check") => "bio must be at most 500 characters",
                    _ => "value violates a constraint",
                };
                return StoreError::Validation(message.into());
            }
            _ => {}
        }
    }
    StoreError::Backend(err.to_string())
}

/// `%fragment%` with LIKE metacharacters escaped.
fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProjectFilter) {
    if let Some(text) = filter.text.as_deref().filter(|t| !t.is_empty()) {
        let pattern = contains_pattern(text);
        qb.push(" AND (p.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR project_description_text(p.description) ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = &filter.category {
        qb.push(" AND p.category = ").push_bind(category.clone());
    }
    if !filter.tags.is_empty() {
        qb.push(" AND p.tags && ").push_bind(filter.tags.clone());
    }
}

fn order_clause(sort: ProjectSort) -> String {
    let column = match sort.field {
        SortField::CreatedAt => "p.created_at",
        SortField::UpdatedAt => "p.updated_at",
        SortField::Title => "lower(p.title)",
        SortField::Likes => LIKE_COUNT,
    };
    let direction = match sort.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!(" ORDER BY {column} {direction}, p.created_at DESC, p.id ASC")
}

impl ShowcaseStore for PgStore {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(User::from))
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE lower(username) = lower($1)")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(row.map(User::from))
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn search_users(&self, fragment: &str) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE username ILIKE $1 ORDER BY lower(username)")
                .bind(contains_pattern(fragment))
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        user.validate()?;
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (id, name, email, username, avatar_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.into())
    }

    async fn upsert_github_user(&self, profile: GitHubProfile) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users
                (id, github_id, name, email, username, avatar_url, bio, location, website, github_link)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT ((lower(email)))
            DO UPDATE SET
                github_id = EXCLUDED.github_id,
                name = EXCLUDED.name,
                username = EXCLUDED.username,
                avatar_url = EXCLUDED.avatar_url,
                bio = EXCLUDED.bio,
                location = EXCLUDED.location,
                website = EXCLUDED.website,
                github_link = EXCLUDED.github_link,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&profile.github_id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.username)
        .bind(&profile.avatar_url)
        .bind(&profile.bio)
        .bind(&profile.location)
        .bind(&profile.website)
        .bind(&profile.github_link)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.into())
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> StoreResult<Option<User>> {
        patch.validate()?;
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                username = COALESCE($3, username),
                avatar_url = COALESCE($4, avatar_url),
                bio = COALESCE($5, bio),
                location = COALESCE($6, location),
                website = COALESCE($7, website),
                github_link = COALESCE($8, github_link),
                linkedin_url = COALESCE($9, linkedin_url),
                official_website_url = COALESCE($10, official_website_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.username)
        .bind(&patch.avatar_url)
        .bind(&patch.bio)
        .bind(&patch.location)
        .bind(&patch.website)
        .bind(&patch.github_link)
        .bind(&patch.linkedin_url)
        .bind(&patch.official_website_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.map(User::from))
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn project_by_id(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = $1");
        self.fetch_project(&sql, id).await
    }

    async fn project_by_title(&self, owner: UserId, title: &str) -> StoreResult<Option<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p \
             WHERE p.created_by = $1 AND p.title = $2 \
             ORDER BY p.created_at DESC LIMIT 1"
        );
        let row: Option<ProjectRow> = sqlx::query_as(&sql)
            .bind(owner)
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Project::from))
    }

    async fn projects_by_owner(&self, owner: UserId) -> StoreResult<Vec<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p \
             WHERE p.created_by = $1 ORDER BY p.created_at DESC, p.id"
        );
        let rows: Vec<ProjectRow> = sqlx::query_as(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn liked_projects(&self, user: UserId) -> StoreResult<Vec<ProjectId>> {
        sqlx::query_scalar(
            "SELECT p.id FROM projects p \
             JOIN project_likes l ON l.project_id = p.id \
             WHERE l.user_id = $1 ORDER BY p.created_at DESC, p.id",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn list_projects(
        &self,
        filter: &ProjectFilter,
        pagination: Pagination,
        sort: ProjectSort,
    ) -> StoreResult<Page<Project>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p WHERE TRUE");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p WHERE TRUE"
        ));
        push_filter(&mut select, filter);
        select.push(order_clause(sort));
        select
            .push(" LIMIT ")
            .push_bind(i64::try_from(pagination.page_size).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX));
        let rows: Vec<ProjectRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        let projects = rows.into_iter().map(Project::from).collect();
        Ok(Page::new(projects, pagination, total.max(0) as u64))
    }

    async fn create_project(&self, owner: UserId, project: NewProject) -> StoreResult<Project> {
        project.validate()?;
        let sql = format!(
            r#"
            WITH p AS (
                INSERT INTO projects
                    (id, title, description, created_by, images, tags, category, project_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
            )
            SELECT {PROJECT_COLUMNS} FROM p
            "#
        );
        let row: ProjectRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&project.title)
            .bind(&project.description)
            .bind(owner)
            .bind(&project.images)
            .bind(&project.tags)
            .bind(&project.category)
            .bind(&project.project_url)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> StoreResult<Option<Project>> {
        patch.validate()?;
        let sql = format!(
            r#"
            WITH p AS (
                UPDATE projects SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    images = COALESCE($4, images),
                    tags = COALESCE($5, tags),
                    category = COALESCE($6, category),
                    project_url = COALESCE($7, project_url),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {PROJECT_COLUMNS} FROM p
            "#
        );
        let row: Option<ProjectRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&patch.title)
            .bind(&patch.description)
            .bind(&patch.images)
            .bind(&patch.tags)
            .bind(&patch.category)
            .bind(&patch.project_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Project::from))
    }

    async fn delete_project(&self, id: ProjectId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_like(
        &self,
        id: ProjectId,
        user: UserId,
        action: LikeAction,
    ) -> StoreResult<Option<Project>> {
        let sql = match action {
            LikeAction::Like => {
                r#"
                INSERT INTO project_likes (project_id, user_id)
                SELECT $1, $2 WHERE EXISTS (SELECT 1 FROM projects WHERE id = $1)
                ON CONFLICT DO NOTHING
                "#
            }
            LikeAction::Unlike => "DELETE FROM project_likes WHERE project_id = $1 AND user_id = $2",
        };
        sqlx::query(sql)
            .bind(id)
            .bind(user)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        self.project_by_id(id).await
    }

    async fn top_projects(&self, limit: usize) -> StoreResult<Vec<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p \
             ORDER BY {LIKE_COUNT} DESC, p.created_at DESC, p.id LIMIT $1"
        );
        let rows: Vec<ProjectRow> = sqlx::query_as(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn attach_image(&self, id: ProjectId, url: &str) -> StoreResult<Option<Project>> {
        sqlx::query(
            r#"
            UPDATE projects
            SET images = array_append(images, $2), updated_at = NOW()
            WHERE id = $1 AND NOT ($2 = ANY(images))
            "#,
        )
        .bind(id)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        self.project_by_id(id).await
    }

    async fn detach_image(&self, id: ProjectId, url: &str) -> StoreResult<Option<Project>> {
        sqlx::query(
            "UPDATE projects SET images = array_remove(images, $2), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        self.project_by_id(id).await
    }

    async fn record_image(&self, project: ProjectId, url: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO image_metadata (project_id, image_url) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(project)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn forget_image(&self, project: ProjectId, url: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM image_metadata WHERE project_id = $1 AND image_url = $2")
            .bind(project)
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
