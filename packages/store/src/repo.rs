//! # Showcase — project and user persistence behind an abstract store
//!
//! All reads and writes go through the [`ShowcaseStore`] trait, so the same
//! logic works against Postgres in production and an in-memory store in tests.
//! [`Showcase`] sits on top and composes store calls into the shapes the HTTP
//! layer serves.
//!
//! ## [`ShowcaseStore`] trait
//!
//! Backends always return projects with the creator as a plain [`UserId`].
//! Attaching creator details for display is a separate hydrate step
//! ([`Showcase::hydrate`]). A user's project list is never stored; it is
//! derived from `created_by`, so deleting a project is a single write.
//!
//! Likes are a set of user ids. [`set_like`](ShowcaseStore::set_like) adds to or
//! removes from that set, which makes repeated identical calls idempotent.
//!
//! ## Composite operations
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`profile`](Showcase::profile) | User by case-insensitive username, with projects resolved and hydrated. |
//! | [`project_view`](Showcase::project_view) | Single project with its creator attached. |
//! | [`showcase_project`](Showcase::showcase_project) | Project by owner username and exact title, as served on subdomains. |
//! | [`create_projects`](Showcase::create_projects) | Validates every draft before writing any of them. |
//! | [`list_projects`](Showcase::list_projects) | Filtered, clamped, sorted page of hydrated projects. |
//! | [`leaderboard`](Showcase::leaderboard) | Top [`LEADERBOARD_SIZE`] projects by like count. |

use std::collections::{HashMap, HashSet};
use std::future::Future;

use crate::error::{StoreError, StoreResult};
use crate::models::*;
use crate::query::{Page, Pagination, ProjectFilter, ProjectSort};

/// Number of projects on the leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;

/// Async persistence interface for users, projects and image metadata.
pub trait ShowcaseStore: Clone + Send + Sync + 'static {
    fn user_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Exact match ignoring case.
    fn user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    fn users_by_ids(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = StoreResult<Vec<User>>> + Send;

    fn list_users(&self) -> impl Future<Output = StoreResult<Vec<User>>> + Send;

    /// Users whose username contains `fragment`, ignoring case.
    fn search_users(
        &self,
        fragment: &str,
    ) -> impl Future<Output = StoreResult<Vec<User>>> + Send;

    fn create_user(&self, user: NewUser) -> impl Future<Output = StoreResult<User>> + Send;

    /// Insert or refresh the user with this email.
    fn upsert_github_user(
        &self,
        profile: GitHubProfile,
    ) -> impl Future<Output = StoreResult<User>> + Send;

    fn update_user(
        &self,
        id: UserId,
        patch: UserPatch,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Removes the user along with their projects and likes.
    fn delete_user(&self, id: UserId) -> impl Future<Output = StoreResult<bool>> + Send;

    fn project_by_id(
        &self,
        id: ProjectId,
    ) -> impl Future<Output = StoreResult<Option<Project>>> + Send;

    fn project_by_title(
        &self,
        owner: UserId,
        title: &str,
    ) -> impl Future<Output = StoreResult<Option<Project>>> + Send;

    /// Newest first.
    fn projects_by_owner(
        &self,
        owner: UserId,
    ) -> impl Future<Output = StoreResult<Vec<Project>>> + Send;

    fn list_projects(
        &self,
        filter: &ProjectFilter,
        pagination: Pagination,
        sort: ProjectSort,
    ) -> impl Future<Output = StoreResult<Page<Project>>> + Send;

    fn create_project(
        &self,
        owner: UserId,
        project: NewProject,
    ) -> impl Future<Output = StoreResult<Project>> + Send;

    fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> impl Future<Output = StoreResult<Option<Project>>> + Send;

    fn delete_project(&self, id: ProjectId) -> impl Future<Output = StoreResult<bool>> + Send;

    fn set_like(
        &self,
        id: ProjectId,
        user: UserId,
        action: LikeAction,
    ) -> impl Future<Output = StoreResult<Option<Project>>> + Send;

    /// Ids of projects `user` has liked, most recently created first.
    fn liked_projects(
        &self,
        user: UserId,
    ) -> impl Future<Output = StoreResult<Vec<ProjectId>>> + Send;

    /// Most liked first, ties newest first.
    fn top_projects(
        &self,
        limit: usize,
    ) -> impl Future<Output = StoreResult<Vec<Project>>> + Send;

    /// Add an image URL to a project. Adding a URL already present is a no-op;
    /// exceeding [`MAX_PROJECT_IMAGES`] is a validation error.
    fn attach_image(
        &self,
        id: ProjectId,
        url: &str,
    ) -> impl Future<Output = StoreResult<Option<Project>>> + Send;

    fn detach_image(
        &self,
        id: ProjectId,
        url: &str,
    ) -> impl Future<Output = StoreResult<Option<Project>>> + Send;

    /// Record that `url` was uploaded for `project`. Idempotent.
    fn record_image(
        &self,
        project: ProjectId,
        url: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn forget_image(
        &self,
        project: ProjectId,
        url: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Composite read and write operations over a [`ShowcaseStore`].
#[derive(Clone, Debug)]
pub struct Showcase<S: ShowcaseStore> {
    store: S,
}

impl<S: ShowcaseStore> Showcase<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Attach creator summaries to projects, fetching each creator once.
    pub async fn hydrate(&self, projects: Vec<Project>) -> StoreResult<Vec<ProjectView>> {
        let ids: Vec<UserId> = projects
            .iter()
            .map(|p| p.created_by)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let creators: HashMap<UserId, CreatorSummary> = self
            .store
            .users_by_ids(&ids)
            .await?
            .iter()
            .map(|u| (u.id, u.to_creator()))
            .collect();

        Ok(projects
            .into_iter()
            .map(|p| {
                let creator = creators.get(&p.created_by).cloned();
                p.view(creator)
            })
            .collect())
    }

    pub async fn profile(&self, username: &str) -> StoreResult<Option<UserProfile>> {
        let Some(user) = self.store.user_by_username(username).await? else {
            return Ok(None);
        };
        let creator = user.to_creator();
        let projects = self
            .store
            .projects_by_owner(user.id)
            .await?
            .into_iter()
            .map(|p| p.view(Some(creator.clone())))
            .collect();
        let liked_projects = self.store.liked_projects(user.id).await?;

        Ok(Some(UserProfile {
            user,
            projects,
            liked_projects,
        }))
    }

    pub async fn project_view(&self, id: ProjectId) -> StoreResult<Option<ProjectView>> {
        let Some(project) = self.store.project_by_id(id).await? else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![project]).await?.pop())
    }

    /// Resolve `username`'s project titled exactly `title`. A missing user
    /// or project is [`StoreError::NotFound`] naming which one.
    pub async fn showcase_project(
        &self,
        username: &str,
        title: &str,
    ) -> StoreResult<(PublicUser, ProjectView)> {
        let user = self
            .store
            .user_by_username(username)
            .await?
            .ok_or(StoreError::NotFound("user"))?;
        let project = self
            .store
            .project_by_title(user.id, title)
            .await?
            .ok_or(StoreError::NotFound("project"))?;
        let view = project.view(Some(user.to_creator()));

        Ok((user.to_public(), view))
    }

    /// Create every draft for `owner`. Nothing is written unless all drafts are valid.
    pub async fn create_projects(
        &self,
        owner: UserId,
        drafts: Vec<NewProject>,
    ) -> StoreResult<Vec<Project>> {
        for draft in &drafts {
            draft.validate()?;
        }

        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            created.push(self.store.create_project(owner, draft).await?);
        }
        Ok(created)
    }

    pub async fn list_projects(
        &self,
        filter: &ProjectFilter,
        pagination: Pagination,
        sort: ProjectSort,
    ) -> StoreResult<Page<ProjectView>> {
        let mut page = self.store.list_projects(filter, pagination, sort).await?;
        let projects = std::mem::take(&mut page.data);
        let views = self.hydrate(projects).await?;
        Ok(page.with_data(views))
    }

    pub async fn leaderboard(&self) -> StoreResult<Vec<ProjectView>> {
        let projects = self.store.top_projects(LEADERBOARD_SIZE).await?;
        self.hydrate(projects).await
    }
}
