use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::*;
use crate::query::{Page, Pagination, ProjectFilter, ProjectSort};
use crate::repo::ShowcaseStore;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    projects: HashMap<ProjectId, Project>,
    images: HashSet<(ProjectId, String)>,
}

impl Tables {
    fn username_taken(&self, username: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.username.eq_ignore_ascii_case(username))
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

/// In-memory ShowcaseStore for testing.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store poisoned".into()))
    }
}

impl ShowcaseStore for MemoryStore {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        let tables = self.lock()?;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.lock()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn search_users(&self, fragment: &str) -> StoreResult<Vec<User>> {
        let needle = fragment.to_lowercase();
        let mut users: Vec<User> = self
            .lock()?
            .users
            .values()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        user.validate()?;
        let mut tables = self.lock()?;
        if tables.email_taken(&user.email, None) {
            return Err(StoreError::Conflict { field: "email" });
        }
        if tables.username_taken(&user.username, None) {
            return Err(StoreError::Conflict { field: "username" });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            github_id: None,
            name: user.name,
            email: user.email,
            username: user.username,
            avatar_url: user.avatar_url,
            bio: None,
            location: None,
            links: Links::default(),
            followers: Vec::new(),
            following: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn upsert_github_user(&self, profile: GitHubProfile) -> StoreResult<User> {
        let mut tables = self.lock()?;
        let existing = tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(&profile.email))
            .map(|u| u.id);
        if tables.username_taken(&profile.username, existing) {
            return Err(StoreError::Conflict { field: "username" });
        }

        let now = Utc::now();
        if let Some(user) = existing.and_then(|id| tables.users.get_mut(&id)) {
            user.github_id = Some(profile.github_id);
            user.name = profile.name;
            user.username = profile.username;
            user.avatar_url = profile.avatar_url;
            user.bio = profile.bio;
            user.location = profile.location;
            user.links.website = profile.website;
            user.links.github = profile.github_link;
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            github_id: Some(profile.github_id),
            name: profile.name,
            email: profile.email,
            username: profile.username,
            avatar_url: profile.avatar_url,
            bio: profile.bio,
            location: profile.location,
            links: Links {
                website: profile.website,
                github: profile.github_link,
                ..Links::default()
            },
            followers: Vec::new(),
            following: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> StoreResult<Option<User>> {
        patch.validate()?;
        let mut tables = self.lock()?;
        if let Some(username) = &patch.username {
            if tables.username_taken(username, Some(id)) {
                return Err(StoreError::Conflict { field: "username" });
            }
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.apply(patch);
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: HashSet<ProjectId> = tables
            .projects
            .values()
            .filter(|p| p.created_by == id)
            .map(|p| p.id)
            .collect();
        tables.projects.retain(|pid, _| !owned.contains(pid));
        tables.images.retain(|(pid, _)| !owned.contains(pid));
        for project in tables.projects.values_mut() {
            project.likes.remove(&id);
        }
        Ok(true)
    }

    async fn project_by_id(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        Ok(self.lock()?.projects.get(&id).cloned())
    }

    async fn project_by_title(&self, owner: UserId, title: &str) -> StoreResult<Option<Project>> {
        Ok(self
            .lock()?
            .projects
            .values()
            .find(|p| p.created_by == owner && p.title == title)
            .cloned())
    }

    async fn projects_by_owner(&self, owner: UserId) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .lock()?
            .projects
            .values()
            .filter(|p| p.created_by == owner)
            .cloned()
            .collect();
        projects.sort_by(|a, b| ProjectSort::default().compare(a, b));
        Ok(projects)
    }

    async fn list_projects(
        &self,
        filter: &ProjectFilter,
        pagination: Pagination,
        sort: ProjectSort,
    ) -> StoreResult<Page<Project>> {
        let mut matching: Vec<Project> = self
            .lock()?
            .projects
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| sort.compare(a, b));

        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.page_size as usize)
            .collect();
        Ok(Page::new(data, pagination, total))
    }

    async fn create_project(&self, owner: UserId, project: NewProject) -> StoreResult<Project> {
        project.validate()?;
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&owner) {
            return Err(StoreError::NotFound("user"));
        }

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            title: project.title,
            description: project.description,
            created_by: owner,
            images: project.images,
            likes: BTreeSet::new(),
            tags: project.tags,
            category: project.category,
            project_url: project.project_url,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> StoreResult<Option<Project>> {
        patch.validate()?;
        let mut tables = self.lock()?;
        let Some(project) = tables.projects.get_mut(&id) else {
            return Ok(None);
        };
        project.apply(patch);
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, id: ProjectId) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        let removed = tables.projects.remove(&id).is_some();
        tables.images.retain(|(pid, _)| *pid != id);
        Ok(removed)
    }

    async fn set_like(
        &self,
        id: ProjectId,
        user: UserId,
        action: LikeAction,
    ) -> StoreResult<Option<Project>> {
        let mut tables = self.lock()?;
        let Some(project) = tables.projects.get_mut(&id) else {
            return Ok(None);
        };
        match action {
            LikeAction::Like => project.likes.insert(user),
            LikeAction::Unlike => project.likes.remove(&user),
        };
        Ok(Some(project.clone()))
    }

    async fn liked_projects(&self, user: UserId) -> StoreResult<Vec<ProjectId>> {
        let mut liked: Vec<Project> = self
            .lock()?
            .projects
            .values()
            .filter(|p| p.likes.contains(&user))
            .cloned()
            .collect();
        liked.sort_by(|a, b| ProjectSort::default().compare(a, b));
        Ok(liked.into_iter().map(|p| p.id).collect())
    }

    async fn top_projects(&self, limit: usize) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self.lock()?.projects.values().cloned().collect();
        let sort = ProjectSort::new(crate::query::SortField::Likes, crate::query::SortOrder::Desc);
        projects.sort_by(|a, b| sort.compare(a, b));
        projects.truncate(limit);
        Ok(projects)
    }

    async fn attach_image(&self, id: ProjectId, url: &str) -> StoreResult<Option<Project>> {
        let mut tables = self.lock()?;
        let Some(project) = tables.projects.get_mut(&id) else {
            return Ok(None);
        };
        if !project.images.iter().any(|i| i == url) {
            if project.images.len() >= MAX_PROJECT_IMAGES {
                return Err(StoreError::Validation(format!(
                    "a project can have at most {MAX_PROJECT_IMAGES} images"
                )));
            }
            project.images.push(url.to_string());
            project.updated_at = Utc::now();
        }
        Ok(Some(project.clone()))
    }

    async fn detach_image(&self, id: ProjectId, url: &str) -> StoreResult<Option<Project>> {
        let mut tables = self.lock()?;
        let Some(project) = tables.projects.get_mut(&id) else {
            return Ok(None);
        };
        project.images.retain(|i| i != url);
        Ok(Some(project.clone()))
    }

    async fn record_image(&self, project: ProjectId, url: &str) -> StoreResult<()> {
        self.lock()?.images.insert((project, url.to_string()));
        Ok(())
    }

    async fn forget_image(&self, project: ProjectId, url: &str) -> StoreResult<()> {
        self.lock()?.images.remove(&(project, url.to_string()));
        Ok(())
    }
}

impl MemoryStore {
    /// Image metadata rows recorded for `project`.
    pub fn recorded_images(&self, project: ProjectId) -> Vec<String> {
        let Ok(tables) = self.lock() else {
            return Vec::new();
        };
        let mut urls: Vec<String> = tables
            .images
            .iter()
            .filter(|(pid, _)| *pid == project)
            .map(|(_, url)| url.clone())
            .collect();
        urls.sort();
        urls
    }
}
