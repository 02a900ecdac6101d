//! # Domain models for users and projects
//!
//! Defines the records persisted by a [`crate::ShowcaseStore`] and the
//! projections handed to HTTP clients. Everything is `Serialize + Deserialize`
//! with camelCase field names, matching the JSON the frontend consumes.
//!
//! ## Types
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`User`] | A signed-up account. Email and username are unique; username lookups ignore case. |
//! | [`PublicUser`] | A [`User`] without email and GitHub id, served on subdomain showcases. |
//! | [`Project`] | A published project. The creator is always a plain [`UserId`]; likes are a set of user ids. |
//! | [`CreatorSummary`] | The creator fields attached to a project when it is hydrated for display. |
//! | [`ProjectView`] | A [`Project`] plus its derived like count and optional [`CreatorSummary`]. |
//! | [`UserProfile`] / [`PublicProfile`] | A user together with their projects. |
//!
//! Write-side inputs ([`NewUser`], [`GitHubProfile`], [`UserPatch`], [`NewProject`],
//! [`ProjectPatch`]) carry their own `validate` methods so every store backend
//! rejects the same inputs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

pub type UserId = Uuid;
pub type ProjectId = Uuid;

/// Upper bound on images attached to one project.
pub const MAX_PROJECT_IMAGES: usize = 3;

/// Upper bound on the length of a user bio, in characters.
pub const MAX_BIO_CHARS: usize = 500;

/// Personal links shown on a profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Links {
    pub website: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub official_website: Option<String>,
}

/// A signed-up account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Stable id assigned by GitHub, absent for explicitly registered users.
    pub github_id: Option<String>,
    pub name: String,
    pub email: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub followers: Vec<UserId>,
    #[serde(default)]
    pub following: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Strip private fields for public display.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            bio: self.bio.clone(),
            location: self.location.clone(),
            links: self.links.clone(),
            followers: self.followers.clone(),
            following: self.following.clone(),
        }
    }

    pub fn to_creator(&self) -> CreatorSummary {
        CreatorSummary {
            id: self.id,
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    /// Apply a validated patch in place.
    pub fn apply(&mut self, patch: UserPatch) {
        let UserPatch {
            name,
            username,
            avatar_url,
            bio,
            location,
            website,
            github_link,
            linkedin_url,
            official_website_url,
        } = patch;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(username) = username {
            self.username = username;
        }
        if avatar_url.is_some() {
            self.avatar_url = avatar_url;
        }
        if bio.is_some() {
            self.bio = bio;
        }
        if location.is_some() {
            self.location = location;
        }
        if website.is_some() {
            self.links.website = website;
        }
        if github_link.is_some() {
            self.links.github = github_link;
        }
        if linkedin_url.is_some() {
            self.links.linkedin = linkedin_url;
        }
        if official_website_url.is_some() {
            self.links.official_website = official_website_url;
        }
        self.updated_at = Utc::now();
    }
}

/// User fields that are safe to serve on a public showcase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub links: Links,
    pub followers: Vec<UserId>,
    pub following: Vec<UserId>,
}

/// Explicit registration input.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    pub avatar_url: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> StoreResult<()> {
        require("name", &self.name)?;
        require("email", &self.email)?;
        require("username", &self.username)?;
        if !self.email.contains('@') {
            return Err(StoreError::Validation("invalid email address".into()));
        }
        validate_username(&self.username)
    }
}

/// Profile data returned by GitHub at sign-in. Upserted by email.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GitHubProfile {
    pub github_id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub github_link: Option<String>,
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub github_link: Option<String>,
    pub linkedin_url: Option<String>,
    pub official_website_url: Option<String>,
}

impl UserPatch {
    pub fn validate(&self) -> StoreResult<()> {
        if let Some(name) = &self.name {
            require("name", name)?;
        }
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(bio) = &self.bio {
            if bio.chars().count() > MAX_BIO_CHARS {
                return Err(StoreError::Validation(format!(
                    "bio must be at most {MAX_BIO_CHARS} characters"
                )));
            }
        }
        Ok(())
    }
}

/// A published project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    /// Rich-text block document, stored as-is.
    pub description: Value,
    pub created_by: UserId,
    pub images: Vec<String>,
    pub likes: BTreeSet<UserId>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub project_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn likes_count(&self) -> usize {
        self.likes.len()
    }

    /// Plain text used for free-text matching against the description.
    ///
    /// Block documents contribute only their written text (`text` and
    /// `content` fields, string list `items`), never block types or ids.
    pub fn description_text(&self) -> String {
        if let Value::String(text) = &self.description {
            return text.clone();
        }
        let mut parts = Vec::new();
        collect_block_text(&self.description, &mut parts);
        parts.join(" ")
    }

    /// Apply a validated patch in place. Creator and likes are untouched.
    pub fn apply(&mut self, patch: ProjectPatch) {
        let ProjectPatch {
            title,
            description,
            images,
            tags,
            category,
            project_url,
        } = patch;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(images) = images {
            self.images = images;
        }
        if let Some(tags) = tags {
            self.tags = tags;
        }
        if category.is_some() {
            self.category = category;
        }
        if project_url.is_some() {
            self.project_url = project_url;
        }
        self.updated_at = Utc::now();
    }

    pub fn view(self, creator: Option<CreatorSummary>) -> ProjectView {
        ProjectView {
            likes_count: self.likes_count(),
            project: self,
            creator,
        }
    }
}

/// Creator fields attached to a project for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSummary {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// A project as served to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub likes_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<CreatorSummary>,
}

/// Project creation input. The creator is supplied separately.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Value,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub project_url: Option<String>,
}

impl NewProject {
    pub fn validate(&self) -> StoreResult<()> {
        require("title", &self.title)?;
        if is_blank_document(&self.description) {
            return Err(StoreError::Validation("description is required".into()));
        }
        validate_images(&self.images)
    }
}

/// Partial project update. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<Value>,
    pub images: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub project_url: Option<String>,
}

impl ProjectPatch {
    pub fn validate(&self) -> StoreResult<()> {
        if let Some(title) = &self.title {
            require("title", title)?;
        }
        if let Some(description) = &self.description {
            if is_blank_document(description) {
                return Err(StoreError::Validation("description is required".into()));
            }
        }
        if let Some(images) = &self.images {
            validate_images(images)?;
        }
        Ok(())
    }
}

/// Requested change to a project's like set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Like,
    Unlike,
}

/// A user with their projects resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub projects: Vec<ProjectView>,
    pub liked_projects: Vec<ProjectId>,
}

/// The public variant of [`UserProfile`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    #[serde(flatten)]
    pub user: PublicUser,
    pub projects: Vec<ProjectView>,
}

impl From<UserProfile> for PublicProfile {
    fn from(profile: UserProfile) -> Self {
        Self {
            user: profile.user.to_public(),
            projects: profile.projects,
        }
    }
}

/// Fields of a block document holding user-written text.
const BLOCK_TEXT_KEYS: &[&str] = &["text", "content"];

fn collect_block_text<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Array(values) => values.iter().for_each(|v| collect_block_text(v, out)),
        Value::Object(fields) => {
            for (key, field) in fields {
                match field {
                    Value::String(text) if BLOCK_TEXT_KEYS.contains(&key.as_str()) => out.push(text),
                    Value::Array(items) if key == "items" => {
                        for item in items {
                            match item {
                                Value::String(text) => out.push(text),
                                other => collect_block_text(other, out),
                            }
                        }
                    }
                    other => collect_block_text(other, out),
                }
            }
        }
        _ => {}
    }
}

fn require(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_username(username: &str) -> StoreResult<()> {
    require("username", username)?;
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(StoreError::Validation(
            "username may only contain letters, digits and '-'".into(),
        ));
    }
    Ok(())
}

fn validate_images(images: &[String]) -> StoreResult<()> {
    if images.len() > MAX_PROJECT_IMAGES {
        return Err(StoreError::Validation(format!(
            "a project can have at most {MAX_PROJECT_IMAGES} images"
        )));
    }
    Ok(())
}

/// Null, an empty string, or a block document with no blocks.
fn is_blank_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Object(map) => match map.get("blocks") {
            Some(Value::Array(blocks)) => blocks.is_empty(),
            _ => map.is_empty(),
        },
        _ => false,
    }
}
