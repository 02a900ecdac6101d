pub mod error;
pub mod models;
pub mod query;
pub mod repo;

mod memory;
pub use memory::MemoryStore;

pub use error::{StoreError, StoreResult};
pub use models::{
    CreatorSummary, GitHubProfile, LikeAction, Links, NewProject, NewUser, Project, ProjectId,
    ProjectPatch, ProjectView, PublicProfile, PublicUser, User, UserId, UserPatch, UserProfile,
};
pub use query::{Page, PageInfo, Pagination, ProjectFilter, ProjectSort, SortField, SortOrder};
pub use repo::{Showcase, ShowcaseStore, LEADERBOARD_SIZE};
