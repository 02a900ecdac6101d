//! The ownership gate for mutating routes.
//!
//! Handlers authenticate first ([`Identity`]), then fetch the target, then
//! call [`ensure_owner`]. The gate itself never touches the store or session.

use store::{Project, ProjectView, User, UserId};

use super::Identity;
use crate::error::ApiError;

/// A resource with exactly one owning user.
pub trait Owned {
    fn owner(&self) -> UserId;
}

impl Owned for Project {
    fn owner(&self) -> UserId {
        self.created_by
    }
}

impl Owned for ProjectView {
    fn owner(&self) -> UserId {
        self.project.created_by
    }
}

/// A user owns their own account.
impl Owned for User {
    fn owner(&self) -> UserId {
        self.id
    }
}

/// `NotFound` for a missing resource, `Forbidden` when `identity` is not its owner.
pub fn ensure_owner<R: Owned>(
    identity: &Identity,
    resource: Option<&R>,
    what: &'static str,
) -> Result<(), ApiError> {
    let resource = resource.ok_or(ApiError::NotFound(what))?;
    if resource.owner() != identity.user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}
