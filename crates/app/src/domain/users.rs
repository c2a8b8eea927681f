//! Users
//!
//! Users are owned by an external identity service; checkout only needs their identifier.

use crate::uuids::TypedUuid;

/// Marker for identifiers issued by the identity service.
#[derive(Debug)]
pub struct User;

/// User UUID
pub type UserUuid = TypedUuid<User>;
