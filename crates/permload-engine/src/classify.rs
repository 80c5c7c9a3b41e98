//! Error classifiers, one per remote operation.
//!
//! Each provisioner operation is handed the classifier that knows what
//! "already exists" looks like for that resource. Everything else falls back
//! to [`default`].

use permload_core::{ApiError, ErrorClass};

pub const ORGANIZATION_NAME_TAKEN: &str = "CF-OrganizationNameTaken";
pub const SPACE_NAME_TAKEN: &str = "CF-SpaceNameTaken";
pub const USER_ID_TAKEN: &str = "CF-UaaIdTaken";
pub const UNPROCESSABLE_ENTITY: &str = "CF-UnprocessableEntity";
pub const APP_NAME_NOT_UNIQUE: &str = "name must be unique in space";

/// Signature shared by all classifiers.
pub type Classifier = fn(&ApiError) -> ErrorClass;

/// Transport failures and non-2xx statuses are retried; anything the client
/// could not make sense of is fatal.
pub fn default(err: &ApiError) -> ErrorClass {
    match err {
        ApiError::Transport(_) | ApiError::Status { .. } => ErrorClass::Transient,
        ApiError::Decode(_) => ErrorClass::Fatal,
    }
}

pub fn org_create(err: &ApiError) -> ErrorClass {
    if err.has_code(ORGANIZATION_NAME_TAKEN) {
        return ErrorClass::Conflict;
    }
    default(err)
}

pub fn space_create(err: &ApiError) -> ErrorClass {
    if err.has_code(SPACE_NAME_TAKEN) {
        return ErrorClass::Conflict;
    }
    default(err)
}

/// A timed-out create can still land server side; the retry then reports the
/// name as taken.
pub fn app_create(err: &ApiError) -> ErrorClass {
    if err.has_detail(APP_NAME_NOT_UNIQUE) {
        return ErrorClass::Conflict;
    }
    default(err)
}

pub fn user_create(err: &ApiError) -> ErrorClass {
    if err.has_code(USER_ID_TAKEN) {
        return ErrorClass::Conflict;
    }
    default(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_conflict() {
        let err = ApiError::status(400, ORGANIZATION_NAME_TAKEN, "The organization name is taken: o");
        assert_eq!(org_create(&err), ErrorClass::Conflict);
        // Same body means nothing to the space classifier.
        assert_eq!(space_create(&err), ErrorClass::Transient);
    }

    #[test]
    fn test_app_conflict_matches_detail() {
        let err = ApiError::status(422, UNPROCESSABLE_ENTITY, APP_NAME_NOT_UNIQUE);
        assert_eq!(app_create(&err), ErrorClass::Conflict);
        let other = ApiError::status(422, UNPROCESSABLE_ENTITY, "name can't be blank");
        assert_eq!(app_create(&other), ErrorClass::Transient);
    }

    #[test]
    fn test_user_conflict() {
        let err = ApiError::status(400, USER_ID_TAKEN, "The UAA ID is taken: u");
        assert_eq!(user_create(&err), ErrorClass::Conflict);
    }

    #[test]
    fn test_default_classes() {
        assert_eq!(default(&ApiError::Transport("reset".into())), ErrorClass::Transient);
        assert_eq!(default(&ApiError::status(503, "", "")), ErrorClass::Transient);
        assert_eq!(default(&ApiError::Decode("bad json".into())), ErrorClass::Fatal);
    }
}
