//! Authorization gate in front of every store operation.
//!
//! The guard resolves a record UUID to its id and asks the [`AccessManager`] whether
//! the caller may proceed. It never touches the filesystem.
//!
//! ## Rules
//!
//! - Public resources require the download grant
//! - Private resources require the edit grant (only reachable with tier folders)
//! - Writes, moves and deletes require the edit grant
//!
//! Denials are [`AccessDenied::Unauthenticated`] for anonymous sessions and
//! [`AccessDenied::Forbidden`] otherwise.

use crate::collaborators::{AccessManager, RecordResolver, Session};
use crate::config::FolderPrivileges;
use crate::{AccessDenied, StoreError, StoreResult};
use attach_ids::{RecordId, RecordUuid};
use attach_types::{ApprovalState, Visibility};
use std::sync::Arc;

#[derive(Clone)]
pub struct AccessGuard {
    access: Arc<dyn AccessManager>,
    resolver: Arc<dyn RecordResolver>,
    privileges: FolderPrivileges,
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("privileges", &self.privileges)
            .finish_non_exhaustive()
    }
}

impl AccessGuard {
    pub fn new(
        access: Arc<dyn AccessManager>,
        resolver: Arc<dyn RecordResolver>,
        privileges: FolderPrivileges,
    ) -> Self {
        Self {
            access,
            resolver,
            privileges,
        }
    }

    /// Resolves `uuid` without any access check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if the record does not exist.
    pub fn resolve(&self, uuid: &RecordUuid, approval: ApprovalState) -> StoreResult<RecordId> {
        self.resolver
            .resolve_record_id(uuid, approval)
            .ok_or_else(|| StoreError::RecordNotFound(uuid.to_string()))
    }

    /// Checks that `session` may read resources of `uuid` in `visibility`.
    ///
    /// `Private` is coerced to `Public` when tier folders are disabled, so no edit
    /// grant is ever required in that mode. The download grant is still asked with
    /// the tier the caller requested.
    pub fn authorize_download(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        visibility: Visibility,
        approval: ApprovalState,
    ) -> StoreResult<RecordId> {
        let record_id = self.resolve(uuid, approval)?;

        let allowed = match self.privileges.effective_visibility(visibility) {
            Visibility::Public => self.access.can_download(session, record_id, visibility),
            Visibility::Private => self.access.can_edit(session, record_id),
        };

        if allowed {
            Ok(record_id)
        } else {
            tracing::debug!("download of {} resources of {} denied", visibility, uuid);
            Err(deny(session))
        }
    }

    /// Checks that `session` may modify resources of `uuid`.
    pub fn authorize_edit(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        approval: ApprovalState,
    ) -> StoreResult<RecordId> {
        let record_id = self.resolve(uuid, approval)?;
        if self.access.can_edit(session, record_id) {
            Ok(record_id)
        } else {
            tracing::debug!("edit of {} denied", uuid);
            Err(deny(session))
        }
    }

    /// Whether `session` holds the edit grant on an already resolved record.
    pub fn can_edit(&self, session: &Session, record_id: RecordId) -> bool {
        self.access.can_edit(session, record_id)
    }
}

fn deny(session: &Session) -> StoreError {
    if session.is_authenticated() {
        StoreError::Denied(AccessDenied::Forbidden)
    } else {
        StoreError::Denied(AccessDenied::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAccess, FakeResolver};

    fn guard(access: FakeAccess, privileges: FolderPrivileges) -> (AccessGuard, RecordUuid) {
        let uuid = RecordUuid::generate();
        let resolver = FakeResolver::default().with(&uuid, RecordId::new(42));
        (
            AccessGuard::new(Arc::new(access), Arc::new(resolver), privileges),
            uuid,
        )
    }

    #[test]
    fn test_unknown_record_is_not_found() {
        let (guard, _) = guard(FakeAccess::everyone(), FolderPrivileges::Default);
        let other = RecordUuid::generate();

        let result = guard.authorize_edit(&Session::anonymous(), &other, ApprovalState::Approved);

        assert!(matches!(result, Err(StoreError::RecordNotFound(uuid)) if uuid == other.to_string()));
    }

    #[test]
    fn test_public_download_uses_download_grant() {
        let (guard, uuid) = guard(FakeAccess::readers_only(), FolderPrivileges::Default);

        let id = guard
            .authorize_download(
                &Session::anonymous(),
                &uuid,
                Visibility::Public,
                ApprovalState::Approved,
            )
            .unwrap();

        assert_eq!(id, RecordId::new(42));
    }

    #[test]
    fn test_private_download_requires_edit_grant() {
        let (guard, uuid) = guard(FakeAccess::readers_only(), FolderPrivileges::Default);

        let result = guard.authorize_download(
            &Session::authenticated("reader"),
            &uuid,
            Visibility::Private,
            ApprovalState::Approved,
        );

        assert!(matches!(
            result,
            Err(StoreError::Denied(AccessDenied::Forbidden))
        ));
    }

    #[test]
    fn test_private_download_without_tiers_behaves_as_public() {
        let (guard, uuid) = guard(FakeAccess::readers_only(), FolderPrivileges::None);

        let result = guard.authorize_download(
            &Session::anonymous(),
            &uuid,
            Visibility::Private,
            ApprovalState::Approved,
        );

        assert!(result.is_ok());
    }

    #[test]
    fn test_download_grant_sees_requested_tier() {
        let (guard, uuid) = guard(FakeAccess::public_downloads_only(), FolderPrivileges::None);
        let session = Session::authenticated("reader");

        let public =
            guard.authorize_download(&session, &uuid, Visibility::Public, ApprovalState::Approved);
        let private =
            guard.authorize_download(&session, &uuid, Visibility::Private, ApprovalState::Approved);

        assert!(public.is_ok());
        assert!(matches!(
            private,
            Err(StoreError::Denied(AccessDenied::Forbidden))
        ));
    }

    #[test]
    fn test_denial_distinguishes_authentication() {
        let (guard, uuid) = guard(FakeAccess::nobody(), FolderPrivileges::Default);

        let anonymous = guard.authorize_edit(&Session::anonymous(), &uuid, ApprovalState::Approved);
        let logged_in =
            guard.authorize_edit(&Session::authenticated("bob"), &uuid, ApprovalState::Approved);

        assert!(matches!(
            anonymous,
            Err(StoreError::Denied(AccessDenied::Unauthenticated))
        ));
        assert!(matches!(
            logged_in,
            Err(StoreError::Denied(AccessDenied::Forbidden))
        ));
    }

    #[test]
    fn test_edit_grant() {
        let (guard, uuid) = guard(FakeAccess::editors("alice"), FolderPrivileges::Default);

        assert!(guard
            .authorize_edit(&Session::authenticated("alice"), &uuid, ApprovalState::Approved)
            .is_ok());
        assert!(guard.can_edit(&Session::authenticated("alice"), RecordId::new(42)));
        assert!(!guard.can_edit(&Session::authenticated("eve"), RecordId::new(42)));
    }
}
