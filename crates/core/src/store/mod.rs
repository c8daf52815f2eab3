//! The resource store capability and its filesystem implementation.
//!
//! [`ResourceStore`] is the surface callers program against. Every operation that
//! takes a [`Session`] is authorized before any file is touched; operations without
//! one are for trusted server-side callers.

mod filesystem;

pub use filesystem::FilesystemStore;

use crate::collaborators::Session;
use crate::constants::DEFAULT_FILTER;
use crate::resource::{
    CleanupOutcome, CopyFailure, CopySummary, ResourceContainerDescriptor, ResourceDescriptor,
    ResourceHolder,
};
use crate::{StoreError, StoreResult};
use attach_files::RenameOutcome;
use attach_ids::RecordUuid;
use attach_types::{ApprovalState, ResourceName, Visibility};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Storage of the files attached to catalog records.
pub trait ResourceStore: Send + Sync {
    /// Lists the resources of a record whose file name matches the glob `filter`.
    ///
    /// `None` lists the public tier, plus the private tier when the caller may edit
    /// the record and tier folders are enabled.
    fn list_resources(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        visibility: Option<Visibility>,
        filter: &str,
        approval: ApprovalState,
    ) -> StoreResult<Vec<ResourceDescriptor>>;

    /// Locates one resource in the given tier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ResourceNotFound`] if no such file exists.
    fn get_resource(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        visibility: Visibility,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<ResourceHolder>;

    /// Like [`ResourceStore::get_resource`] without authorization.
    fn get_resource_internal(
        &self,
        uuid: &RecordUuid,
        visibility: Visibility,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<ResourceHolder>;

    /// Looks for a resource in the public tier, then in the private tier.
    fn find_resource(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<ResourceHolder> {
        match self.get_resource(session, uuid, Visibility::Public, name, approval) {
            Err(StoreError::ResourceNotFound { .. }) => {
                self.get_resource(session, uuid, Visibility::Private, name, approval)
            }
            other => other,
        }
    }

    /// Describes a resource, or returns `None` if it does not exist.
    fn describe_resource(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        visibility: Visibility,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<Option<ResourceDescriptor>> {
        match self.get_resource(session, uuid, visibility, name, approval) {
            Ok(holder) => Ok(Some(holder.into_parts().1)),
            Err(StoreError::ResourceNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Ensures the root folder of a record exists.
    fn get_resource_container(
        &self,
        uuid: &RecordUuid,
        approval: ApprovalState,
    ) -> StoreResult<ResourceContainerDescriptor>;

    /// Stores `content` as `name`, replacing any existing approved resource.
    ///
    /// `changed` becomes the file's modification time when given.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the record is a working copy and the
    /// file already exists.
    #[allow(clippy::too_many_arguments)]
    fn put_resource(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        name: &ResourceName,
        content: &mut dyn Read,
        changed: Option<DateTime<Utc>>,
        visibility: Visibility,
        approval: ApprovalState,
    ) -> StoreResult<ResourceDescriptor>;

    /// Stores a local file under its own file name, keeping its modification time.
    fn put_resource_from_file(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        source: &Path,
        visibility: Visibility,
        approval: ApprovalState,
    ) -> StoreResult<ResourceDescriptor> {
        let file_name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                StoreError::InvalidInput(format!(
                    "'{}' has no usable file name",
                    source.display()
                ))
            })?;
        let name = ResourceName::new(file_name)?;

        let info = attach_files::file_info(source)
            .map_err(|e| StoreError::InvalidInput(format!("cannot read source file: {e}")))?;
        let mut file = File::open(source).map_err(|e| {
            StoreError::InvalidInput(format!(
                "cannot open source file {}: {e}",
                source.display()
            ))
        })?;

        self.put_resource(
            session,
            uuid,
            &name,
            &mut file,
            Some(info.modified),
            visibility,
            approval,
        )
    }

    /// Moves a resource to another tier.
    ///
    /// Returns `None` when the target tier does not exist in the current layout,
    /// and the existing descriptor when the resource is already there.
    fn patch_visibility(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        name: &ResourceName,
        visibility: Visibility,
        approval: ApprovalState,
    ) -> StoreResult<Option<ResourceDescriptor>>;

    /// Deletes a resource from whichever tier holds it.
    fn delete_resource(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<CleanupOutcome>;

    /// Deletes a resource from one tier.
    fn delete_resource_in(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        visibility: Visibility,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<CleanupOutcome>;

    /// Removes the whole folder of a record.
    fn delete_all_resources(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        approval: ApprovalState,
    ) -> StoreResult<CleanupOutcome>;

    /// Copies every resource of one tier from `source` to `target`.
    fn copy_resources(
        &self,
        session: &Session,
        source: &RecordUuid,
        target: &RecordUuid,
        visibility: Visibility,
        source_approval: ApprovalState,
        target_approval: ApprovalState,
    ) -> StoreResult<CopySummary> {
        copy_each(
            self,
            session,
            source,
            target,
            visibility,
            source_approval,
            target_approval,
        )
    }

    /// Moves a record folder, pruning the folders it leaves empty.
    fn rename_record_directory(&self, old: &Path, new: &Path) -> RenameOutcome;
}

/// Copies resources one by one through the store's own list, get and put.
///
/// Storage faults, conflicts and files vanishing mid-copy are recorded in the
/// summary; authorization and record resolution errors abort the copy.
pub(crate) fn copy_each<S: ResourceStore + ?Sized>(
    store: &S,
    session: &Session,
    source: &RecordUuid,
    target: &RecordUuid,
    visibility: Visibility,
    source_approval: ApprovalState,
    target_approval: ApprovalState,
) -> StoreResult<CopySummary> {
    let listed = store.list_resources(
        session,
        source,
        Some(visibility),
        DEFAULT_FILTER,
        source_approval,
    )?;

    let mut summary = CopySummary::default();
    for resource in listed {
        match copy_one(
            store,
            session,
            source,
            target,
            &resource,
            visibility,
            source_approval,
            target_approval,
        ) {
            Ok(copied) => summary.copied.push(copied),
            Err(e) if recoverable(&e) => {
                tracing::warn!(
                    "Datastore issue. Failed to copy {} from {} to {}. Error is: {}",
                    resource.filename,
                    source,
                    target,
                    e
                );
                summary.failed.push(CopyFailure {
                    resource: resource.filename,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        "copied {} {} resources from {} to {} ({} failed)",
        summary.copied.len(),
        visibility,
        source,
        target,
        summary.failed.len()
    );
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn copy_one<S: ResourceStore + ?Sized>(
    store: &S,
    session: &Session,
    source: &RecordUuid,
    target: &RecordUuid,
    resource: &ResourceDescriptor,
    visibility: Visibility,
    source_approval: ApprovalState,
    target_approval: ApprovalState,
) -> StoreResult<ResourceDescriptor> {
    let name = ResourceName::new(&resource.filename)?;
    let holder = store.get_resource(session, source, visibility, &name, source_approval)?;
    let mut content = holder.open()?;
    store.put_resource(
        session,
        target,
        &name,
        &mut content,
        Some(resource.last_modified),
        visibility,
        target_approval,
    )
}

fn recoverable(error: &StoreError) -> bool {
    error.is_fault()
        || matches!(
            error,
            StoreError::AlreadyExists { .. }
                | StoreError::ResourceNotFound { .. }
                | StoreError::InvalidInput(_)
        )
}
