use super::{copy_each, ResourceStore};
use crate::access::AccessGuard;
use crate::collaborators::{AccessManager, IndexLookup, RecordResolver, Session};
use crate::config::StoreConfig;
use crate::layout::PathResolver;
use crate::resource::{
    container_url, CleanupOutcome, CopySummary, ResourceContainerDescriptor, ResourceDescriptor,
    ResourceHolder,
};
use crate::{StoreError, StoreResult};
use attach_files::{DirectoryMover, RenameOutcome};
use attach_ids::{RecordId, RecordUuid};
use attach_types::{ApprovalState, ResourceName, Visibility};
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A [`ResourceStore`] keeping resources as plain files under the data directory.
///
/// The store holds no locks and no per-record state; it is safe to share between
/// threads. Concurrent writes to the same resource resolve as last writer wins.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    config: Arc<StoreConfig>,
    guard: AccessGuard,
    paths: PathResolver,
    mover: DirectoryMover,
}

impl FilesystemStore {
    pub fn new(
        config: Arc<StoreConfig>,
        access: Arc<dyn AccessManager>,
        resolver: Arc<dyn RecordResolver>,
        index: Option<Arc<dyn IndexLookup>>,
    ) -> Self {
        let guard = AccessGuard::new(access, resolver, config.folder_privileges());
        let paths = PathResolver::new(config.clone(), index);
        let mover = DirectoryMover::new(config.data_dir());
        Self {
            config,
            guard,
            paths,
            mover,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    /// Root folder of a record, resolved without authorization.
    pub fn record_directory(&self, uuid: &RecordUuid, approval: ApprovalState) -> StoreResult<PathBuf> {
        let record_id = self.guard.resolve(uuid, approval)?;
        self.paths.record_dir(record_id, uuid)
    }

    /// Backup bucket folder for a record, resolved without authorization.
    pub fn removed_bucket_directory(
        &self,
        uuid: &RecordUuid,
        approval: ApprovalState,
    ) -> StoreResult<PathBuf> {
        let record_id = self.guard.resolve(uuid, approval)?;
        Ok(self.paths.removed_bucket_dir(record_id))
    }

    fn tier_dir(
        &self,
        uuid: &RecordUuid,
        record_id: RecordId,
        visibility: Visibility,
    ) -> StoreResult<PathBuf> {
        let record_dir = self.paths.record_dir(record_id, uuid)?;
        Ok(self.paths.tier_dir(&record_dir, visibility))
    }

    fn describe(
        &self,
        uuid: &RecordUuid,
        record_id: RecordId,
        filename: &str,
        visibility: Visibility,
        path: &Path,
        approval: ApprovalState,
    ) -> StoreResult<ResourceDescriptor> {
        let info = attach_files::file_info(path).map_err(|e| {
            if e.is_not_found() {
                not_found(filename, uuid)
            } else {
                StoreError::files(record_id, e)
            }
        })?;
        Ok(ResourceDescriptor::new(
            self.config.node_url(),
            uuid,
            record_id,
            filename,
            visibility,
            info,
            approval,
        ))
    }

    fn list_tier(
        &self,
        uuid: &RecordUuid,
        record_id: RecordId,
        visibility: Visibility,
        filter: &str,
        approval: ApprovalState,
    ) -> StoreResult<Vec<ResourceDescriptor>> {
        let visibility = self.paths.effective_visibility(visibility);
        let dir = self.tier_dir(uuid, record_id, visibility)?;
        let listed =
            attach_files::list_files(&dir, filter).map_err(|e| StoreError::files(record_id, e))?;

        Ok(listed
            .into_iter()
            .map(|file| {
                ResourceDescriptor::new(
                    self.config.node_url(),
                    uuid,
                    record_id,
                    &file.relative_name,
                    visibility,
                    file.info,
                    approval,
                )
            })
            .collect())
    }

    fn locate(
        &self,
        uuid: &RecordUuid,
        record_id: RecordId,
        visibility: Visibility,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<ResourceHolder> {
        let visibility = self.paths.effective_visibility(visibility);
        let tier = self.tier_dir(uuid, record_id, visibility)?;
        let path = self.paths.resource_path(&tier, name);
        if !path.is_file() {
            return Err(not_found(name.as_str(), uuid));
        }

        let descriptor = self.describe(uuid, record_id, name.as_str(), visibility, &path, approval)?;
        Ok(ResourceHolder::new(path, descriptor))
    }

    fn remove(&self, holder: ResourceHolder) -> CleanupOutcome {
        let (path, descriptor) = holder.into_parts();
        let target = format!("Metadata resource '{}'", descriptor.filename);

        match attach_files::remove_file(&path) {
            Ok(true) => {
                tracing::info!("removed {} of {}", descriptor.filename, descriptor.record_uuid);
                CleanupOutcome::Removed { target }
            }
            Ok(false) => CleanupOutcome::Skipped { target },
            Err(e) => {
                tracing::warn!(
                    "Datastore issue. Failed to remove {}. Error is: {}",
                    path.display(),
                    e
                );
                CleanupOutcome::Failed {
                    target,
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn not_found(resource: &str, uuid: &RecordUuid) -> StoreError {
    StoreError::ResourceNotFound {
        resource: resource.to_string(),
        record: uuid.to_string(),
    }
}

impl ResourceStore for FilesystemStore {
    fn list_resources(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        visibility: Option<Visibility>,
        filter: &str,
        approval: ApprovalState,
    ) -> StoreResult<Vec<ResourceDescriptor>> {
        match visibility {
            Some(visibility) => {
                let record_id = self
                    .guard
                    .authorize_download(session, uuid, visibility, approval)?;
                self.list_tier(uuid, record_id, visibility, filter, approval)
            }
            None => {
                let record_id =
                    self.guard
                        .authorize_download(session, uuid, Visibility::Public, approval)?;
                let mut resources =
                    self.list_tier(uuid, record_id, Visibility::Public, filter, approval)?;

                let tiers = !self.config.folder_privileges().skips(Visibility::Private);
                if tiers && self.guard.can_edit(session, record_id) {
                    resources.extend(self.list_tier(
                        uuid,
                        record_id,
                        Visibility::Private,
                        filter,
                        approval,
                    )?);
                    resources.sort_by(|a, b| a.filename.cmp(&b.filename));
                }
                Ok(resources)
            }
        }
    }

    fn get_resource(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        visibility: Visibility,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<ResourceHolder> {
        let record_id = self
            .guard
            .authorize_download(session, uuid, visibility, approval)?;
        self.locate(uuid, record_id, visibility, name, approval)
    }

    fn get_resource_internal(
        &self,
        uuid: &RecordUuid,
        visibility: Visibility,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<ResourceHolder> {
        let record_id = self.guard.resolve(uuid, approval)?;
        self.locate(uuid, record_id, visibility, name, approval)
    }

    fn get_resource_container(
        &self,
        uuid: &RecordUuid,
        approval: ApprovalState,
    ) -> StoreResult<ResourceContainerDescriptor> {
        let record_id = self.guard.resolve(uuid, approval)?;
        let directory = self.paths.record_dir(record_id, uuid)?;
        attach_files::ensure_dir(&directory).map_err(|e| StoreError::files(record_id, e))?;

        Ok(ResourceContainerDescriptor {
            record_uuid: uuid.clone(),
            record_id,
            url: container_url(self.config.node_url(), uuid),
            directory,
            approval,
        })
    }

    fn put_resource(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        name: &ResourceName,
        content: &mut dyn Read,
        changed: Option<DateTime<Utc>>,
        visibility: Visibility,
        approval: ApprovalState,
    ) -> StoreResult<ResourceDescriptor> {
        let record_id = self.guard.authorize_edit(session, uuid, approval)?;
        let visibility = self.paths.effective_visibility(visibility);
        let tier = self.tier_dir(uuid, record_id, visibility)?;
        let path = self.paths.resource_path(&tier, name);

        if path.exists() && !approval.is_approved() {
            return Err(StoreError::AlreadyExists {
                resource: name.to_string(),
                visibility,
                record_id,
            });
        }

        let written = attach_files::write_atomic(&path, content)
            .map_err(|e| StoreError::files(record_id, e))?;
        if let Some(changed) = changed {
            attach_files::set_modified(&path, changed)
                .map_err(|e| StoreError::files(record_id, e))?;
        }

        tracing::info!(
            "stored {} ({} bytes, {}) for {}",
            name,
            written,
            visibility,
            uuid
        );
        self.describe(uuid, record_id, name.as_str(), visibility, &path, approval)
    }

    fn patch_visibility(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        name: &ResourceName,
        visibility: Visibility,
        approval: ApprovalState,
    ) -> StoreResult<Option<ResourceDescriptor>> {
        if self.config.folder_privileges().skips(visibility) {
            tracing::debug!(
                "no {} tier without tier folders, {} left in place",
                visibility,
                name
            );
            return Ok(None);
        }
        let record_id = self.guard.authorize_edit(session, uuid, approval)?;

        let record_dir = self.paths.record_dir(record_id, uuid)?;
        let target_tier = self.paths.tier_dir(&record_dir, visibility);
        let target = self.paths.resource_path(&target_tier, name);
        if target.is_file() {
            return self
                .describe(uuid, record_id, name.as_str(), visibility, &target, approval)
                .map(Some);
        }

        for current in Visibility::ALL.into_iter().filter(|v| *v != visibility) {
            let source_tier = self.paths.tier_dir(&record_dir, current);
            let source = self.paths.resource_path(&source_tier, name);
            if !source.is_file() {
                continue;
            }

            let target_dir = self.paths.resource_dir(&target_tier, name);
            attach_files::ensure_dir(&target_dir).map_err(|e| StoreError::files(record_id, e))?;
            attach_files::move_file(&source, &target)
                .map_err(|e| StoreError::files(record_id, e))?;

            tracing::info!(
                "moved {} of {} from {} to {}",
                name,
                uuid,
                current,
                visibility
            );
            return self
                .describe(uuid, record_id, name.as_str(), visibility, &target, approval)
                .map(Some);
        }

        Err(not_found(name.as_str(), uuid))
    }

    fn delete_resource(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<CleanupOutcome> {
        let record_id = self.guard.authorize_edit(session, uuid, approval)?;

        for visibility in Visibility::ALL {
            match self.locate(uuid, record_id, visibility, name, approval) {
                Ok(holder) => return Ok(self.remove(holder)),
                Err(StoreError::ResourceNotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(not_found(name.as_str(), uuid))
    }

    fn delete_resource_in(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        visibility: Visibility,
        name: &ResourceName,
        approval: ApprovalState,
    ) -> StoreResult<CleanupOutcome> {
        if self.config.folder_privileges().skips(visibility) {
            return Ok(CleanupOutcome::Skipped {
                target: format!("Metadata resource '{name}'"),
            });
        }
        let record_id = self.guard.authorize_edit(session, uuid, approval)?;

        let holder = self.locate(uuid, record_id, visibility, name, approval)?;
        Ok(self.remove(holder))
    }

    fn delete_all_resources(
        &self,
        session: &Session,
        uuid: &RecordUuid,
        approval: ApprovalState,
    ) -> StoreResult<CleanupOutcome> {
        let record_id = self.guard.authorize_edit(session, uuid, approval)?;
        let target = format!("Metadata '{record_id}' directory");

        let record_dir = match self.paths.record_dir(record_id, uuid) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!("Datastore issue. Unable to locate {}. Error is: {}", target, e);
                return Ok(CleanupOutcome::Failed {
                    target,
                    reason: e.to_string(),
                });
            }
        };

        Ok(match attach_files::remove_tree(&record_dir) {
            Ok(true) => {
                tracing::info!("removed {} at {}", target, record_dir.display());
                CleanupOutcome::Removed { target }
            }
            Ok(false) => CleanupOutcome::Skipped { target },
            Err(e) => {
                tracing::warn!(
                    "Datastore issue. Failed to remove {}. Error is: {}",
                    record_dir.display(),
                    e
                );
                CleanupOutcome::Failed {
                    target,
                    reason: e.to_string(),
                }
            }
        })
    }

    fn copy_resources(
        &self,
        session: &Session,
        source: &RecordUuid,
        target: &RecordUuid,
        visibility: Visibility,
        source_approval: ApprovalState,
        target_approval: ApprovalState,
    ) -> StoreResult<CopySummary> {
        if self.config.folder_privileges().skips(visibility) {
            return Ok(CopySummary::default());
        }
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

    fn rename_record_directory(&self, old: &Path, new: &Path) -> RenameOutcome {
        self.mover.rename(old, new)
    }
}
