use std::collections::BTreeMap;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};

use strata_acl::{AccessControl, AccessError, AclContext, AclSet, DenyCode, Principal, Privilege};
use strata_blob::BlobStore;
use strata_delta::{ChangeFeed, Cursor, DeltaPage, DeltaRecord, Operation};
use strata_events::{
    EventBus, EventDetail, EventFilter, EventStream, FsEvent, FsEventKind, JobKind, JobSink,
};
use strata_lock::{Lock, LockError, LockManager, LockScope, LockToken};
use strata_quota::{QuotaReport, QuotaTracker};
use strata_types::{DeletedPolicy, NodeId, ShareId, Timestamp, UserId};

use crate::attrs::NamespaceRegistry;
use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::names::{deconflicted_name, validate_node_name};
use crate::node::{FileState, Node, NodeKind};
use crate::store::NodeStore;

/// Sentinel share id keying the secondary blob references that keep
/// trashed content restorable. Real share ids are minted with a
/// `share-` prefix, so the sentinel can never collide.
fn trash_share() -> ShareId {
    ShareId::new("trash")
}

/// The authenticated request context: who is acting, and the lock token
/// (if any) the client presents for write admission.
#[derive(Clone, Debug)]
pub struct Caller {
    pub principal: Principal,
    pub lock_token: Option<LockToken>,
}

impl Caller {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            lock_token: None,
        }
    }

    /// Attach the lock token presented by the client.
    pub fn with_lock_token(mut self, token: LockToken) -> Self {
        self.lock_token = Some(token);
        self
    }

    fn user(&self) -> &UserId {
        &self.principal.user
    }
}

/// How move and copy resolve a name collision at the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Fail `Conflict` on any collision.
    Reject,
    /// Derive a fresh name (`a.txt` becomes `a (2).txt`).
    Rename,
    /// Collections merge into the existing collection; a file replaces
    /// the existing file. Copy treats this like `Rename`.
    Merge,
}

/// Expected node type for lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    Any,
    Collection,
    File,
}

impl TypeFilter {
    fn check(&self, node: &Node) -> FsResult<()> {
        match self {
            Self::Any => Ok(()),
            Self::Collection if node.kind.is_collection() => Ok(()),
            Self::Collection => Err(FsError::NotACollection(node.id)),
            Self::File if node.kind.is_file() => Ok(()),
            Self::File => Err(FsError::NotAFile(node.id)),
        }
    }
}

/// The filesystem engine.
///
/// Wires the node store, blob store, access control, locks, quota,
/// change feed, and event fabric into the operation surface the API
/// layers consume. Reads are optimistic; mutations serialize through a
/// single commit lock so a version bump and its feed record land as one
/// unit.
pub struct Filesystem {
    config: FsConfig,
    nodes: Arc<dyn NodeStore>,
    blobs: BlobStore,
    acl: AccessControl,
    locks: LockManager,
    quota: QuotaTracker,
    feed: ChangeFeed,
    bus: EventBus,
    jobs: Arc<dyn JobSink>,
    namespaces: NamespaceRegistry,
    commit: Mutex<()>,
}

/// Opaque per-namespace attribute map.
pub type AttributeMap = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

impl Filesystem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: FsConfig,
        nodes: Arc<dyn NodeStore>,
        blobs: BlobStore,
        locks: LockManager,
        quota: QuotaTracker,
        feed: ChangeFeed,
        bus: EventBus,
        jobs: Arc<dyn JobSink>,
        namespaces: NamespaceRegistry,
    ) -> Self {
        Self {
            config,
            nodes,
            blobs,
            acl: AccessControl::new(),
            locks,
            quota,
            feed,
            bus,
            jobs,
            namespaces,
            commit: Mutex::new(()),
        }
    }

    /// An engine with every backend in memory. Intended for tests and
    /// embedded deployments.
    pub fn in_memory(config: FsConfig) -> Self {
        use strata_blob::{InMemoryBlobIndex, InMemoryByteSink};
        use strata_delta::InMemoryDeltaLog;
        use strata_events::NullJobSink;
        use strata_lock::InMemoryLockStore;
        use strata_quota::InMemoryQuotaStore;

        use crate::store::InMemoryNodeStore;

        Self::new(
            config,
            Arc::new(InMemoryNodeStore::new()),
            BlobStore::new(
                Arc::new(InMemoryBlobIndex::new()),
                Arc::new(InMemoryByteSink::new()),
            ),
            LockManager::new(Arc::new(InMemoryLockStore::new())),
            QuotaTracker::new(Arc::new(InMemoryQuotaStore::new())),
            ChangeFeed::new(Arc::new(InMemoryDeltaLog::new())),
            EventBus::default(),
            Arc::new(NullJobSink),
            NamespaceRegistry::new(),
        )
    }

    /// The blob store, for reference inspection.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// The app-attribute namespace registry.
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    // -----------------------------------------------------------------------
    // Node CRUD
    // -----------------------------------------------------------------------

    /// Create a collection under `parent` (`None` for root level).
    pub fn create_collection(
        &self,
        caller: &Caller,
        parent: Option<NodeId>,
        name: &str,
        attrs: AttributeMap,
    ) -> FsResult<Node> {
        validate_node_name(name)?;
        self.check_attr_namespaces(&attrs)?;
        self.assert_parent_writable(caller, parent.as_ref())?;

        let _guard = self.commit_guard();
        self.assert_name_free(parent.as_ref(), name)?;

        let now = Timestamp::now();
        let mut node = Node::collection(parent, caller.user().clone(), name, now);
        node.app_attributes = attrs;
        self.nodes.insert(node.clone())?;

        self.log_delta(&node, Operation::Create, None)?;
        self.emit(FsEventKind::NodeCreated, &node, EventDetail::None);
        self.submit_job(JobKind::Index, &node);
        info!(node = %node.id.short(), name, "collection created");
        Ok(node)
    }

    /// Create a file under `parent`, streaming and deduplicating its
    /// content. Fails `Conflict` when the owner's hard quota would be
    /// exceeded; the staged blob reference is rolled back in that case.
    pub fn create_file(
        &self,
        caller: &Caller,
        parent: Option<NodeId>,
        name: &str,
        content: &mut dyn Read,
        attrs: AttributeMap,
    ) -> FsResult<Node> {
        validate_node_name(name)?;
        self.check_attr_namespaces(&attrs)?;
        let parent_node = self.assert_parent_writable(caller, parent.as_ref())?;
        let owner = caller.user().clone();

        let id = NodeId::generate();
        let blob = self.blobs.store(content, id, owner.clone())?;
        if let Err(e) = self.quota.assert_within_quota(&owner, blob.size) {
            self.blobs.release(&blob.hash, &id, &owner)?;
            return Err(e.into());
        }

        let _guard = self.commit_guard();
        if let Err(e) = self.assert_name_free(parent.as_ref(), name) {
            self.blobs.release(&blob.hash, &id, &owner)?;
            return Err(e);
        }

        let now = Timestamp::now();
        let node = Node {
            id,
            parent,
            owner: owner.clone(),
            name: name.to_string(),
            kind: NodeKind::File(FileState {
                hash: blob.hash,
                size: blob.size,
                version: 1,
            }),
            acl: AclSet::empty(),
            share: None,
            deleted: None,
            created: now,
            changed: now,
            app_attributes: attrs,
        };
        self.nodes.insert(node.clone())?;
        self.quota.charge(&owner, blob.size)?;
        if let Some((_, sid)) = self.share_context(parent_node.as_ref())? {
            self.blobs.add_share_ref(&blob.hash, id, sid)?;
        }

        self.log_delta(&node, Operation::Create, None)?;
        self.emit(
            FsEventKind::NodeCreated,
            &node,
            EventDetail::Content {
                hash: blob.hash,
                size: blob.size,
                version: 1,
            },
        );
        self.submit_job(JobKind::Scan, &node);
        self.submit_job(JobKind::Preview, &node);
        self.submit_job(JobKind::Index, &node);
        info!(node = %node.id.short(), name, size = blob.size, "file created");
        Ok(node)
    }

    /// Replace a file's content.
    ///
    /// With `force = false` the caller's `expected_version` must match
    /// the stored version or the write fails `Conflict` and the stored
    /// content is untouched. The version strictly increases on success,
    /// even when the new content hashes identically.
    pub fn put_file(
        &self,
        caller: &Caller,
        node_id: NodeId,
        expected_version: Option<u64>,
        force: bool,
        content: &mut dyn Read,
    ) -> FsResult<u64> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        let old = node.kind.file().ok_or(FsError::NotAFile(node_id))?.clone();
        self.assert_writable(caller, &node)?;
        if !force {
            if let Some(expected) = expected_version {
                if expected != old.version {
                    return Err(FsError::VersionMismatch {
                        node: node_id,
                        expected,
                        actual: old.version,
                    });
                }
            }
        }

        let owner = node.owner.clone();
        let blob = self.blobs.store(content, node_id, owner.clone())?;
        let rollback_new_ref = |fs: &Self| -> FsResult<()> {
            // Same digest as the live content means the upsert was a
            // set no-op; releasing would drop the live reference.
            let live_hash = fs
                .nodes
                .get(&node_id)?
                .and_then(|n| n.kind.file().map(|f| f.hash));
            if live_hash != Some(blob.hash) {
                fs.blobs.release(&blob.hash, &node_id, &owner)?;
            }
            Ok(())
        };
        let additional = blob.size.saturating_sub(old.size);
        if let Err(e) = self.quota.assert_within_quota(&owner, additional) {
            rollback_new_ref(self)?;
            return Err(e.into());
        }

        let _guard = self.commit_guard();
        // Re-read under the commit lock; a concurrent writer may have
        // landed while we were streaming.
        let mut node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        let current = node.kind.file().ok_or(FsError::NotAFile(node_id))?.clone();
        if !force && current.version != old.version {
            rollback_new_ref(self)?;
            return Err(FsError::VersionMismatch {
                node: node_id,
                expected: old.version,
                actual: current.version,
            });
        }

        let new_version = current.version + 1;
        node.kind = NodeKind::File(FileState {
            hash: blob.hash,
            size: blob.size,
            version: new_version,
        });
        node.changed = Timestamp::now();
        self.nodes.update(node.clone())?;

        let shared = self.share_context(Some(&node))?;
        if blob.hash != current.hash {
            if let Some((_, sid)) = &shared {
                self.blobs.add_share_ref(&blob.hash, node_id, sid.clone())?;
                self.blobs.remove_share_ref(&current.hash, &node_id, sid)?;
            }
            self.blobs.release(&current.hash, &node_id, &owner)?;
        }
        self.quota.release(&owner, current.size)?;
        self.quota.charge(&owner, blob.size)?;

        self.log_delta(&node, Operation::Update, Some(json!({ "version": new_version })))?;
        self.emit(
            FsEventKind::NodeUpdated,
            &node,
            EventDetail::Content {
                hash: blob.hash,
                size: blob.size,
                version: new_version,
            },
        );
        self.submit_job(JobKind::Scan, &node);
        self.submit_job(JobKind::Preview, &node);
        debug!(node = %node_id.short(), version = new_version, size = blob.size, "content replaced");
        Ok(blob.size)
    }

    /// Rename a node in place.
    pub fn rename(&self, caller: &Caller, node_id: NodeId, new_name: &str) -> FsResult<Node> {
        validate_node_name(new_name)?;
        let mut node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_writable(caller, &node)?;

        let _guard = self.commit_guard();
        if let Some(existing) = self.nodes.child_by_name(
            node.parent.as_ref(),
            new_name,
            DeletedPolicy::Exclude,
            self.config.case_insensitive_names,
        )? {
            // A case-only rename of the node itself is fine.
            if existing.id != node_id {
                return Err(FsError::NameExists {
                    name: new_name.to_string(),
                });
            }
        }

        let from = node.name.clone();
        node.name = new_name.to_string();
        node.changed = Timestamp::now();
        self.nodes.update(node.clone())?;

        self.log_delta(
            &node,
            Operation::Rename,
            Some(json!({ "from": from, "to": new_name })),
        )?;
        self.emit(
            FsEventKind::NodeRenamed,
            &node,
            EventDetail::Rename {
                from,
                to: new_name.to_string(),
            },
        );
        self.submit_job(JobKind::Index, &node);
        Ok(node)
    }

    /// Move a node into another collection (`None` for root level).
    pub fn move_node(
        &self,
        caller: &Caller,
        node_id: NodeId,
        new_parent: Option<NodeId>,
        policy: ConflictPolicy,
    ) -> FsResult<Node> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_writable(caller, &node)?;
        let dest = self.assert_parent_writable(caller, new_parent.as_ref())?;

        if new_parent == Some(node_id) || self.is_descendant(new_parent.as_ref(), &node_id)? {
            return Err(FsError::CantBeChildOfItself(node_id));
        }
        if self.subtree_has_share(&node)? && self.share_context(dest.as_ref())?.is_some() {
            return Err(FsError::SharedNodeCantBeChildOfShare(node_id));
        }

        let _guard = self.commit_guard();
        self.move_resolved(caller, node, new_parent, policy)
    }

    /// Copy a node (recursively for collections) into another collection.
    ///
    /// Copied files register a new strong reference to the existing
    /// blob; bytes are never duplicated. The copies are owned by the
    /// caller, start private, and files restart at version 1.
    pub fn copy_node(
        &self,
        caller: &Caller,
        node_id: NodeId,
        new_parent: Option<NodeId>,
        policy: ConflictPolicy,
    ) -> FsResult<Node> {
        let source = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_access(caller, &source, Privilege::Read)?;
        let dest = self.assert_parent_writable(caller, new_parent.as_ref())?;

        if new_parent == Some(node_id) || self.is_descendant(new_parent.as_ref(), &node_id)? {
            return Err(FsError::CantBeChildOfItself(node_id));
        }

        let total: u64 = self.live_file_sizes(&source)?;
        self.quota.assert_within_quota(caller.user(), total)?;

        let _guard = self.commit_guard();
        let name = self.resolve_collision(new_parent.as_ref(), &source.name, policy, true)?;
        let dest_share = self.share_context(dest.as_ref())?.map(|(_, sid)| sid);
        let copy = self.copy_subtree(caller, &source, new_parent, &name, &dest_share)?;

        self.log_delta(
            &copy,
            Operation::Copy,
            Some(json!({ "source": node_id.to_string() })),
        )?;
        self.emit(FsEventKind::NodeCopied, &copy, EventDetail::None);
        self.submit_job(JobKind::Index, &copy);
        info!(source = %node_id.short(), copy = %copy.id.short(), "node copied");
        Ok(copy)
    }

    /// Delete a node.
    ///
    /// Soft by default: the node and its live descendants are stamped
    /// with one delete timestamp, their quota charges are released, and
    /// their blob references move to trash references so the content
    /// stays restorable. With `force = true` the subtree is erased
    /// permanently and all its blob references are dropped.
    pub fn delete(&self, caller: &Caller, node_id: NodeId, force: bool) -> FsResult<()> {
        if force {
            let node = self.fetch(&node_id, DeletedPolicy::Include)?;
            self.assert_writable(caller, &node)?;
            let _guard = self.commit_guard();
            let node = self.fetch(&node_id, DeletedPolicy::Include)?;
            self.purge_subtree(&node)?;
            self.log_delta(&node, Operation::Purge, None)?;
            self.emit(FsEventKind::NodePurged, &node, EventDetail::None);
            self.submit_job(JobKind::Index, &node);
            info!(node = %node_id.short(), "node purged");
            return Ok(());
        }

        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_writable(caller, &node)?;

        let _guard = self.commit_guard();
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        let now = Timestamp::now();
        let mut affected = vec![node.clone()];
        self.collect_subtree(&node, DeletedPolicy::Exclude, &mut affected)?;
        for mut member in affected {
            member.deleted = Some(now);
            member.changed = now;
            self.nodes.update(member.clone())?;
            if let NodeKind::File(state) = &member.kind {
                // Trash reference first so the erase cannot fire while
                // the strong reference is being dropped.
                self.blobs.add_share_ref(&state.hash, member.id, trash_share())?;
                self.blobs.release(&state.hash, &member.id, &member.owner)?;
                self.quota.release(&member.owner, state.size)?;
            }
        }

        self.log_delta(&node, Operation::Delete, None)?;
        self.emit(FsEventKind::NodeDeleted, &node, EventDetail::None);
        self.submit_job(JobKind::Index, &node);
        info!(node = %node_id.short(), "node soft-deleted");
        Ok(())
    }

    /// Restore a soft-deleted node.
    ///
    /// Clears the delete marker on the node, on any trashed ancestors
    /// (so the node becomes reachable again), and on the descendants
    /// that were deleted in the same operation. Fails `NotFound` for
    /// force-deleted nodes.
    pub fn restore(&self, caller: &Caller, node_id: NodeId) -> FsResult<Node> {
        let node = self.fetch(&node_id, DeletedPolicy::Only)?;
        self.assert_access(caller, &node, Privilege::ReadWrite)?;

        let _guard = self.commit_guard();
        let node = self.fetch(&node_id, DeletedPolicy::Only)?;
        let stamp = node.deleted;

        // Trashed ancestors must come back too, or the node would be
        // restored into an invisible branch.
        let mut cursor = node.parent;
        while let Some(pid) = cursor {
            let ancestor = self.nodes.get(&pid)?.ok_or(FsError::NotFound(pid))?;
            cursor = ancestor.parent;
            if ancestor.deleted.is_some() {
                self.revive(ancestor)?;
            }
        }

        let mut affected = vec![node.clone()];
        let mut descendants = Vec::new();
        self.collect_subtree(&node, DeletedPolicy::Only, &mut descendants)?;
        affected.extend(descendants.into_iter().filter(|n| n.deleted == stamp));
        for member in affected {
            self.revive(member)?;
        }

        let restored = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.log_delta(&restored, Operation::Restore, None)?;
        self.emit(FsEventKind::NodeRestored, &restored, EventDetail::None);
        self.submit_job(JobKind::Index, &restored);
        info!(node = %node_id.short(), "node restored");
        Ok(restored)
    }

    // -----------------------------------------------------------------------
    // Lookup and listing
    // -----------------------------------------------------------------------

    /// Fetch a node by id, checked against the caller's read privilege
    /// and the deleted filter.
    pub fn find_node(
        &self,
        caller: &Caller,
        node_id: NodeId,
        expected: TypeFilter,
        policy: DeletedPolicy,
    ) -> FsResult<Node> {
        let node = self.fetch(&node_id, policy)?;
        expected.check(&node)?;
        self.assert_access(caller, &node, Privilege::Read)?;
        Ok(node)
    }

    /// Resolve a slash-separated path from the root.
    pub fn find_by_path(
        &self,
        caller: &Caller,
        path: &str,
        expected: TypeFilter,
        policy: DeletedPolicy,
    ) -> FsResult<Node> {
        let mut parent: Option<NodeId> = None;
        let mut found: Option<Node> = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            // A live child always shadows a trashed namesake; trash is
            // only walked when the caller's filter admits it.
            let live = self.nodes.child_by_name(
                parent.as_ref(),
                segment,
                DeletedPolicy::Exclude,
                self.config.case_insensitive_names,
            )?;
            let node = match live {
                Some(node) => node,
                None if policy.admits(true) => self
                    .nodes
                    .child_by_name(
                        parent.as_ref(),
                        segment,
                        DeletedPolicy::Only,
                        self.config.case_insensitive_names,
                    )?
                    .ok_or_else(|| FsError::PathNotFound(path.to_string()))?,
                None => return Err(FsError::PathNotFound(path.to_string())),
            };
            parent = Some(node.id);
            found = Some(node);
        }
        let node = found.ok_or_else(|| FsError::PathNotFound(path.to_string()))?;
        if !policy.admits(node.deleted.is_some()) {
            return Err(FsError::PathNotFound(path.to_string()));
        }
        expected.check(&node)?;
        self.assert_access(caller, &node, Privilege::Read)?;
        Ok(node)
    }

    /// Children of a collection the caller may read, sorted by name.
    pub fn list_children(
        &self,
        caller: &Caller,
        parent: Option<NodeId>,
        policy: DeletedPolicy,
    ) -> FsResult<Vec<Node>> {
        if let Some(pid) = parent {
            let parent_node = self.fetch(&pid, DeletedPolicy::Include)?;
            if !parent_node.kind.is_collection() {
                return Err(FsError::NotACollection(pid));
            }
            self.assert_access(caller, &parent_node, Privilege::Read)?;
        }
        let children = self.nodes.children(parent.as_ref(), policy)?;
        let mut visible = Vec::with_capacity(children.len());
        for child in children {
            if self.is_readable(caller, &child)? {
                visible.push(child);
            }
        }
        Ok(visible)
    }

    /// The roots of a user's trash: soft-deleted nodes whose parent is
    /// live (or gone).
    pub fn list_trash(&self, caller: &Caller, owner: &UserId) -> FsResult<Vec<Node>> {
        if !caller.principal.admin && caller.user() != owner {
            return Err(AccessError::forbidden(
                DenyCode::NotAllowedToAccess,
                "trash is visible to its owner only",
            )
            .into());
        }
        let mut roots = Vec::new();
        for node in self.nodes.by_owner(owner, DeletedPolicy::Only)? {
            let parent_trashed = match node.parent {
                Some(pid) => self
                    .nodes
                    .get(&pid)?
                    .is_some_and(|p| p.deleted.is_some()),
                None => false,
            };
            if !parent_trashed {
                roots.push(node);
            }
        }
        Ok(roots)
    }

    /// Erase trashed subtrees whose retention window has elapsed.
    /// Returns the number of trash roots purged. Maintenance entry
    /// point; no caller context.
    pub fn purge_expired(&self, now: Timestamp) -> FsResult<usize> {
        let cutoff = now.minus(self.config.trash_retention);
        let _guard = self.commit_guard();
        let mut purged = 0;
        for node in self.nodes.trashed()? {
            // Skip nodes purged as part of an earlier root this pass.
            let Some(node) = self.nodes.get(&node.id)? else {
                continue;
            };
            let Some(deleted) = node.deleted else {
                continue;
            };
            if cutoff.is_before(&deleted) {
                continue;
            }
            let parent_trashed = match node.parent {
                Some(pid) => self
                    .nodes
                    .get(&pid)?
                    .is_some_and(|p| p.deleted.is_some()),
                None => false,
            };
            if parent_trashed {
                continue;
            }
            self.purge_subtree(&node)?;
            self.log_delta(&node, Operation::Purge, Some(json!({ "expired": true })))?;
            self.emit(FsEventKind::NodePurged, &node, EventDetail::None);
            purged += 1;
        }
        if purged > 0 {
            info!(purged, "expired trash purged");
        }
        Ok(purged)
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    /// Open a reader over a file's content.
    pub fn read_file(&self, caller: &Caller, node_id: NodeId) -> FsResult<Box<dyn Read + Send>> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        let state = node.kind.file().ok_or(FsError::NotAFile(node_id))?;
        self.assert_access(caller, &node, Privilege::Read)?;
        Ok(self.blobs.retrieve(&state.hash)?)
    }

    /// Open a reader over a byte range of a file's content.
    pub fn read_file_range(
        &self,
        caller: &Caller,
        node_id: NodeId,
        range: std::ops::Range<u64>,
    ) -> FsResult<Box<dyn Read + Send>> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        let state = node.kind.file().ok_or(FsError::NotAFile(node_id))?;
        self.assert_access(caller, &node, Privilege::Read)?;
        Ok(self.blobs.retrieve_range(&state.hash, range)?)
    }

    // -----------------------------------------------------------------------
    // Shares
    // -----------------------------------------------------------------------

    /// Publish a node as a share root with the given rules.
    ///
    /// Fails `Conflict` when the node lies inside an existing share or
    /// its subtree already contains one: share roots never nest. File
    /// content in the shared subtree gains secondary blob references so
    /// it survives later owner deletion.
    pub fn set_acl(&self, caller: &Caller, node_id: NodeId, rules: AclSet) -> FsResult<ShareId> {
        if rules.is_empty() {
            return Err(FsError::InvalidArgument(
                "share rules must be non-empty; use unset_acl to unshare".to_string(),
            ));
        }
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_may_share(caller, &node)?;
        if self.share_context(Some(&node))?.is_some() && !node.is_share_root() {
            return Err(FsError::NestedShare(node_id));
        }
        if !node.is_share_root() && self.subtree_has_share(&node)? {
            return Err(FsError::NestedShare(node_id));
        }

        let _guard = self.commit_guard();
        let mut node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        let created = node.share.is_none();
        let share = node.share.clone().unwrap_or_else(ShareId::ephemeral);
        node.acl = rules;
        node.share = Some(share.clone());
        node.changed = Timestamp::now();
        self.nodes.update(node.clone())?;

        if created {
            let mut members = vec![node.clone()];
            self.collect_subtree(&node, DeletedPolicy::Exclude, &mut members)?;
            for member in &members {
                if let NodeKind::File(state) = &member.kind {
                    self.blobs.add_share_ref(&state.hash, member.id, share.clone())?;
                }
            }
        }

        self.log_delta(&node, Operation::Share, Some(json!({ "share": share.to_string() })))?;
        self.emit(
            FsEventKind::ShareCreated,
            &node,
            EventDetail::Share {
                share: share.clone(),
            },
        );
        self.submit_job(JobKind::Notify, &node);
        info!(node = %node_id.short(), share = %share, "share published");
        Ok(share)
    }

    /// Revert a share root to private, dropping the subtree's secondary
    /// blob references.
    pub fn unset_acl(&self, caller: &Caller, node_id: NodeId) -> FsResult<()> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_may_share(caller, &node)?;
        let Some(share) = node.share.clone() else {
            return Err(FsError::InvalidArgument(format!(
                "node {node_id} is not a share root"
            )));
        };

        let _guard = self.commit_guard();
        let mut node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        node.acl = AclSet::empty();
        node.share = None;
        node.changed = Timestamp::now();
        self.nodes.update(node.clone())?;

        let mut members = vec![node.clone()];
        self.collect_subtree(&node, DeletedPolicy::Include, &mut members)?;
        for member in &members {
            if let NodeKind::File(state) = &member.kind {
                // NotReferenced is fine: the file may have joined the
                // subtree after the share was published.
                self.blobs.remove_share_ref(&state.hash, &member.id, &share)?;
            }
        }

        self.log_delta(&node, Operation::Share, Some(json!({ "share": null })))?;
        self.emit(FsEventKind::ShareRemoved, &node, EventDetail::Share { share });
        self.submit_job(JobKind::Notify, &node);
        info!(node = %node_id.short(), "share removed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // App attributes
    // -----------------------------------------------------------------------

    /// Read one opaque attribute value.
    pub fn get_app_attribute(
        &self,
        caller: &Caller,
        node_id: NodeId,
        namespace: &str,
        key: &str,
    ) -> FsResult<Option<serde_json::Value>> {
        self.assert_namespace(namespace)?;
        let node = self.fetch(&node_id, DeletedPolicy::Include)?;
        self.assert_access(caller, &node, Privilege::Read)?;
        Ok(node
            .app_attributes
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    /// Merge values into a namespace. Existing keys are overwritten;
    /// unrelated keys are untouched.
    pub fn set_app_attributes(
        &self,
        caller: &Caller,
        node_id: NodeId,
        namespace: &str,
        values: BTreeMap<String, serde_json::Value>,
    ) -> FsResult<()> {
        self.assert_namespace(namespace)?;
        let node = self.fetch(&node_id, DeletedPolicy::Include)?;
        self.assert_access(caller, &node, Privilege::ReadWrite)?;

        let _guard = self.commit_guard();
        let mut node = self.fetch(&node_id, DeletedPolicy::Include)?;
        node.app_attributes
            .entry(namespace.to_string())
            .or_default()
            .extend(values);
        node.changed = Timestamp::now();
        self.nodes.update(node.clone())?;

        self.log_delta(&node, Operation::Update, Some(json!({ "app_namespace": namespace })))?;
        self.emit(FsEventKind::NodeUpdated, &node, EventDetail::None);
        Ok(())
    }

    /// Drop a whole namespace from a node.
    pub fn unset_app_attributes(
        &self,
        caller: &Caller,
        node_id: NodeId,
        namespace: &str,
    ) -> FsResult<()> {
        self.assert_namespace(namespace)?;
        let node = self.fetch(&node_id, DeletedPolicy::Include)?;
        self.assert_access(caller, &node, Privilege::ReadWrite)?;

        let _guard = self.commit_guard();
        let mut node = self.fetch(&node_id, DeletedPolicy::Include)?;
        node.app_attributes.remove(namespace);
        node.changed = Timestamp::now();
        self.nodes.update(node.clone())?;

        self.log_delta(&node, Operation::Update, Some(json!({ "app_namespace": namespace })))?;
        self.emit(FsEventKind::NodeUpdated, &node, EventDetail::None);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Locks
    // -----------------------------------------------------------------------

    /// Acquire or refresh a lock on a node.
    pub fn lock(
        &self,
        caller: &Caller,
        node_id: NodeId,
        token: Option<LockToken>,
        ttl: Option<Duration>,
        scope: LockScope,
    ) -> FsResult<Lock> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_access(caller, &node, Privilege::ReadWrite)?;
        let ttl = ttl.unwrap_or(self.config.default_lock_ttl);
        Ok(self.locks.lock(
            node_id,
            token,
            Some(ttl),
            caller.user().as_str(),
            scope,
            Timestamp::now(),
        )?)
    }

    /// Release a lock.
    pub fn unlock(&self, caller: &Caller, node_id: NodeId, token: &LockToken) -> FsResult<()> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_access(caller, &node, Privilege::ReadWrite)?;
        Ok(self.locks.unlock(&node_id, token, Timestamp::now())?)
    }

    /// Extend a lock's lifetime.
    pub fn refresh_lock(
        &self,
        caller: &Caller,
        node_id: NodeId,
        token: &LockToken,
        ttl: Option<Duration>,
    ) -> FsResult<Lock> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_access(caller, &node, Privilege::ReadWrite)?;
        let ttl = ttl.unwrap_or(self.config.default_lock_ttl);
        Ok(self
            .locks
            .refresh(&node_id, token, Some(ttl), Timestamp::now())?)
    }

    /// Read the live lock on a node.
    pub fn get_lock(&self, caller: &Caller, node_id: NodeId) -> FsResult<Lock> {
        let node = self.fetch(&node_id, DeletedPolicy::Exclude)?;
        self.assert_access(caller, &node, Privilege::Read)?;
        Ok(self.locks.get_lock(&node_id, Timestamp::now())?)
    }

    // -----------------------------------------------------------------------
    // Change feed, events, quota
    // -----------------------------------------------------------------------

    /// A cursor representing "now"; clients bootstrap sync from it.
    pub fn latest_cursor(&self) -> FsResult<Cursor> {
        Ok(self.feed.last_cursor(Timestamp::now())?)
    }

    /// Changes committed strictly after `cursor`, up to `limit`.
    pub fn changes(&self, cursor: &Cursor, limit: usize) -> FsResult<DeltaPage> {
        Ok(self.feed.get_delta(cursor, limit, Timestamp::now())?)
    }

    /// The most recent feed record for a node, if still retained.
    pub fn last_change_for(&self, node: &NodeId) -> FsResult<Option<DeltaRecord>> {
        Ok(self.feed.last_record_for_node(node)?)
    }

    /// Subscribe to mutation events.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.bus.subscribe(filter)
    }

    /// A user's quota report. Visible to the user and to admins.
    pub fn quota_report(&self, caller: &Caller, user: &UserId) -> FsResult<QuotaReport> {
        if !caller.principal.admin && caller.user() != user {
            return Err(AccessError::forbidden(
                DenyCode::NotAllowedToAccess,
                "quota is visible to its owner only",
            )
            .into());
        }
        Ok(self.quota.report(user)?)
    }

    /// Configure a user's quota limits. Admin only.
    pub fn set_quota_limits(
        &self,
        caller: &Caller,
        user: &UserId,
        soft: Option<u64>,
        hard: Option<u64>,
    ) -> FsResult<()> {
        self.acl.assert_admin(&caller.principal)?;
        Ok(self.quota.set_limits(user, soft, hard)?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn commit_guard(&self) -> MutexGuard<'_, ()> {
        self.commit.lock().expect("commit lock poisoned")
    }

    fn fetch(&self, id: &NodeId, policy: DeletedPolicy) -> FsResult<Node> {
        match self.nodes.get(id)? {
            Some(node) if policy.admits(node.deleted.is_some()) => Ok(node),
            _ => Err(FsError::NotFound(*id)),
        }
    }

    fn assert_namespace(&self, namespace: &str) -> FsResult<()> {
        if self.namespaces.is_registered(namespace) {
            Ok(())
        } else {
            Err(FsError::UnknownNamespace(namespace.to_string()))
        }
    }

    fn check_attr_namespaces(&self, attrs: &AttributeMap) -> FsResult<()> {
        for namespace in attrs.keys() {
            self.assert_namespace(namespace)?;
        }
        Ok(())
    }

    /// Resolve the parent, require it to be a live collection, and check
    /// the caller may write into it. Root level (`None`) is open to any
    /// authenticated principal.
    fn assert_parent_writable(
        &self,
        caller: &Caller,
        parent: Option<&NodeId>,
    ) -> FsResult<Option<Node>> {
        let Some(pid) = parent else {
            return Ok(None);
        };
        let node = self.fetch(pid, DeletedPolicy::Exclude)?;
        if !node.kind.is_collection() {
            return Err(FsError::NotACollection(*pid));
        }
        self.assert_access(caller, &node, Privilege::ReadWrite)?;
        Ok(Some(node))
    }

    fn assert_access(&self, caller: &Caller, node: &Node, privilege: Privilege) -> FsResult<()> {
        let inherited = self.inherited_rules(node)?;
        let ctx = AclContext {
            owner: Some(&node.owner),
            own_rules: (!node.acl.is_empty()).then_some(&node.acl),
            inherited_rules: inherited.as_ref(),
        };
        self.acl.assert_allowed(&caller.principal, &ctx, privilege)?;
        Ok(())
    }

    fn is_readable(&self, caller: &Caller, node: &Node) -> FsResult<bool> {
        let inherited = self.inherited_rules(node)?;
        let ctx = AclContext {
            owner: Some(&node.owner),
            own_rules: (!node.acl.is_empty()).then_some(&node.acl),
            inherited_rules: inherited.as_ref(),
        };
        Ok(self.acl.is_allowed(&caller.principal, &ctx, Privilege::Read))
    }

    /// Write access plus lock admission for the token the caller holds.
    fn assert_writable(&self, caller: &Caller, node: &Node) -> FsResult<()> {
        self.assert_access(caller, node, Privilege::ReadWrite)?;
        if !self
            .locks
            .may_write(&node.id, caller.lock_token.as_ref(), Timestamp::now())?
        {
            return Err(LockError::Locked { node: node.id }.into());
        }
        Ok(())
    }

    /// Only the owner or an admin may change a node's share rules.
    fn assert_may_share(&self, caller: &Caller, node: &Node) -> FsResult<()> {
        if caller.principal.admin || caller.principal.owns(&node.owner) {
            Ok(())
        } else {
            Err(AccessError::forbidden(
                DenyCode::NotAllowedToShare,
                format!("principal {} may not share node {}", caller.user(), node.id),
            )
            .into())
        }
    }

    /// Rules inherited from the nearest ancestor share root, unless the
    /// node carries its own.
    fn inherited_rules(&self, node: &Node) -> FsResult<Option<AclSet>> {
        if node.is_share_root() {
            return Ok(None);
        }
        let mut cursor = node.parent;
        while let Some(pid) = cursor {
            let ancestor = self.nodes.get(&pid)?.ok_or(FsError::NotFound(pid))?;
            if ancestor.is_share_root() {
                return Ok(Some(ancestor.acl.clone()));
            }
            cursor = ancestor.parent;
        }
        Ok(None)
    }

    /// The share root governing a node (itself or the nearest shared
    /// ancestor). `None` when given `None` or when nothing is shared.
    fn share_context(&self, node: Option<&Node>) -> FsResult<Option<(NodeId, ShareId)>> {
        let Some(node) = node else {
            return Ok(None);
        };
        if let Some(share) = &node.share {
            return Ok(Some((node.id, share.clone())));
        }
        let mut cursor = node.parent;
        while let Some(pid) = cursor {
            let ancestor = self.nodes.get(&pid)?.ok_or(FsError::NotFound(pid))?;
            if let Some(share) = &ancestor.share {
                return Ok(Some((ancestor.id, share.clone())));
            }
            cursor = ancestor.parent;
        }
        Ok(None)
    }

    fn subtree_has_share(&self, node: &Node) -> FsResult<bool> {
        if node.is_share_root() {
            return Ok(true);
        }
        for child in self.nodes.children(Some(&node.id), DeletedPolicy::Include)? {
            if self.subtree_has_share(&child)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_descendant(&self, candidate: Option<&NodeId>, ancestor: &NodeId) -> FsResult<bool> {
        let mut cursor = candidate.copied();
        while let Some(id) = cursor {
            if id == *ancestor {
                return Ok(true);
            }
            cursor = self.nodes.get(&id)?.and_then(|n| n.parent);
        }
        Ok(false)
    }

    fn assert_name_free(&self, parent: Option<&NodeId>, name: &str) -> FsResult<()> {
        if self
            .nodes
            .child_by_name(
                parent,
                name,
                DeletedPolicy::Exclude,
                self.config.case_insensitive_names,
            )?
            .is_some()
        {
            return Err(FsError::NameExists {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Apply the conflict policy to a destination name. With
    /// `merge_as_rename` the `Merge` policy degrades to `Rename`.
    fn resolve_collision(
        &self,
        parent: Option<&NodeId>,
        name: &str,
        policy: ConflictPolicy,
        merge_as_rename: bool,
    ) -> FsResult<String> {
        let taken = |candidate: &str| {
            self.nodes
                .child_by_name(
                    parent,
                    candidate,
                    DeletedPolicy::Exclude,
                    self.config.case_insensitive_names,
                )
                .map(|n| n.is_some())
                .unwrap_or(true)
        };
        if !taken(name) {
            return Ok(name.to_string());
        }
        match policy {
            ConflictPolicy::Reject => Err(FsError::NameExists {
                name: name.to_string(),
            }),
            ConflictPolicy::Rename => Ok(deconflicted_name(name, &taken)),
            ConflictPolicy::Merge if merge_as_rename => Ok(deconflicted_name(name, &taken)),
            ConflictPolicy::Merge => Ok(name.to_string()),
        }
    }

    /// Descendants of `node` passing the filter, depth-first.
    fn collect_subtree(
        &self,
        node: &Node,
        policy: DeletedPolicy,
        out: &mut Vec<Node>,
    ) -> FsResult<()> {
        for child in self.nodes.children(Some(&node.id), policy)? {
            self.collect_subtree(&child, policy, out)?;
            out.push(child);
        }
        Ok(())
    }

    fn live_file_sizes(&self, node: &Node) -> FsResult<u64> {
        let mut members = vec![node.clone()];
        self.collect_subtree(node, DeletedPolicy::Exclude, &mut members)?;
        Ok(members
            .iter()
            .filter_map(|n| n.kind.file().map(|f| f.size))
            .sum())
    }

    fn move_resolved(
        &self,
        caller: &Caller,
        mut node: Node,
        new_parent: Option<NodeId>,
        policy: ConflictPolicy,
    ) -> FsResult<Node> {
        let existing = self.nodes.child_by_name(
            new_parent.as_ref(),
            &node.name,
            DeletedPolicy::Exclude,
            self.config.case_insensitive_names,
        )?;
        let existing = existing.filter(|e| e.id != node.id);

        if let Some(existing) = existing {
            match policy {
                ConflictPolicy::Reject => {
                    return Err(FsError::NameExists { name: node.name });
                }
                ConflictPolicy::Rename => {
                    node.name = self.resolve_collision(
                        new_parent.as_ref(),
                        &node.name,
                        ConflictPolicy::Rename,
                        false,
                    )?;
                }
                ConflictPolicy::Merge => {
                    if node.kind.is_collection() && existing.kind.is_collection() {
                        return self.merge_collections(caller, node, existing);
                    }
                    // A file replaces the colliding destination node.
                    self.purge_subtree(&existing)?;
                    self.log_delta(&existing, Operation::Purge, None)?;
                    self.emit(FsEventKind::NodePurged, &existing, EventDetail::None);
                }
            }
        }

        // Crossing a share boundary re-keys secondary blob references.
        // A share root carries its own context wherever it lands.
        let source_share = self.share_context(Some(&node))?.map(|(_, sid)| sid);
        let dest_share = if node.share.is_some() {
            source_share.clone()
        } else {
            match &new_parent {
                Some(pid) => {
                    let dest = self.fetch(pid, DeletedPolicy::Include)?;
                    self.share_context(Some(&dest))?.map(|(_, sid)| sid)
                }
                None => None,
            }
        };

        let previous = node.parent;
        node.parent = new_parent;
        node.changed = Timestamp::now();
        self.nodes.update(node.clone())?;

        if source_share != dest_share {
            let mut members = vec![node.clone()];
            self.collect_subtree(&node, DeletedPolicy::Include, &mut members)?;
            for member in &members {
                if let NodeKind::File(state) = &member.kind {
                    // New reference before the old one drops; trashed
                    // files hold only their trash reference otherwise.
                    if member.is_live() {
                        if let Some(sid) = &dest_share {
                            self.blobs.add_share_ref(&state.hash, member.id, sid.clone())?;
                        }
                    }
                    if let Some(sid) = &source_share {
                        self.blobs.remove_share_ref(&state.hash, &member.id, sid)?;
                    }
                }
            }
        }

        self.log_delta(
            &node,
            Operation::Move,
            Some(json!({
                "previous_parent": previous.map(|p| p.to_string()),
            })),
        )?;
        self.emit(
            FsEventKind::NodeMoved,
            &node,
            EventDetail::Move {
                from_parent: previous,
                to_parent: new_parent,
            },
        );
        self.submit_job(JobKind::Index, &node);
        debug!(node = %node.id.short(), "node moved");
        Ok(node)
    }

    /// Merge `source` into `target`: every child of `source` moves into
    /// `target` (recursively merging on further collisions), then the
    /// drained source collection is removed.
    fn merge_collections(&self, caller: &Caller, source: Node, target: Node) -> FsResult<Node> {
        for child in self.nodes.children(Some(&source.id), DeletedPolicy::Exclude)? {
            self.move_resolved(caller, child, Some(target.id), ConflictPolicy::Merge)?;
        }
        // Anything still inside is trash; it rides along into oblivion.
        self.purge_subtree(&source)?;
        self.log_delta(&source, Operation::Purge, Some(json!({ "merged_into": target.id.to_string() })))?;
        self.emit(FsEventKind::NodeMoved, &target, EventDetail::None);
        Ok(target)
    }

    fn copy_subtree(
        &self,
        caller: &Caller,
        source: &Node,
        parent: Option<NodeId>,
        name: &str,
        dest_share: &Option<ShareId>,
    ) -> FsResult<Node> {
        let now = Timestamp::now();
        let owner = caller.user().clone();
        let id = NodeId::generate();
        let kind = match &source.kind {
            NodeKind::Collection => NodeKind::Collection,
            NodeKind::File(state) => {
                let blob = self.blobs.reference(&state.hash, id, owner.clone())?;
                self.quota.charge(&owner, blob.size)?;
                if let Some(sid) = dest_share {
                    self.blobs.add_share_ref(&state.hash, id, sid.clone())?;
                }
                NodeKind::File(FileState {
                    hash: state.hash,
                    size: state.size,
                    version: 1,
                })
            }
        };
        let node = Node {
            id,
            parent,
            owner,
            name: name.to_string(),
            kind,
            // Copies start private; share rules do not travel.
            acl: AclSet::empty(),
            share: None,
            deleted: None,
            created: now,
            changed: now,
            app_attributes: source.app_attributes.clone(),
        };
        self.nodes.insert(node.clone())?;

        for child in self.nodes.children(Some(&source.id), DeletedPolicy::Exclude)? {
            self.copy_subtree(caller, &child, Some(id), &child.name, dest_share)?;
        }
        Ok(node)
    }

    /// Erase a subtree permanently, dropping every blob reference it
    /// holds. Processes children before parents so share context stays
    /// resolvable throughout.
    fn purge_subtree(&self, root: &Node) -> FsResult<()> {
        let mut members = Vec::new();
        self.collect_subtree(root, DeletedPolicy::Include, &mut members)?;
        members.push(root.clone());

        // Resolve share context before any record disappears.
        let mut shares = Vec::with_capacity(members.len());
        for member in &members {
            shares.push(self.share_context(Some(member))?);
        }

        for (member, shared) in members.iter().zip(shares) {
            if let NodeKind::File(state) = &member.kind {
                if let Some((_, sid)) = shared {
                    self.blobs.remove_share_ref(&state.hash, &member.id, &sid)?;
                }
                if member.deleted.is_some() {
                    self.blobs
                        .remove_share_ref(&state.hash, &member.id, &trash_share())?;
                } else {
                    self.quota.release(&member.owner, state.size)?;
                    self.blobs.release(&state.hash, &member.id, &member.owner)?;
                }
            }
            self.nodes.remove(&member.id)?;
        }
        Ok(())
    }

    /// Bring one trashed node back to life, restoring its quota charge
    /// and swapping its trash reference back to a strong one.
    fn revive(&self, mut node: Node) -> FsResult<()> {
        node.deleted = None;
        node.changed = Timestamp::now();
        self.nodes.update(node.clone())?;
        if let NodeKind::File(state) = &node.kind {
            // Strong reference first; dropping the trash reference
            // before it lands could erase the bytes.
            self.blobs.reference(&state.hash, node.id, node.owner.clone())?;
            self.blobs
                .remove_share_ref(&state.hash, &node.id, &trash_share())?;
            self.quota.charge(&node.owner, state.size)?;
        }
        Ok(())
    }

    fn log_delta(
        &self,
        node: &Node,
        operation: Operation,
        extra: Option<serde_json::Value>,
    ) -> FsResult<()> {
        let mut record = DeltaRecord::new(
            node.id,
            node.owner.clone(),
            operation,
            Timestamp::now(),
            node.name.clone(),
            node.parent,
        );
        if let Some(extra) = extra {
            record = record.with_extra(extra);
        }
        self.feed.append(record)?;
        Ok(())
    }

    fn emit(&self, kind: FsEventKind, node: &Node, detail: EventDetail) {
        self.bus.publish(
            &FsEvent::new(kind, node.id, node.owner.clone(), Timestamp::now()).with_detail(detail),
        );
    }

    fn submit_job(&self, kind: JobKind, node: &Node) {
        self.jobs.submit(
            kind,
            json!({
                "node": node.id.to_string(),
                "name": node.name,
                "owner": node.owner.to_string(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_acl::AclRule;
    use strata_types::GroupId;

    fn fs() -> Filesystem {
        Filesystem::in_memory(FsConfig::default())
    }

    fn fs_ci() -> Filesystem {
        Filesystem::in_memory(FsConfig {
            case_insensitive_names: true,
            ..FsConfig::default()
        })
    }

    fn alice() -> Caller {
        Caller::new(Principal::user("alice"))
    }

    fn bob() -> Caller {
        Caller::new(Principal::user("bob"))
    }

    fn admin() -> Caller {
        Caller::new(Principal::admin("root"))
    }

    fn no_attrs() -> AttributeMap {
        AttributeMap::new()
    }

    fn read_all(mut r: Box<dyn Read + Send>) -> Vec<u8> {
        let mut buf = Vec::new();
        r.read_to_end(&mut buf).unwrap();
        buf
    }

    fn make_file(fs: &Filesystem, caller: &Caller, parent: Option<NodeId>, name: &str, content: &[u8]) -> Node {
        fs.create_file(caller, parent, name, &mut &content[..], no_attrs())
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Creation and naming
    // -----------------------------------------------------------------------

    #[test]
    fn create_collection_and_file() {
        let fs = fs();
        let docs = fs
            .create_collection(&alice(), None, "docs", no_attrs())
            .unwrap();
        let file = make_file(&fs, &alice(), Some(docs.id), "a.txt", b"hello");
        assert_eq!(file.kind.file().unwrap().size, 5);
        assert_eq!(read_all(fs.read_file(&alice(), file.id).unwrap()), b"hello");
    }

    #[test]
    fn sibling_name_conflict_fails() {
        let fs = fs();
        fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        let err = fs
            .create_collection(&alice(), None, "docs", no_attrs())
            .unwrap_err();
        assert!(matches!(err, FsError::NameExists { .. }));
    }

    #[test]
    fn case_insensitive_conflicts_when_configured() {
        let fs = fs_ci();
        fs.create_collection(&alice(), None, "Docs", no_attrs()).unwrap();
        assert!(matches!(
            fs.create_collection(&alice(), None, "docs", no_attrs()),
            Err(FsError::NameExists { .. })
        ));
    }

    #[test]
    fn invalid_names_rejected() {
        let fs = fs();
        for name in ["", "a/b", "..", "a\0b"] {
            assert!(matches!(
                fs.create_collection(&alice(), None, name, no_attrs()),
                Err(FsError::InvalidName { .. })
            ));
        }
    }

    #[test]
    fn create_under_file_fails() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"x");
        assert!(matches!(
            fs.create_collection(&alice(), Some(file.id), "sub", no_attrs()),
            Err(FsError::NotACollection(_))
        ));
    }

    #[test]
    fn create_under_deleted_parent_fails_not_found() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        fs.delete(&alice(), docs.id, false).unwrap();
        assert!(matches!(
            fs.create_collection(&alice(), Some(docs.id), "sub", no_attrs()),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn unregistered_attr_namespace_rejected() {
        let fs = fs();
        let mut attrs = AttributeMap::new();
        attrs
            .entry("mystery".to_string())
            .or_default()
            .insert("k".to_string(), json!(1));
        assert!(matches!(
            fs.create_collection(&alice(), None, "docs", attrs),
            Err(FsError::UnknownNamespace(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Content replace and versioning
    // -----------------------------------------------------------------------

    #[test]
    fn put_file_increments_version() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"one");
        fs.put_file(&alice(), file.id, Some(1), false, &mut &b"two"[..])
            .unwrap();
        let node = fs
            .find_node(&alice(), file.id, TypeFilter::File, DeletedPolicy::Exclude)
            .unwrap();
        assert_eq!(node.kind.file().unwrap().version, 2);
        assert_eq!(read_all(fs.read_file(&alice(), file.id).unwrap()), b"two");
    }

    #[test]
    fn stale_version_fails_conflict_and_keeps_content() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"one");
        fs.put_file(&alice(), file.id, Some(1), false, &mut &b"two"[..])
            .unwrap();

        let err = fs
            .put_file(&alice(), file.id, Some(1), false, &mut &b"three"[..])
            .unwrap_err();
        assert!(matches!(err, FsError::VersionMismatch { actual: 2, .. }));
        assert_eq!(read_all(fs.read_file(&alice(), file.id).unwrap()), b"two");
        let node = fs
            .find_node(&alice(), file.id, TypeFilter::File, DeletedPolicy::Exclude)
            .unwrap();
        assert_eq!(node.kind.file().unwrap().version, 2);
    }

    #[test]
    fn force_put_ignores_version_but_still_increments() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"one");
        fs.put_file(&alice(), file.id, Some(999), true, &mut &b"two"[..])
            .unwrap();
        let node = fs
            .find_node(&alice(), file.id, TypeFilter::File, DeletedPolicy::Exclude)
            .unwrap();
        assert_eq!(node.kind.file().unwrap().version, 2);
    }

    #[test]
    fn identical_content_put_still_bumps_version() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"same");
        fs.put_file(&alice(), file.id, Some(1), false, &mut &b"same"[..])
            .unwrap();
        let node = fs
            .find_node(&alice(), file.id, TypeFilter::File, DeletedPolicy::Exclude)
            .unwrap();
        assert_eq!(node.kind.file().unwrap().version, 2);
        assert_eq!(read_all(fs.read_file(&alice(), file.id).unwrap()), b"same");
    }

    #[test]
    fn old_content_released_on_replace() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"old bytes");
        let old_hash = file.kind.file().unwrap().hash;
        fs.put_file(&alice(), file.id, None, false, &mut &b"new"[..])
            .unwrap();
        assert!(fs.blobs().entry(&old_hash).unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Rename and move
    // -----------------------------------------------------------------------

    #[test]
    fn rename_logs_old_and_new_name() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"x");
        let renamed = fs.rename(&alice(), file.id, "b.txt").unwrap();
        assert_eq!(renamed.name, "b.txt");
        let last = fs.last_change_for(&file.id).unwrap().unwrap();
        assert_eq!(last.operation, Operation::Rename);
        assert_eq!(last.extra.unwrap()["from"], "a.txt");
    }

    #[test]
    fn case_only_rename_is_allowed_under_ci_policy() {
        let fs = fs_ci();
        let file = make_file(&fs, &alice(), None, "a.txt", b"x");
        let renamed = fs.rename(&alice(), file.id, "A.TXT").unwrap();
        assert_eq!(renamed.name, "A.TXT");
    }

    #[test]
    fn move_into_own_subtree_fails() {
        let fs = fs();
        let outer = fs.create_collection(&alice(), None, "outer", no_attrs()).unwrap();
        let inner = fs
            .create_collection(&alice(), Some(outer.id), "inner", no_attrs())
            .unwrap();
        assert!(matches!(
            fs.move_node(&alice(), outer.id, Some(inner.id), ConflictPolicy::Reject),
            Err(FsError::CantBeChildOfItself(_))
        ));
        assert!(matches!(
            fs.move_node(&alice(), outer.id, Some(outer.id), ConflictPolicy::Reject),
            Err(FsError::CantBeChildOfItself(_))
        ));
    }

    #[test]
    fn move_conflict_policies() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        make_file(&fs, &alice(), Some(docs.id), "a.txt", b"kept");
        let loose = make_file(&fs, &alice(), None, "a.txt", b"moved");

        assert!(matches!(
            fs.move_node(&alice(), loose.id, Some(docs.id), ConflictPolicy::Reject),
            Err(FsError::NameExists { .. })
        ));

        let moved = fs
            .move_node(&alice(), loose.id, Some(docs.id), ConflictPolicy::Rename)
            .unwrap();
        assert_eq!(moved.name, "a (2).txt");
        assert_eq!(moved.parent, Some(docs.id));
    }

    #[test]
    fn merge_moves_children_and_dissolves_source() {
        let fs = fs();
        let a = fs.create_collection(&alice(), None, "a", no_attrs()).unwrap();
        let dest = fs.create_collection(&alice(), None, "dest", no_attrs()).unwrap();
        let a2 = fs
            .create_collection(&alice(), Some(a.id), "docs", no_attrs())
            .unwrap();
        make_file(&fs, &alice(), Some(a2.id), "f.txt", b"inner");
        let existing = fs
            .create_collection(&alice(), Some(dest.id), "docs", no_attrs())
            .unwrap();

        fs.move_node(&alice(), a2.id, Some(dest.id), ConflictPolicy::Merge)
            .unwrap();

        // a2 dissolved into `existing`; its file lives there now.
        assert!(fs
            .find_node(&alice(), a2.id, TypeFilter::Any, DeletedPolicy::Include)
            .is_err());
        let children = fs
            .list_children(&alice(), Some(existing.id), DeletedPolicy::Exclude)
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "f.txt");
    }

    #[test]
    fn moving_share_under_share_fails() {
        let fs = fs();
        let a = fs.create_collection(&alice(), None, "a", no_attrs()).unwrap();
        let b = fs.create_collection(&alice(), None, "b", no_attrs()).unwrap();
        fs.set_acl(
            &alice(),
            a.id,
            AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]),
        )
        .unwrap();
        fs.set_acl(
            &alice(),
            b.id,
            AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]),
        )
        .unwrap();
        assert!(matches!(
            fs.move_node(&alice(), a.id, Some(b.id), ConflictPolicy::Reject),
            Err(FsError::SharedNodeCantBeChildOfShare(_))
        ));
    }

    #[test]
    fn move_out_of_share_drops_the_share_refs() {
        let fs = fs();
        let shared = fs.create_collection(&alice(), None, "shared", no_attrs()).unwrap();
        let sub = fs
            .create_collection(&alice(), Some(shared.id), "sub", no_attrs())
            .unwrap();
        let file = make_file(&fs, &alice(), Some(sub.id), "a.txt", b"payload");
        let hash = file.kind.file().unwrap().hash;
        fs.set_acl(
            &alice(),
            shared.id,
            AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]),
        )
        .unwrap();
        assert_eq!(fs.blobs().entry(&hash).unwrap().unwrap().share_refs.len(), 1);

        let keep = fs.create_collection(&alice(), None, "keep", no_attrs()).unwrap();
        fs.move_node(&alice(), sub.id, Some(keep.id), ConflictPolicy::Reject)
            .unwrap();
        let entry = fs.blobs().entry(&hash).unwrap().unwrap();
        assert!(entry.share_refs.is_empty());
        assert_eq!(entry.ref_count(), 1);

        // The strong reference is the only thing keeping the bytes now.
        fs.delete(&alice(), file.id, true).unwrap();
        assert!(fs.blobs().entry(&hash).unwrap().is_none());
    }

    #[test]
    fn move_into_share_gains_a_share_ref() {
        let fs = fs();
        let shared = fs.create_collection(&alice(), None, "shared", no_attrs()).unwrap();
        fs.set_acl(
            &alice(),
            shared.id,
            AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]),
        )
        .unwrap();
        let file = make_file(&fs, &alice(), None, "a.txt", b"payload");
        let hash = file.kind.file().unwrap().hash;
        assert!(fs.blobs().entry(&hash).unwrap().unwrap().share_refs.is_empty());

        fs.move_node(&alice(), file.id, Some(shared.id), ConflictPolicy::Reject)
            .unwrap();
        let entry = fs.blobs().entry(&hash).unwrap().unwrap();
        assert_eq!(entry.share_refs.len(), 1);

        // Bob now reads the file through the share it moved into.
        assert_eq!(read_all(fs.read_file(&bob(), file.id).unwrap()), b"payload");
    }

    // -----------------------------------------------------------------------
    // Copy
    // -----------------------------------------------------------------------

    #[test]
    fn copy_shares_the_blob() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"payload");
        let hash = file.kind.file().unwrap().hash;
        let dest = fs.create_collection(&alice(), None, "dest", no_attrs()).unwrap();

        let copy = fs
            .copy_node(&alice(), file.id, Some(dest.id), ConflictPolicy::Reject)
            .unwrap();
        assert_ne!(copy.id, file.id);
        assert_eq!(copy.kind.file().unwrap().hash, hash);
        assert_eq!(copy.kind.file().unwrap().version, 1);
        assert_eq!(fs.blobs().entry(&hash).unwrap().unwrap().ref_count(), 2);
        assert_eq!(read_all(fs.read_file(&alice(), copy.id).unwrap()), b"payload");
    }

    #[test]
    fn copy_collection_is_recursive() {
        let fs = fs();
        let src = fs.create_collection(&alice(), None, "src", no_attrs()).unwrap();
        let sub = fs
            .create_collection(&alice(), Some(src.id), "sub", no_attrs())
            .unwrap();
        make_file(&fs, &alice(), Some(sub.id), "deep.txt", b"deep");
        let dest = fs.create_collection(&alice(), None, "dest", no_attrs()).unwrap();

        let copy = fs
            .copy_node(&alice(), src.id, Some(dest.id), ConflictPolicy::Reject)
            .unwrap();
        let copied_sub = fs
            .find_by_path(&alice(), "dest/src/sub", TypeFilter::Collection, DeletedPolicy::Exclude)
            .unwrap();
        assert_eq!(copied_sub.parent, Some(copy.id));
        let deep = fs
            .find_by_path(&alice(), "dest/src/sub/deep.txt", TypeFilter::File, DeletedPolicy::Exclude)
            .unwrap();
        assert_eq!(read_all(fs.read_file(&alice(), deep.id).unwrap()), b"deep");
    }

    #[test]
    fn copy_charges_the_copier() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        make_file(&fs, &alice(), Some(docs.id), "a.txt", b"12345");
        fs.set_acl(
            &alice(),
            docs.id,
            AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]),
        )
        .unwrap();
        let dest = fs.create_collection(&bob(), None, "mine", no_attrs()).unwrap();
        fs.copy_node(&bob(), docs.id, Some(dest.id), ConflictPolicy::Reject)
            .unwrap();
        assert_eq!(
            fs.quota_report(&bob(), &UserId::from("bob")).unwrap().used,
            5
        );
    }

    // -----------------------------------------------------------------------
    // Delete, restore, trash
    // -----------------------------------------------------------------------

    #[test]
    fn recreated_name_shadows_its_trashed_twin_in_paths() {
        // Sibling order in the backing store is arbitrary, so run the
        // scenario against several independent stores.
        for _ in 0..8 {
            let fs = fs();
            let old = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
            fs.delete(&alice(), old.id, false).unwrap();
            let fresh = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
            let file = make_file(&fs, &alice(), Some(fresh.id), "a.txt", b"x");

            let resolved = fs
                .find_by_path(&alice(), "docs", TypeFilter::Collection, DeletedPolicy::Exclude)
                .unwrap();
            assert_eq!(resolved.id, fresh.id);
            let deep = fs
                .find_by_path(&alice(), "docs/a.txt", TypeFilter::File, DeletedPolicy::Exclude)
                .unwrap();
            assert_eq!(deep.id, file.id);

            // While a live twin exists the trashed one is shadowed.
            assert!(matches!(
                fs.find_by_path(&alice(), "docs", TypeFilter::Collection, DeletedPolicy::Only),
                Err(FsError::PathNotFound(_))
            ));
        }
    }

    #[test]
    fn soft_delete_then_restore_roundtrip() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        let file = make_file(&fs, &alice(), Some(docs.id), "a.txt", b"keep me");

        fs.delete(&alice(), docs.id, false).unwrap();
        assert!(matches!(
            fs.find_node(&alice(), file.id, TypeFilter::Any, DeletedPolicy::Exclude),
            Err(FsError::NotFound(_))
        ));

        fs.restore(&alice(), docs.id).unwrap();
        let back = fs
            .find_node(&alice(), file.id, TypeFilter::File, DeletedPolicy::Exclude)
            .unwrap();
        assert_eq!(back.kind.file().unwrap().version, 1);
        assert_eq!(read_all(fs.read_file(&alice(), file.id).unwrap()), b"keep me");
    }

    #[test]
    fn sole_reference_survives_trash() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "only.txt", b"unique bytes");
        let hash = file.kind.file().unwrap().hash;

        fs.delete(&alice(), file.id, false).unwrap();
        // Strong reference released, trash reference holds the bytes.
        let entry = fs.blobs().entry(&hash).unwrap().unwrap();
        assert_eq!(entry.ref_count(), 0);
        assert!(!entry.is_unreferenced());

        fs.restore(&alice(), file.id).unwrap();
        assert_eq!(read_all(fs.read_file(&alice(), file.id).unwrap()), b"unique bytes");
        let entry = fs.blobs().entry(&hash).unwrap().unwrap();
        assert_eq!(entry.ref_count(), 1);
        assert!(entry.share_refs.is_empty());
    }

    #[test]
    fn force_delete_is_irreversible() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "gone.txt", b"bye");
        let hash = file.kind.file().unwrap().hash;
        fs.delete(&alice(), file.id, true).unwrap();
        assert!(matches!(
            fs.find_node(&alice(), file.id, TypeFilter::Any, DeletedPolicy::Include),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            fs.restore(&alice(), file.id),
            Err(FsError::NotFound(_))
        ));
        assert!(fs.blobs().entry(&hash).unwrap().is_none());
    }

    #[test]
    fn independent_earlier_deletion_stays_trashed_after_restore() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        let old = make_file(&fs, &alice(), Some(docs.id), "old.txt", b"old");
        fs.delete(&alice(), old.id, false).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        fs.delete(&alice(), docs.id, false).unwrap();
        fs.restore(&alice(), docs.id).unwrap();

        // The collection is back, but the file deleted earlier is not.
        assert!(fs
            .find_node(&alice(), old.id, TypeFilter::Any, DeletedPolicy::Exclude)
            .is_err());
        assert!(fs
            .find_node(&alice(), old.id, TypeFilter::Any, DeletedPolicy::Only)
            .is_ok());
    }

    #[test]
    fn trash_listing_shows_roots_only() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        make_file(&fs, &alice(), Some(docs.id), "a.txt", b"x");
        fs.delete(&alice(), docs.id, false).unwrap();

        let trash = fs.list_trash(&alice(), &UserId::from("alice")).unwrap();
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].name, "docs");

        // Another user's trash is off limits; admins may look.
        assert!(fs.list_trash(&bob(), &UserId::from("alice")).is_err());
        assert!(fs.list_trash(&admin(), &UserId::from("alice")).is_ok());
    }

    #[test]
    fn purge_expired_respects_retention() {
        let fs = Filesystem::in_memory(FsConfig {
            trash_retention: Duration::from_secs(3600),
            ..FsConfig::default()
        });
        let file = make_file(&fs, &alice(), None, "a.txt", b"x");
        let hash = file.kind.file().unwrap().hash;
        fs.delete(&alice(), file.id, false).unwrap();

        assert_eq!(fs.purge_expired(Timestamp::now()).unwrap(), 0);
        let later = Timestamp::now().plus(Duration::from_secs(7200));
        assert_eq!(fs.purge_expired(later).unwrap(), 1);
        assert!(fs.blobs().entry(&hash).unwrap().is_none());
        assert!(fs
            .find_node(&alice(), file.id, TypeFilter::Any, DeletedPolicy::Include)
            .is_err());
    }

    // -----------------------------------------------------------------------
    // Access control on operations
    // -----------------------------------------------------------------------

    #[test]
    fn stranger_cannot_read_or_write() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"secret");
        assert!(matches!(
            fs.read_file(&bob(), file.id),
            Err(FsError::Access(_))
        ));
        assert!(matches!(
            fs.put_file(&bob(), file.id, None, false, &mut &b"x"[..]),
            Err(FsError::Access(_))
        ));
    }

    #[test]
    fn share_grants_access_to_subtree() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        let file = make_file(&fs, &alice(), Some(docs.id), "a.txt", b"shared");
        fs.set_acl(
            &alice(),
            docs.id,
            AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]),
        )
        .unwrap();

        assert_eq!(read_all(fs.read_file(&bob(), file.id).unwrap()), b"shared");
        // Read privilege does not grant write.
        assert!(fs
            .put_file(&bob(), file.id, None, false, &mut &b"x"[..])
            .is_err());
    }

    #[test]
    fn group_rule_applies_to_members() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        let file = make_file(&fs, &alice(), Some(docs.id), "a.txt", b"team");
        fs.set_acl(
            &alice(),
            docs.id,
            AclSet::from_rules(vec![AclRule::group("staff", Privilege::ReadWrite)]),
        )
        .unwrap();

        let member =
            Caller::new(Principal::user("carol").with_groups(vec![GroupId::from("staff")]));
        assert_eq!(read_all(fs.read_file(&member, file.id).unwrap()), b"team");
        assert!(fs.read_file(&bob(), file.id).is_err());
    }

    #[test]
    fn only_owner_or_admin_may_share() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        let rules = AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]);
        let err = fs.set_acl(&bob(), docs.id, rules.clone()).unwrap_err();
        match err {
            FsError::Access(e) => assert_eq!(e.deny_code(), DenyCode::NotAllowedToShare),
            other => panic!("unexpected error: {other}"),
        }
        assert!(fs.set_acl(&admin(), docs.id, rules).is_ok());
    }

    #[test]
    fn nested_share_rejected() {
        let fs = fs();
        let outer = fs.create_collection(&alice(), None, "outer", no_attrs()).unwrap();
        let inner = fs
            .create_collection(&alice(), Some(outer.id), "inner", no_attrs())
            .unwrap();
        let rules = AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]);
        fs.set_acl(&alice(), outer.id, rules.clone()).unwrap();
        assert!(matches!(
            fs.set_acl(&alice(), inner.id, rules.clone()),
            Err(FsError::NestedShare(_))
        ));

        // And the other direction: sharing above an existing share.
        let other = Filesystem::in_memory(FsConfig::default());
        let outer = other
            .create_collection(&alice(), None, "outer", no_attrs())
            .unwrap();
        let inner = other
            .create_collection(&alice(), Some(outer.id), "inner", no_attrs())
            .unwrap();
        other.set_acl(&alice(), inner.id, rules.clone()).unwrap();
        assert!(matches!(
            other.set_acl(&alice(), outer.id, rules),
            Err(FsError::NestedShare(_))
        ));
    }

    #[test]
    fn shared_content_survives_owner_purge() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        let file = make_file(&fs, &alice(), Some(docs.id), "a.txt", b"survives");
        let hash = file.kind.file().unwrap().hash;
        fs.set_acl(
            &alice(),
            docs.id,
            AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]),
        )
        .unwrap();

        // Bob copies the shared file; Alice later purges her original.
        let dest = fs.create_collection(&bob(), None, "mine", no_attrs()).unwrap();
        let copy = fs
            .copy_node(&bob(), file.id, Some(dest.id), ConflictPolicy::Reject)
            .unwrap();
        fs.delete(&alice(), file.id, true).unwrap();

        assert_eq!(read_all(fs.read_file(&bob(), copy.id).unwrap()), b"survives");
    }

    #[test]
    fn unset_acl_reverts_to_private() {
        let fs = fs();
        let docs = fs.create_collection(&alice(), None, "docs", no_attrs()).unwrap();
        let file = make_file(&fs, &alice(), Some(docs.id), "a.txt", b"x");
        fs.set_acl(
            &alice(),
            docs.id,
            AclSet::from_rules(vec![AclRule::user("bob", Privilege::Read)]),
        )
        .unwrap();
        assert!(fs.read_file(&bob(), file.id).is_ok());

        fs.unset_acl(&alice(), docs.id).unwrap();
        assert!(fs.read_file(&bob(), file.id).is_err());
        let hash = file.kind.file().unwrap().hash;
        let entry = fs.blobs().entry(&hash).unwrap().unwrap();
        assert!(entry.share_refs.is_empty());
    }

    // -----------------------------------------------------------------------
    // Locks gate writes
    // -----------------------------------------------------------------------

    #[test]
    fn locked_node_rejects_tokenless_writes() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"v1");
        let lock = fs
            .lock(&alice(), file.id, None, None, LockScope::Exclusive)
            .unwrap();

        assert!(matches!(
            fs.put_file(&alice(), file.id, None, false, &mut &b"v2"[..]),
            Err(FsError::Lock(LockError::Locked { .. }))
        ));

        let holder = alice().with_lock_token(lock.token.clone());
        fs.put_file(&holder, file.id, None, false, &mut &b"v2"[..])
            .unwrap();

        fs.unlock(&alice(), file.id, &lock.token).unwrap();
        fs.put_file(&alice(), file.id, None, false, &mut &b"v3"[..])
            .unwrap();
    }

    #[test]
    fn get_lock_on_unlocked_node_fails() {
        let fs = fs();
        let file = make_file(&fs, &alice(), None, "a.txt", b"x");
        assert!(matches!(
            fs.get_lock(&alice(), file.id),
            Err(FsError::Lock(LockError::NotLocked(_)))
        ));
    }

    // -----------------------------------------------------------------------
    // Quota enforcement
    // -----------------------------------------------------------------------

    #[test]
    fn hard_quota_blocks_create_and_rolls_back() {
        let fs = fs();
        let u = UserId::from("alice");
        fs.set_quota_limits(&admin(), &u, None, Some(10)).unwrap();
        make_file(&fs, &alice(), None, "small.txt", b"12345");

        let err = fs
            .create_file(&alice(), None, "big.txt", &mut &b"0123456789"[..], no_attrs())
            .unwrap_err();
        assert!(matches!(err, FsError::Quota(_)));
        assert_eq!(fs.quota_report(&alice(), &u).unwrap().used, 5);
        // The staged blob reference was rolled back.
        assert_eq!(
            fs.blobs()
                .entry(&strata_types::ContentHash::of(b"0123456789"))
                .unwrap(),
            None
        );
    }

    #[test]
    fn soft_delete_releases_quota_and_restore_recharges() {
        let fs = fs();
        let u = UserId::from("alice");
        let file = make_file(&fs, &alice(), None, "a.txt", b"12345");
        assert_eq!(fs.quota_report(&alice(), &u).unwrap().used, 5);

        fs.delete(&alice(), file.id, false).unwrap();
        assert_eq!(fs.quota_report(&alice(), &u).unwrap().used, 0);

        fs.restore(&alice(), file.id).unwrap();
        assert_eq!(fs.quota_report(&alice(), &u).unwrap().used, 5);
    }

    // -----------------------------------------------------------------------
    // App attributes
    // -----------------------------------------------------------------------

    #[test]
    fn attribute_lifecycle() {
        let fs = fs();
        fs.namespaces().register("sharing");
        let file = make_file(&fs, &alice(), None, "a.txt", b"x");

        let mut values = BTreeMap::new();
        values.insert("token".to_string(), json!("abc123"));
        fs.set_app_attributes(&alice(), file.id, "sharing", values)
            .unwrap();
        assert_eq!(
            fs.get_app_attribute(&alice(), file.id, "sharing", "token")
                .unwrap(),
            Some(json!("abc123"))
        );

        fs.unset_app_attributes(&alice(), file.id, "sharing").unwrap();
        assert_eq!(
            fs.get_app_attribute(&alice(), file.id, "sharing", "token")
                .unwrap(),
            None
        );

        assert!(matches!(
            fs.get_app_attribute(&alice(), file.id, "nope", "k"),
            Err(FsError::UnknownNamespace(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Change feed integration
    // -----------------------------------------------------------------------

    #[test]
    fn mutations_land_on_the_feed_in_order() {
        let fs = fs();
        let before = fs.latest_cursor().unwrap();
        let file = make_file(&fs, &alice(), None, "a.txt", b"one");
        fs.put_file(&alice(), file.id, None, false, &mut &b"two"[..])
            .unwrap();
        fs.rename(&alice(), file.id, "b.txt").unwrap();
        fs.delete(&alice(), file.id, false).unwrap();

        let page = fs.changes(&before, 100).unwrap();
        assert!(!page.reset);
        let ops: Vec<Operation> = page.records.iter().map(|r| r.operation).collect();
        assert_eq!(
            ops,
            vec![
                Operation::Create,
                Operation::Update,
                Operation::Rename,
                Operation::Delete
            ]
        );
        let empty = fs.changes(&page.next_cursor, 100).unwrap();
        assert!(empty.records.is_empty());
    }

    // -----------------------------------------------------------------------
    // Events and jobs
    // -----------------------------------------------------------------------

    #[test]
    fn events_flow_to_subscribers() {
        let fs = fs();
        let mut rx = fs.subscribe(EventFilter {
            kinds: Some(vec![FsEventKind::NodeCreated]),
            owners: None,
        });
        let file = make_file(&fs, &alice(), None, "a.txt", b"x");
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, FsEventKind::NodeCreated);
        assert_eq!(event.node, file.id);
        assert!(matches!(event.detail, EventDetail::Content { size: 1, .. }));
    }

    #[test]
    fn content_writes_submit_scan_and_preview_jobs() {
        use crate::store::InMemoryNodeStore;
        use strata_blob::{InMemoryBlobIndex, InMemoryByteSink};
        use strata_delta::InMemoryDeltaLog;
        use strata_events::RecordingJobSink;
        use strata_lock::InMemoryLockStore;
        use strata_quota::InMemoryQuotaStore;

        let sink = Arc::new(RecordingJobSink::new());
        let fs = Filesystem::new(
            FsConfig::default(),
            Arc::new(InMemoryNodeStore::new()),
            BlobStore::new(
                Arc::new(InMemoryBlobIndex::new()),
                Arc::new(InMemoryByteSink::new()),
            ),
            LockManager::new(Arc::new(InMemoryLockStore::new())),
            QuotaTracker::new(Arc::new(InMemoryQuotaStore::new())),
            ChangeFeed::new(Arc::new(InMemoryDeltaLog::new())),
            EventBus::default(),
            sink.clone(),
            NamespaceRegistry::new(),
        );

        make_file(&fs, &alice(), None, "a.txt", b"x");
        assert_eq!(sink.count(JobKind::Scan), 1);
        assert_eq!(sink.count(JobKind::Preview), 1);
        assert_eq!(sink.count(JobKind::Index), 1);
    }
}
