use std::collections::HashMap;
use std::sync::RwLock;

use strata_types::{DeletedPolicy, NodeId, UserId};

use crate::error::{FsError, FsResult};
use crate::names::names_collide;
use crate::node::Node;

/// Persistence boundary for node records.
///
/// One record per node, keyed by id. Lookups that filter by deleted
/// state take a [`DeletedPolicy`] so trash views and live views share
/// one code path.
pub trait NodeStore: Send + Sync {
    /// Fetch a node by id, regardless of deleted state.
    fn get(&self, id: &NodeId) -> FsResult<Option<Node>>;

    /// Insert a fresh node. Fails if the id already exists.
    fn insert(&self, node: Node) -> FsResult<()>;

    /// Overwrite an existing node. Fails `NotFound` if absent.
    fn update(&self, node: Node) -> FsResult<()>;

    /// Remove a node record, returning it if present.
    fn remove(&self, id: &NodeId) -> FsResult<Option<Node>>;

    /// Children of a collection (or root-level nodes for `None`), passing
    /// the deleted filter, sorted by name.
    fn children(&self, parent: Option<&NodeId>, policy: DeletedPolicy) -> FsResult<Vec<Node>>;

    /// The child matching `name` under the deployment's case policy.
    fn child_by_name(
        &self,
        parent: Option<&NodeId>,
        name: &str,
        policy: DeletedPolicy,
        case_insensitive: bool,
    ) -> FsResult<Option<Node>>;

    /// All nodes owned by a user, passing the deleted filter.
    fn by_owner(&self, owner: &UserId, policy: DeletedPolicy) -> FsResult<Vec<Node>>;

    /// All soft-deleted nodes, for trash maintenance.
    fn trashed(&self) -> FsResult<Vec<Node>>;

    /// Total number of records, including soft-deleted ones.
    fn len(&self) -> FsResult<usize>;
}

/// Hash-map backed store for tests and embedded deployments.
#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    nodes: RwLock<HashMap<NodeId, Node>>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn get(&self, id: &NodeId) -> FsResult<Option<Node>> {
        Ok(self.nodes.read().expect("store lock poisoned").get(id).cloned())
    }

    fn insert(&self, node: Node) -> FsResult<()> {
        let mut nodes = self.nodes.write().expect("store lock poisoned");
        if nodes.contains_key(&node.id) {
            return Err(FsError::InvalidArgument(format!(
                "node {} already exists",
                node.id
            )));
        }
        nodes.insert(node.id, node);
        Ok(())
    }

    fn update(&self, node: Node) -> FsResult<()> {
        let mut nodes = self.nodes.write().expect("store lock poisoned");
        if !nodes.contains_key(&node.id) {
            return Err(FsError::NotFound(node.id));
        }
        nodes.insert(node.id, node);
        Ok(())
    }

    fn remove(&self, id: &NodeId) -> FsResult<Option<Node>> {
        Ok(self.nodes.write().expect("store lock poisoned").remove(id))
    }

    fn children(&self, parent: Option<&NodeId>, policy: DeletedPolicy) -> FsResult<Vec<Node>> {
        let nodes = self.nodes.read().expect("store lock poisoned");
        let mut out: Vec<Node> = nodes
            .values()
            .filter(|n| n.parent.as_ref() == parent && policy.admits(n.deleted.is_some()))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn child_by_name(
        &self,
        parent: Option<&NodeId>,
        name: &str,
        policy: DeletedPolicy,
        case_insensitive: bool,
    ) -> FsResult<Option<Node>> {
        let nodes = self.nodes.read().expect("store lock poisoned");
        Ok(nodes
            .values()
            .find(|n| {
                n.parent.as_ref() == parent
                    && policy.admits(n.deleted.is_some())
                    && names_collide(&n.name, name, case_insensitive)
            })
            .cloned())
    }

    fn by_owner(&self, owner: &UserId, policy: DeletedPolicy) -> FsResult<Vec<Node>> {
        let nodes = self.nodes.read().expect("store lock poisoned");
        let mut out: Vec<Node> = nodes
            .values()
            .filter(|n| n.owner == *owner && policy.admits(n.deleted.is_some()))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn trashed(&self) -> FsResult<Vec<Node>> {
        let nodes = self.nodes.read().expect("store lock poisoned");
        let mut out: Vec<Node> = nodes
            .values()
            .filter(|n| n.deleted.is_some())
            .cloned()
            .collect();
        out.sort_by_key(|n| n.deleted);
        Ok(out)
    }

    fn len(&self) -> FsResult<usize> {
        Ok(self.nodes.read().expect("store lock poisoned").len())
    }
}
