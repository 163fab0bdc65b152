use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::wcif::{Activity, ActivityId, Competition, RoomId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct ActivityNode {
    pub activity_id: ActivityId,
    pub name: String,
    pub activity_code: String,
    pub start_time: String,
    pub end_time: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Set only where the document attaches the activity to a room directly.
    pub room: Option<RoomId>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl ActivityNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A leaf activity plus its ancestor chain, nearest parent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafActivity {
    pub node: NodeId,
    pub ancestors: Vec<NodeId>,
}

impl LeafActivity {
    pub fn parent(&self) -> Option<NodeId> {
        self.ancestors.first().copied()
    }

    pub fn grandparent(&self) -> Option<NodeId> {
        self.ancestors.get(1).copied()
    }
}

/// Arena of activities. Parents are referenced by id, never by pointer.
#[derive(Debug, Clone, Default)]
pub struct ActivityTree {
    nodes: Vec<ActivityNode>,
    roots: Vec<NodeId>,
}

impl ActivityTree {
    #[tracing::instrument(skip_all, fields(competition = %competition.id))]
    pub fn from_competition(competition: &Competition) -> Self {
        let mut tree = Self::default();
        for (_, room) in competition.rooms() {
            for activity in &room.activities {
                tree.push_subtree(None, Some(room.id), activity);
            }
        }
        debug!(
            nodes = tree.nodes.len(),
            roots = tree.roots.len(),
            "built activity tree"
        );
        tree
    }

    /// Inserts a single activity, ignoring its children.
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        room: Option<RoomId>,
        activity: &Activity,
    ) -> anyhow::Result<NodeId> {
        self.check_parent(parent)?;
        Ok(self.push_node(parent, room, activity))
    }

    /// Inserts an activity and all of its descendants.
    pub fn insert_subtree(
        &mut self,
        parent: Option<NodeId>,
        room: Option<RoomId>,
        activity: &Activity,
    ) -> anyhow::Result<NodeId> {
        self.check_parent(parent)?;
        Ok(self.push_subtree(parent, room, activity))
    }

    pub fn node(&self, id: NodeId) -> &ActivityNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&ActivityNode> {
        self.nodes.get(id.0)
    }

    /// Parent chain of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.get(id).and_then(|node| node.parent);
        while let Some(current) = cursor {
            out.push(current);
            cursor = self.node(current).parent;
        }
        out
    }

    /// Leaves in depth-first pre-order: roots in insertion order, children
    /// in document order.
    #[tracing::instrument(skip(self))]
    pub fn leaves(&self) -> Vec<LeafActivity> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.is_leaf() {
                trace!(activity = node.activity_id, "emitting leaf activity");
                out.push(LeafActivity {
                    node: id,
                    ancestors: self.ancestors(id),
                });
            } else {
                stack.extend(node.children.iter().rev().copied());
            }
        }

        debug!(count = out.len(), "flattened leaf activities");
        out
    }

    fn check_parent(&self, parent: Option<NodeId>) -> anyhow::Result<()> {
        match parent {
            Some(id) if self.get(id).is_none() => {
                Err(anyhow!("unknown parent activity node: {}", id.0))
            }
            _ => Ok(()),
        }
    }

    fn push_subtree(
        &mut self,
        parent: Option<NodeId>,
        room: Option<RoomId>,
        activity: &Activity,
    ) -> NodeId {
        let id = self.push_node(parent, room, activity);
        for child in &activity.child_activities {
            self.push_subtree(Some(id), None, child);
        }
        id
    }

    fn push_node(
        &mut self,
        parent: Option<NodeId>,
        room: Option<RoomId>,
        activity: &Activity,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ActivityNode {
            activity_id: activity.id,
            name: activity.name.clone(),
            activity_code: activity.activity_code.clone(),
            start_time: activity.start_time.clone(),
            end_time: activity.end_time.clone(),
            start: activity.start(),
            end: activity.end(),
            room,
            parent,
            children: Vec::new(),
        });

        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}
