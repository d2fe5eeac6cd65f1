//! Scene-graph arena backed by a hecs world
//!
//! Nodes are hecs entities addressed by [`NodeId`]. A parent owns the ordered
//! list of its children; a child only stores the id of its parent, so
//! despawning a subtree never has to chase cycles.

use glam::{Mat4, Vec3};
use hecs::{Entity, World};

use crate::components::*;

/// Stable handle to a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Entity);

/// Name and visibility of a node
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy)]
struct Parent(NodeId);

#[derive(Debug, Clone, Default)]
struct Children(Vec<NodeId>);

/// Scene background
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Background {
    #[default]
    Transparent,
    Color([f32; 4]),
}

/// Scene graph with explicit ownership of children
#[derive(Default)]
pub struct SceneGraph {
    world: World,
    roots: Vec<NodeId>,
    pub background: Background,
    pub environment: Option<TextureHandle>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a root node
    pub fn spawn(&mut self, name: &str, transform: Transform) -> NodeId {
        let id = self.spawn_detached(name, transform);
        self.roots.push(id);
        id
    }

    /// Spawn a node as the last child of `parent`
    pub fn spawn_child(&mut self, parent: NodeId, name: &str, transform: Transform) -> NodeId {
        let id = self.spawn_detached(name, transform);
        self.link(id, parent);
        id
    }

    fn spawn_detached(&mut self, name: &str, transform: Transform) -> NodeId {
        let info = NodeInfo {
            name: name.to_string(),
            visible: true,
        };
        NodeId(self.world.spawn((info, transform, Children::default())))
    }

    fn link(&mut self, child: NodeId, parent: NodeId) {
        if let Ok(mut children) = self.world.get::<&mut Children>(parent.0) {
            children.0.push(child);
        }
        let _ = self.world.insert_one(child.0, Parent(parent));
    }

    /// Move `child` under `parent`, detaching it from wherever it was
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> bool {
        if !self.contains(child) || !self.contains(parent) || child == parent {
            return false;
        }
        if self.is_ancestor(child, parent) {
            return false;
        }
        self.detach(child);
        self.roots.retain(|root| *root != child);
        self.link(child, parent);
        true
    }

    /// Detach a node from its parent; the node becomes a root
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            if let Ok(mut children) = self.world.get::<&mut Children>(parent.0) {
                children.0.retain(|child| *child != node);
            }
            let _ = self.world.remove_one::<Parent>(node.0);
            self.roots.push(node);
        }
    }

    /// Despawn a node and all of its descendants, returning the removed ids
    pub fn despawn_recursive(&mut self, node: NodeId) -> Vec<NodeId> {
        if !self.contains(node) {
            return Vec::new();
        }
        let removed = self.traverse_depth_first(node);
        if let Some(parent) = self.parent(node) {
            if let Ok(mut children) = self.world.get::<&mut Children>(parent.0) {
                children.0.retain(|child| *child != node);
            }
        }
        self.roots.retain(|root| *root != node);
        for id in &removed {
            let _ = self.world.despawn(id.0);
        }
        removed
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.world.contains(node.0)
    }

    pub fn node_count(&self) -> usize {
        self.world.len() as usize
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.world.get::<&Parent>(node.0).ok().map(|parent| parent.0)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.world
            .get::<&Children>(node.0)
            .map(|children| children.0.clone())
            .unwrap_or_default()
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Pre-order traversal of the subtree rooted at `root`
    pub fn traverse_depth_first(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            order.push(node);
            let children = self.children(node);
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Pre-order traversal of every root
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.roots
            .iter()
            .flat_map(|root| self.traverse_depth_first(*root))
            .collect()
    }

    pub fn name(&self, node: NodeId) -> Option<String> {
        self.world
            .get::<&NodeInfo>(node.0)
            .ok()
            .map(|info| info.name.clone())
    }

    pub fn transform(&self, node: NodeId) -> Option<Transform> {
        self.world.get::<&Transform>(node.0).ok().map(|t| *t)
    }

    pub fn set_transform(&mut self, node: NodeId, transform: Transform) -> bool {
        self.update_transform(node, |t| *t = transform)
    }

    /// Mutate a node transform in place
    pub fn update_transform(&mut self, node: NodeId, f: impl FnOnce(&mut Transform)) -> bool {
        match self.world.get::<&mut Transform>(node.0) {
            Ok(mut transform) => {
                f(&mut *transform);
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.world
            .get::<&NodeInfo>(node.0)
            .map(|info| info.visible)
            .unwrap_or(false)
    }

    pub fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Ok(mut info) = self.world.get::<&mut NodeInfo>(node.0) {
            info.visible = visible;
        }
    }

    /// A node is drawn only when it and every ancestor are visible
    pub fn is_visible_in_hierarchy(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if !self.is_visible(id) {
                return false;
            }
            current = self.parent(id);
        }
        true
    }

    pub fn set_mesh(&mut self, node: NodeId, mesh: MeshRenderer) {
        let _ = self.world.insert_one(node.0, mesh);
    }

    pub fn mesh(&self, node: NodeId) -> Option<MeshRenderer> {
        self.world
            .get::<&MeshRenderer>(node.0)
            .ok()
            .map(|mesh| (*mesh).clone())
    }

    pub fn set_light(&mut self, node: NodeId, light: Light) {
        let _ = self.world.insert_one(node.0, light);
    }

    pub fn light(&self, node: NodeId) -> Option<Light> {
        self.world.get::<&Light>(node.0).ok().map(|light| *light)
    }

    pub fn update_light(&mut self, node: NodeId, f: impl FnOnce(&mut Light)) -> bool {
        match self.world.get::<&mut Light>(node.0) {
            Ok(mut light) => {
                f(&mut *light);
                true
            }
            Err(_) => false,
        }
    }

    pub fn set_shadow(&mut self, node: NodeId, flags: ShadowFlags) {
        let _ = self.world.insert_one(node.0, flags);
    }

    pub fn shadow(&self, node: NodeId) -> ShadowFlags {
        self.world
            .get::<&ShadowFlags>(node.0)
            .map(|flags| *flags)
            .unwrap_or_default()
    }

    /// Nodes carrying a mesh renderer, in traversal order
    pub fn mesh_nodes(&self) -> Vec<NodeId> {
        self.all_nodes()
            .into_iter()
            .filter(|node| self.world.satisfies::<&MeshRenderer>(node.0))
            .collect()
    }

    /// Nodes carrying a light, in traversal order
    pub fn light_nodes(&self) -> Vec<NodeId> {
        self.all_nodes()
            .into_iter()
            .filter(|node| self.world.satisfies::<&Light>(node.0))
            .collect()
    }

    pub fn local_matrix(&self, node: NodeId) -> Mat4 {
        self.transform(node)
            .map(|t| t.to_mat4())
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Matrix of `node` expressed in the space of `ancestor` (exclusive)
    pub fn relative_matrix(&self, node: NodeId, ancestor: Option<NodeId>) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(node);
        while let Some(id) = current {
            if Some(id) == ancestor {
                break;
            }
            matrix = self.local_matrix(id) * matrix;
            current = self.parent(id);
        }
        matrix
    }

    pub fn world_matrix(&self, node: NodeId) -> Mat4 {
        self.relative_matrix(node, None)
    }

    pub fn world_position(&self, node: NodeId) -> Vec3 {
        self.world_matrix(node).transform_point3(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn traversal_is_pre_order() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root", Transform::default());
        let a = scene.spawn_child(root, "a", Transform::default());
        let a1 = scene.spawn_child(a, "a1", Transform::default());
        let b = scene.spawn_child(root, "b", Transform::default());

        assert_eq!(scene.traverse_depth_first(root), vec![root, a, a1, b]);
        assert_eq!(scene.parent(a1), Some(a));
    }

    #[test]
    fn despawn_removes_whole_subtree() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root", Transform::default());
        let model = scene.spawn_child(root, "model", Transform::default());
        scene.spawn_child(model, "mesh", Transform::default());

        let removed = scene.despawn_recursive(model);
        assert_eq!(removed.len(), 2);
        assert!(scene.children(root).is_empty());
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn attach_refuses_cycles() {
        let mut scene = SceneGraph::new();
        let a = scene.spawn("a", Transform::default());
        let b = scene.spawn_child(a, "b", Transform::default());
        assert!(!scene.attach(a, b));
        assert!(scene.attach(b, a));
        assert_eq!(scene.children(a), vec![b]);
    }

    #[test]
    fn world_position_composes_parents() {
        let mut scene = SceneGraph::new();
        let pivot = scene.spawn("pivot", Transform::from_translation(1.0, 0.0, 0.0));
        let group = scene.spawn_child(pivot, "group", Transform::from_translation(0.0, 2.0, 0.0));
        let position = scene.world_position(group);
        assert_relative_eq!(position.x, 1.0);
        assert_relative_eq!(position.y, 2.0);
    }

    #[test]
    fn hidden_parent_hides_children() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root", Transform::default());
        let child = scene.spawn_child(root, "child", Transform::default());
        scene.set_visible(root, false);
        assert!(!scene.is_visible_in_hierarchy(child));
    }
}
