//! Arena of scene nodes addressed by typed, generation-checked handles.

use glam::Vec3;

use crate::backend::{GeometryId, MaterialId};
use crate::surface::SurfaceMaterial;
use crate::viewport::mesh::MeshData;
use crate::viewport::picking::Aabb;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Handle to the surface mesh node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshNodeHandle(pub(crate) NodeId);

/// Handle to the skeleton node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SkeletonNodeHandle(pub(crate) NodeId);

impl MeshNodeHandle {
    pub fn id(self) -> NodeId {
        self.0
    }
}

impl SkeletonNodeHandle {
    pub fn id(self) -> NodeId {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    Mesh,
    Skeleton,
}

/// GPU objects owned by one node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuResources {
    pub geometry: GeometryId,
    pub material: MaterialId,
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub role: NodeRole,
    /// Reference the geometry was loaded from
    pub asset: String,
    pub mesh: MeshData,
    /// Local-space bounds
    pub bounds: Aabb,
    pub translation: Vec3,
    pub material: SurfaceMaterial,
    pub visible: bool,
    pub gpu: Option<GpuResources>,
    /// CPU data changed since the last upload
    pub dirty: bool,
}

impl SceneNode {
    pub fn world_bounds(&self) -> Aabb {
        self.bounds.translated(self.translation)
    }
}

struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

#[derive(Default)]
pub struct SceneArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl SceneArena {
    pub fn insert(&mut self, node: SceneNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    /// Remove a node; stale handles return `None`
    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        self.free.push(id.index);
        Some(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> {
        self.slots.iter().filter_map(|s| s.node.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SceneNode> {
        self.slots.iter_mut().filter_map(|s| s.node.as_mut())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every node out of the arena
    pub fn drain(&mut self) -> Vec<SceneNode> {
        let mut nodes = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(node) = slot.node.take() {
                nodes.push(node);
                self.free.push(index as u32);
            }
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::mesh;

    fn node(role: NodeRole) -> SceneNode {
        let m = mesh::sphere(Vec3::ZERO, 1.0, 4, 4, [1.0; 3]);
        let bounds = Aabb::from_mesh(&m).unwrap();
        SceneNode {
            role,
            asset: "test".into(),
            mesh: m,
            bounds,
            translation: Vec3::ZERO,
            material: SurfaceMaterial::surface(),
            visible: true,
            gpu: None,
            dirty: true,
        }
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut arena = SceneArena::default();
        let a = arena.insert(node(NodeRole::Mesh));
        assert!(arena.remove(a).is_some());
        let b = arena.insert(node(NodeRole::Skeleton));
        assert_eq!(a.index, b.index);
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.get(b).map(|n| n.role), Some(NodeRole::Skeleton));
    }

    #[test]
    fn test_drain_empties_arena() {
        let mut arena = SceneArena::default();
        arena.insert(node(NodeRole::Mesh));
        arena.insert(node(NodeRole::Skeleton));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.drain().len(), 2);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_world_bounds_follow_translation() {
        let mut n = node(NodeRole::Mesh);
        n.translation = Vec3::new(3.0, 0.0, 0.0);
        assert!((n.world_bounds().center() - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
    }
}
