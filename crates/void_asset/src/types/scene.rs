//! Sub-scene asset: a node hierarchy referencing meshes

use crate::archive::Archive;
use crate::asset::{Asset, AssetBase};
use crate::error::AssetResult;
use crate::id::{AssetId, AssetType, TypeTag};

/// Flattened node hierarchy. All per-node arrays are parallel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubScene {
    pub base: AssetBase,
    /// Indices of top-level nodes
    pub roots: Vec<u32>,
    /// Local transform of each node (column-major)
    pub transforms: Vec<[[f32; 4]; 4]>,
    /// Mesh drawn at each node, invalid if none
    pub meshes: Vec<AssetId>,
    pub names: Vec<String>,
    pub children: Vec<Vec<u32>>,
}

impl AssetType for SubScene {
    const TYPE_TAG: TypeTag = TypeTag::new(*b"SBSC");
}

pub const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl SubScene {
    pub fn new(id: AssetId, name: impl Into<String>) -> Self {
        Self {
            base: AssetBase::new(id, name),
            ..Default::default()
        }
    }

    /// Append a node and return its index
    pub fn add_node(&mut self, name: impl Into<String>, transform: [[f32; 4]; 4], mesh: AssetId) -> u32 {
        let index = self.names.len() as u32;
        self.names.push(name.into());
        self.transforms.push(transform);
        self.base.add_dependency(mesh.clone());
        self.meshes.push(mesh);
        self.children.push(Vec::new());
        index
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }
}

impl Asset for SubScene {
    crate::impl_asset_common!(SubScene, "SubScene");

    fn serialize(&mut self, ar: &mut Archive<'_>) -> AssetResult<()> {
        ar.value(&mut self.roots)?;
        ar.value(&mut self.transforms)?;
        ar.value(&mut self.meshes)?;
        ar.value(&mut self.names)?;
        ar.value(&mut self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mesh;

    #[test]
    fn test_nodes_stay_parallel() {
        let mut scene = SubScene::new(AssetId::create::<SubScene>("s"), "s");
        let mesh = AssetId::create::<Mesh>("m");
        let root = scene.add_node("root", IDENTITY, AssetId::invalid());
        let child = scene.add_node("child", IDENTITY, mesh.clone());
        scene.roots.push(root);
        scene.children[root as usize].push(child);

        assert_eq!(scene.node_count(), 2);
        assert_eq!(scene.meshes.len(), scene.transforms.len());
        assert_eq!(scene.base.dependencies(), &[mesh]);
    }
}
