//! Mesh asset: indexed triangle geometry split into material sub-ranges

use serde::{Deserialize, Serialize};

use crate::archive::Archive;
use crate::asset::{Asset, AssetBase};
use crate::error::AssetResult;
use crate::id::{AssetId, AssetType, TypeTag};

/// A contiguous index range drawn with one material
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubMesh {
    pub first_index: u32,
    pub first_vertex: u32,
    pub index_count: u32,
    pub material: AssetId,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub base: AssetBase,
    pub indices: Vec<u32>,
    /// Positions with `w = 1`
    pub positions: Vec<[f32; 4]>,
    pub uvs: Vec<[f32; 2]>,
    pub submeshes: Vec<SubMesh>,
}

impl AssetType for Mesh {
    const TYPE_TAG: TypeTag = TypeTag::new(*b"MESH");
}

impl Mesh {
    pub fn new(id: AssetId, name: impl Into<String>) -> Self {
        Self {
            base: AssetBase::new(id, name),
            ..Default::default()
        }
    }

    /// Append a primitive. Its indices stay relative to `first_vertex`.
    pub fn push_submesh(&mut self, indices: &[u32], positions: &[[f32; 4]], uvs: &[[f32; 2]], material: AssetId) {
        let submesh = SubMesh {
            first_index: self.indices.len() as u32,
            first_vertex: self.positions.len() as u32,
            index_count: indices.len() as u32,
            material: material.clone(),
        };

        self.indices.extend_from_slice(indices);
        self.positions.extend_from_slice(positions);
        self.uvs.extend_from_slice(uvs);
        // Keep uvs parallel to positions
        self.uvs.resize(self.positions.len(), [0.0, 0.0]);
        self.submeshes.push(submesh);
        self.base.add_dependency(material);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

impl Asset for Mesh {
    crate::impl_asset_common!(Mesh, "Mesh");

    fn serialize(&mut self, ar: &mut Archive<'_>) -> AssetResult<()> {
        ar.value(&mut self.indices)?;
        ar.value(&mut self.positions)?;
        ar.value(&mut self.uvs)?;
        ar.value(&mut self.submeshes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Material;

    #[test]
    fn test_push_submesh_tracks_ranges_and_dependencies() {
        let material = AssetId::create::<Material>("m");
        let mut mesh = Mesh::new(AssetId::create::<Mesh>("quad"), "quad");
        let quad = [[0.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0], [1.0, 1.0, 0.0, 1.0]];

        mesh.push_submesh(&[0, 1, 2], &quad, &[], material.clone());
        mesh.push_submesh(&[0, 2, 1], &quad, &[[0.5, 0.5]; 3], material.clone());

        assert_eq!(mesh.submeshes[1].first_index, 3);
        assert_eq!(mesh.submeshes[1].first_vertex, 3);
        assert_eq!(mesh.uvs.len(), mesh.vertex_count());
        assert_eq!(mesh.base.dependencies(), &[material]);
    }
}
