//! Built-in asset types produced by the importers

mod material;
mod mesh;
mod scene;
mod texture;

pub use material::{Material, UvTransform};
pub use mesh::{Mesh, SubMesh};
pub use scene::{SubScene, IDENTITY};
pub use texture::{Texture, TextureExtension, TextureFormat};
