// Backend module - thin Vulkan abstraction over ash
//
// Components follow the dependency order in which main builds them:
// device context, swapchain, depth target, pipeline, renderer; buffers,
// images and meshes hang off the device context and its uploader.

pub mod buffer;
pub mod depth;
pub mod device;
pub mod error;
pub mod image;
pub mod mesh;
pub mod pipeline;
pub mod renderer;
mod rwh_compat;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod upload;

pub use depth::DepthTarget;
pub use device::{CreateInfo, DeviceContext};
pub use error::GfxError;
pub use mesh::{Mesh, Vertex};
pub use pipeline::RenderPipeline;
pub use renderer::{FrameStatus, Renderer};
pub use swapchain::Swapchain;
