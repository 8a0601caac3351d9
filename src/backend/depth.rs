// Depth attachment
//
// A device-local depth image sized to the swapchain, rebuilt on resize.

use ash::vk;

use super::device::DeviceContext;
use super::error::{GfxError, Result};
use super::image::Image;

const CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

fn has_stencil(format: vk::Format) -> bool {
    format == vk::Format::D32_SFLOAT_S8_UINT || format == vk::Format::D24_UNORM_S8_UINT
}

/// First candidate format usable as an optimal-tiling depth attachment.
pub fn pick_depth_format(ctx: &DeviceContext) -> Result<vk::Format> {
    for format in CANDIDATES {
        let props = unsafe {
            ctx.instance()
                .get_physical_device_format_properties(ctx.physical_device(), format)
        };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok(format);
        }
    }
    Err(GfxError::Unsupported(
        "no depth format supports depth-stencil attachment".into(),
    ))
}

#[derive(Default)]
pub struct DepthTarget {
    image: Image,
    format: vk::Format,
}

impl DepthTarget {
    pub fn init(ctx: &DeviceContext, extent: vk::Extent2D) -> Result<Self> {
        let format = pick_depth_format(ctx)?;
        let image = Self::build_image(ctx, extent, format)?;
        Ok(Self { image, format })
    }

    /// Rebuild at a new extent, keeping the format picked at init.
    pub fn recreate(&mut self, ctx: &DeviceContext, extent: vk::Extent2D) -> Result<()> {
        self.image.shutdown(ctx);
        self.image = Self::build_image(ctx, extent, self.format)?;
        Ok(())
    }

    fn build_image(ctx: &DeviceContext, extent: vk::Extent2D, format: vk::Format) -> Result<Image> {
        let mut aspect = vk::ImageAspectFlags::DEPTH;
        if has_stencil(format) {
            aspect |= vk::ImageAspectFlags::STENCIL;
        }
        Image::init_2d(
            ctx,
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect,
        )
    }

    pub fn shutdown(&mut self, ctx: &DeviceContext) {
        self.image.shutdown(ctx);
        self.format = vk::Format::UNDEFINED;
    }

    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stencil_detection() {
        assert!(!has_stencil(vk::Format::D32_SFLOAT));
        assert!(has_stencil(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(has_stencil(vk::Format::D24_UNORM_S8_UINT));
    }
}
