// GPU images
//
// Same ownership rules as Buffer: one allocation, move-only, explicit
// shutdown(ctx), idempotent. Carries its derived view.

use ash::vk;

use super::buffer::find_memory_type;
use super::device::DeviceContext;
use super::error::{vk_check, GfxError, Result};

#[derive(Default)]
pub struct Image {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Image {
    pub fn init_2d(
        ctx: &DeviceContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(GfxError::Unsupported(format!(
                "image extent {}x{} is degenerate",
                extent.width, extent.height
            )));
        }

        let mut img = Self {
            format,
            extent,
            ..Default::default()
        };
        if let Err(e) = img.build(ctx, usage, aspect) {
            img.shutdown(ctx);
            return Err(e);
        }
        Ok(img)
    }

    fn build(
        &mut self,
        ctx: &DeviceContext,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<()> {
        let device = ctx.device();

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        self.image = vk_check(
            unsafe { device.create_image(&image_info, None) },
            "vkCreateImage",
        )?;

        let requirements = unsafe { device.get_image_memory_requirements(self.image) };
        let index = find_memory_type(
            ctx.memory_properties(),
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(index);

        self.memory = vk_check(
            unsafe { device.allocate_memory(&alloc_info, None) },
            "vkAllocateMemory(image)",
        )?;

        vk_check(
            unsafe { device.bind_image_memory(self.image, self.memory, 0) },
            "vkBindImageMemory",
        )?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        self.view = vk_check(
            unsafe { device.create_image_view(&view_info, None) },
            "vkCreateImageView(image)",
        )?;

        Ok(())
    }

    pub fn shutdown(&mut self, ctx: &DeviceContext) {
        let device = ctx.device();
        unsafe {
            if self.view != vk::ImageView::null() {
                device.destroy_image_view(self.view, None);
                self.view = vk::ImageView::null();
            }
            if self.image != vk::Image::null() {
                device.destroy_image(self.image, None);
                self.image = vk::Image::null();
            }
            if self.memory != vk::DeviceMemory::null() {
                device.free_memory(self.memory, None);
                self.memory = vk::DeviceMemory::null();
            }
        }
        self.format = vk::Format::UNDEFINED;
        self.extent = vk::Extent2D::default();
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}
