// Swapchain - window presentation
//
// Owns the presentable image views; the images themselves belong to the
// presentation engine. Becomes stale when the window surface changes and is
// then destroyed-and-rebuilt, passing the old handle to the driver.

use ash::extensions::khr;
use ash::vk;

use super::device::DeviceContext;
use super::error::{vk_check, GfxError, Result};

/// Outcome of an image acquisition.
pub enum Acquire {
    Ready { index: u32, suboptimal: bool },
    OutOfDate,
}

pub struct Swapchain {
    loader: khr::Swapchain,
    handle: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    preferred_present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// `framebuffer` is the window's current pixel size, used only when the
    /// surface does not report a fixed extent.
    pub fn init(
        ctx: &DeviceContext,
        framebuffer: [u32; 2],
        preferred_present_mode: vk::PresentModeKHR,
    ) -> Result<Self> {
        let loader = khr::Swapchain::new(ctx.instance(), ctx.device());
        let mut sc = Self {
            loader,
            handle: vk::SwapchainKHR::null(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            image_views: Vec::new(),
            preferred_present_mode,
        };
        if let Err(e) = sc.build(ctx, framebuffer, vk::SwapchainKHR::null()) {
            sc.shutdown(ctx);
            return Err(e);
        }
        Ok(sc)
    }

    /// Rebuild after the surface went stale. The caller guarantees a
    /// non-zero framebuffer (the event loop defers recreation while the
    /// window is minimized). The old swapchain handle is forwarded to the
    /// driver and destroyed once the replacement exists.
    pub fn recreate(&mut self, ctx: &DeviceContext, framebuffer: [u32; 2]) -> Result<()> {
        ctx.wait_idle()?;

        self.destroy_image_views(ctx);

        let old = self.handle;
        self.handle = vk::SwapchainKHR::null();

        let result = self.build(ctx, framebuffer, old);

        if old != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(old, None) };
        }

        result
    }

    fn build(
        &mut self,
        ctx: &DeviceContext,
        framebuffer: [u32; 2],
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<()> {
        let caps = vk_check(
            unsafe {
                ctx.surface_loader().get_physical_device_surface_capabilities(
                    ctx.physical_device(),
                    ctx.surface(),
                )
            },
            "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
        )?;
        let formats = vk_check(
            unsafe {
                ctx.surface_loader()
                    .get_physical_device_surface_formats(ctx.physical_device(), ctx.surface())
            },
            "vkGetPhysicalDeviceSurfaceFormatsKHR",
        )?;
        let present_modes = vk_check(
            unsafe {
                ctx.surface_loader().get_physical_device_surface_present_modes(
                    ctx.physical_device(),
                    ctx.surface(),
                )
            },
            "vkGetPhysicalDeviceSurfacePresentModesKHR",
        )?;

        let surface_format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes, self.preferred_present_mode);
        let extent = choose_extent(&caps, framebuffer);
        let image_count = choose_image_count(&caps);

        let queue_families = [ctx.graphics_queue_family(), ctx.present_queue_family()];
        let distinct_families = queue_families[0] != queue_families[1];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(ctx.surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if distinct_families {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        self.handle = vk_check(
            unsafe { self.loader.create_swapchain(&create_info, None) },
            "vkCreateSwapchainKHR",
        )?;
        self.format = surface_format.format;
        self.extent = extent;

        self.images = vk_check(
            unsafe { self.loader.get_swapchain_images(self.handle) },
            "vkGetSwapchainImagesKHR",
        )?;

        log::info!(
            "Swapchain: {} images, {}x{}, {:?}, {:?}",
            self.images.len(),
            extent.width,
            extent.height,
            surface_format.format,
            present_mode
        );

        self.create_image_views(ctx)
    }

    fn create_image_views(&mut self, ctx: &DeviceContext) -> Result<()> {
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = vk_check(
                unsafe { ctx.device().create_image_view(&create_info, None) },
                "vkCreateImageView(swapchain)",
            )?;
            self.image_views.push(view);
        }
        Ok(())
    }

    fn destroy_image_views(&mut self, ctx: &DeviceContext) {
        for view in self.image_views.drain(..) {
            unsafe { ctx.device().destroy_image_view(view, None) };
        }
    }

    pub fn shutdown(&mut self, ctx: &DeviceContext) {
        self.destroy_image_views(ctx);

        if self.handle != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(self.handle, None) };
            self.handle = vk::SwapchainKHR::null();
        }

        self.images.clear();
        self.format = vk::Format::UNDEFINED;
        self.extent = vk::Extent2D::default();
    }

    pub fn acquire(&self, semaphore: vk::Semaphore) -> Result<Acquire> {
        match unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        } {
            Ok((index, suboptimal)) => Ok(Acquire::Ready { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
            Err(code) => Err(GfxError::Api {
                call: "vkAcquireNextImageKHR",
                code,
            }),
        }
    }

    /// Present `image_index` on the given queue. Returns true when the
    /// surface is stale (out of date or suboptimal) and must be rebuilt.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.handle];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(code) => Err(GfxError::Api {
                call: "vkQueuePresentKHR",
                code,
            }),
        }
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// Prefer 8-bit sRGB BGRA; otherwise take the first reported format.
/// Zero available formats is fatal.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    if formats.is_empty() {
        return Err(GfxError::Unsupported("no surface formats available".into()));
    }
    Ok(formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0]))
}

/// The configured preference when offered, else MAILBOX, else FIFO (which
/// is always available).
fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if modes.contains(&preferred) {
        return preferred;
    }
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }
    vk::PresentModeKHR::FIFO
}

/// The surface's fixed extent when reported, else the framebuffer size
/// clamped into the allowed range. A momentarily 0x0 framebuffer clamps to
/// at least 1x1 instead of producing degenerate geometry.
fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: [u32; 2]) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let width = framebuffer[0].max(1);
    let height = framebuffer[1].max(1);

    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// min + 1, clamped to the maximum when the surface reports one (0 means
/// unbounded).
fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && count > caps.max_image_count {
        count = caps.max_image_count;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn srgb_format_preferred_when_offered() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn first_format_is_the_fallback() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        }];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R16G16B16A16_SFLOAT);
    }

    #[test]
    fn zero_formats_is_fatal() {
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn present_mode_preference_chain() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            choose_present_mode(&all, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::IMMEDIATE
        );

        let no_immediate = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&no_immediate, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::MAILBOX
        );

        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&fifo_only, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn fixed_extent_wins_over_framebuffer() {
        let mut c = caps(2, 0);
        c.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = choose_extent(&c, [1280, 720]);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn framebuffer_is_clamped_into_range() {
        let extent = choose_extent(&caps(2, 0), [10_000, 5]);
        assert_eq!((extent.width, extent.height), (4096, 5));
    }

    #[test]
    fn zero_framebuffer_clamps_to_one() {
        let extent = choose_extent(&caps(2, 0), [0, 0]);
        assert!(extent.width >= 1 && extent.height >= 1);
    }

    #[test]
    fn image_count_is_min_plus_one_within_bounds() {
        for (min, max) in [(1u32, 0u32), (2, 3), (2, 2), (3, 8)] {
            let c = caps(min, max);
            let count = choose_image_count(&c);
            assert!(count >= c.min_image_count);
            if c.max_image_count > 0 {
                assert!(count <= c.max_image_count);
            } else {
                assert_eq!(count, c.min_image_count + 1);
            }
        }
    }
}
