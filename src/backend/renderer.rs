// Frame scheduler
//
// Drives acquire -> record -> submit -> present once per loop iteration.
//
// Two index spaces coexist and must not be conflated: sync triples are
// indexed by the fixed-size ring slot (frames in flight), while command
// buffers and framebuffers are indexed by the acquired image index, whose
// count is surface-dependent and matches the framebuffers 1:1.

use ash::vk;
use glam::Mat4;

use crate::camera::Camera;

use super::depth::DepthTarget;
use super::device::DeviceContext;
use super::error::{vk_check, GfxError, Result};
use super::mesh::Mesh;
use super::pipeline::RenderPipeline;
use super::swapchain::{Acquire, Swapchain};
use super::sync::FrameSync;

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Outcome of a frame. Staleness is a signal, not an error: the swapchain
/// and its dependents were rebuilt and the caller simply tries again next
/// iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered,
    SwapchainStale,
}

#[derive(Default)]
pub struct Renderer {
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    framebuffers: Vec<vk::Framebuffer>,
    frames: Vec<FrameSync>,
    frame_index: usize,
    clear_color: [f32; 4],
}

impl Renderer {
    pub fn init(
        ctx: &DeviceContext,
        sc: &Swapchain,
        pl: &RenderPipeline,
        depth: Option<&DepthTarget>,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        let mut rd = Self {
            clear_color,
            ..Default::default()
        };
        if let Err(e) = rd.build(ctx, sc, pl, depth.map(DepthTarget::view)) {
            rd.shutdown(ctx);
            return Err(e);
        }
        Ok(rd)
    }

    fn build(
        &mut self,
        ctx: &DeviceContext,
        sc: &Swapchain,
        pl: &RenderPipeline,
        depth_view: Option<vk::ImageView>,
    ) -> Result<()> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(ctx.graphics_queue_family())
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        self.command_pool = vk_check(
            unsafe { ctx.device().create_command_pool(&pool_info, None) },
            "vkCreateCommandPool",
        )?;

        self.allocate_command_buffers(ctx, sc.image_count())?;
        self.create_framebuffers(ctx, sc, pl, depth_view)?;

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            self.frames.push(FrameSync::new(ctx.device())?);
        }

        Ok(())
    }

    /// Waits for the device to go idle first so no submitted work still
    /// references the objects being destroyed. Idempotent.
    pub fn shutdown(&mut self, ctx: &DeviceContext) {
        if let Err(e) = ctx.wait_idle() {
            log::warn!("wait_idle during renderer shutdown failed: {e}");
        }

        for frame in &mut self.frames {
            frame.destroy(ctx.device());
        }
        self.frames.clear();

        self.destroy_framebuffers(ctx);
        self.free_command_buffers(ctx);

        if self.command_pool != vk::CommandPool::null() {
            unsafe { ctx.device().destroy_command_pool(self.command_pool, None) };
            self.command_pool = vk::CommandPool::null();
        }

        self.frame_index = 0;
    }

    /// Render and present one frame.
    ///
    /// `framebuffer_size` is the window's current pixel size, consulted only
    /// when the swapchain has to be rebuilt mid-call. The caller does not
    /// invoke this while the window is minimized.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_frame(
        &mut self,
        ctx: &DeviceContext,
        framebuffer_size: [u32; 2],
        sc: &mut Swapchain,
        pl: &RenderPipeline,
        mut depth: Option<&mut DepthTarget>,
        mesh: &Mesh,
        camera: &Camera,
    ) -> Result<FrameStatus> {
        let device = ctx.device();

        let (image_available, render_finished, in_flight) = {
            let frame = &self.frames[self.frame_index];
            (frame.image_available, frame.render_finished, frame.in_flight)
        };

        // The slot's previous submission must have retired before its
        // command buffer or semaphores are reused.
        vk_check(
            unsafe { device.wait_for_fences(&[in_flight], true, u64::MAX) },
            "vkWaitForFences",
        )?;

        let (image_index, suboptimal_acquire) = match sc.acquire(image_available)? {
            Acquire::Ready { index, suboptimal } => (index, suboptimal),
            Acquire::OutOfDate => {
                // The fence is reset only after a successful acquire, so
                // this early return leaves the slot's fence signaled and no
                // semaphore in flight; the ring slot is not advanced.
                self.recreate_presentation(ctx, framebuffer_size, sc, pl, depth.as_deref_mut())?;
                return Ok(FrameStatus::SwapchainStale);
            }
        };

        vk_check(unsafe { device.reset_fences(&[in_flight]) }, "vkResetFences")?;

        let cb = self.command_buffers[image_index as usize];
        vk_check(
            unsafe { device.reset_command_buffer(cb, vk::CommandBufferResetFlags::empty()) },
            "vkResetCommandBuffer",
        )?;
        self.record_commands(
            ctx,
            cb,
            sc,
            pl,
            self.framebuffers[image_index as usize],
            mesh,
            camera,
        )?;

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cb];
        let signal_semaphores = [render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        vk_check(
            unsafe {
                device.queue_submit(ctx.graphics_queue(), &[submit_info.build()], in_flight)
            },
            "vkQueueSubmit",
        )?;

        let stale = sc.present(ctx.present_queue(), image_index, render_finished)?;

        self.frame_index = (self.frame_index + 1) % MAX_FRAMES_IN_FLIGHT;

        // A suboptimal acquire still rendered and presented this frame;
        // the rebuild happens after the fact.
        if stale || suboptimal_acquire {
            self.recreate_presentation(ctx, framebuffer_size, sc, pl, depth)?;
            return Ok(FrameStatus::SwapchainStale);
        }

        Ok(FrameStatus::Rendered)
    }

    /// Rebuild the swapchain and everything sized to it: depth target,
    /// framebuffers, and the per-image command buffers when the image count
    /// changed. The pipeline survives because the surface format does not
    /// change and viewport/scissor are dynamic.
    pub fn recreate_presentation(
        &mut self,
        ctx: &DeviceContext,
        framebuffer_size: [u32; 2],
        sc: &mut Swapchain,
        pl: &RenderPipeline,
        depth: Option<&mut DepthTarget>,
    ) -> Result<()> {
        ctx.wait_idle()?;

        sc.recreate(ctx, framebuffer_size)?;

        let depth_view = match depth {
            Some(depth) => {
                depth.recreate(ctx, sc.extent())?;
                Some(depth.view())
            }
            None => None,
        };

        self.destroy_framebuffers(ctx);

        if self.command_buffers.len() != sc.image_count() {
            self.free_command_buffers(ctx);
            self.allocate_command_buffers(ctx, sc.image_count())?;
        }

        self.create_framebuffers(ctx, sc, pl, depth_view)
    }

    fn allocate_command_buffers(&mut self, ctx: &DeviceContext, count: usize) -> Result<()> {
        if count == 0 {
            return Err(GfxError::Unsupported(
                "swapchain reported zero images".into(),
            ));
        }

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        self.command_buffers = vk_check(
            unsafe { ctx.device().allocate_command_buffers(&alloc_info) },
            "vkAllocateCommandBuffers",
        )?;
        Ok(())
    }

    fn free_command_buffers(&mut self, ctx: &DeviceContext) {
        if self.command_pool != vk::CommandPool::null() && !self.command_buffers.is_empty() {
            unsafe {
                ctx.device()
                    .free_command_buffers(self.command_pool, &self.command_buffers)
            };
        }
        self.command_buffers.clear();
    }

    fn create_framebuffers(
        &mut self,
        ctx: &DeviceContext,
        sc: &Swapchain,
        pl: &RenderPipeline,
        depth_view: Option<vk::ImageView>,
    ) -> Result<()> {
        debug_assert_eq!(pl.color_format(), sc.format());

        for &view in sc.image_views() {
            let mut attachments = vec![view];
            if let Some(depth_view) = depth_view {
                attachments.push(depth_view);
            }

            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(pl.render_pass())
                .attachments(&attachments)
                .width(sc.extent().width)
                .height(sc.extent().height)
                .layers(1);

            let fb = vk_check(
                unsafe { ctx.device().create_framebuffer(&framebuffer_info, None) },
                "vkCreateFramebuffer",
            )?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    fn destroy_framebuffers(&mut self, ctx: &DeviceContext) {
        for fb in self.framebuffers.drain(..) {
            unsafe { ctx.device().destroy_framebuffer(fb, None) };
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_commands(
        &self,
        ctx: &DeviceContext,
        cb: vk::CommandBuffer,
        sc: &Swapchain,
        pl: &RenderPipeline,
        framebuffer: vk::Framebuffer,
        mesh: &Mesh,
        camera: &Camera,
    ) -> Result<()> {
        let device = ctx.device();
        let extent = sc.extent();

        let begin_info = vk::CommandBufferBeginInfo::builder();
        vk_check(
            unsafe { device.begin_command_buffer(cb, &begin_info) },
            "vkBeginCommandBuffer",
        )?;

        let mut clear_values = vec![vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];
        if pl.depth_format().is_some() {
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        }

        let pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(pl.render_pass())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(cb, &pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cb, vk::PipelineBindPoint::GRAPHICS, pl.pipeline());

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cb, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_set_scissor(cb, 0, &[scissor]);

            let aspect = if extent.height != 0 {
                extent.width as f32 / extent.height as f32
            } else {
                1.0
            };
            let mvp = camera.mvp(aspect, Mat4::IDENTITY);
            device.cmd_push_constants(
                cb,
                pl.layout(),
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&mvp),
            );

            device.cmd_bind_vertex_buffers(cb, 0, &[mesh.vertex_buffer()], &[0]);
            if mesh.index_count() > 0 {
                device.cmd_bind_index_buffer(cb, mesh.index_buffer(), 0, mesh.index_type());
                device.cmd_draw_indexed(cb, mesh.index_count(), 1, 0, 0, 0);
            } else {
                device.cmd_draw(cb, mesh.vertex_count(), 1, 0, 0);
            }

            device.cmd_end_render_pass(cb);
        }

        vk_check(
            unsafe { device.end_command_buffer(cb) },
            "vkEndCommandBuffer",
        )
    }
}
