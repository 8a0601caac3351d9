// One-shot upload command buffers
//
// Uploads happen at mesh-load time, not per frame, so the submit path is
// synchronous: end_and_submit blocks until the graphics queue is idle.
// The render loop and uploads share that queue; the blocking protocol is
// what keeps their submissions serialized.

use ash::vk;

use super::error::{vk_check, GfxError, Result};

#[derive(Default)]
pub struct Uploader {
    command_pool: vk::CommandPool,
}

impl Uploader {
    pub fn init(device: &ash::Device, graphics_queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);

        let command_pool = vk_check(
            unsafe { device.create_command_pool(&pool_info, None) },
            "vkCreateCommandPool(upload)",
        )?;

        Ok(Self { command_pool })
    }

    pub fn shutdown(&mut self, device: &ash::Device) {
        if self.command_pool != vk::CommandPool::null() {
            unsafe { device.destroy_command_pool(self.command_pool, None) };
            self.command_pool = vk::CommandPool::null();
        }
    }

    /// Allocate and begin a short-lived primary command buffer.
    pub fn begin(&self, device: &ash::Device) -> Result<vk::CommandBuffer> {
        if self.command_pool == vk::CommandPool::null() {
            return Err(GfxError::Unsupported("uploader is not initialized".into()));
        }

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cb = vk_check(
            unsafe { device.allocate_command_buffers(&alloc_info) },
            "vkAllocateCommandBuffers(upload)",
        )?[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        if let Err(e) = vk_check(
            unsafe { device.begin_command_buffer(cb, &begin_info) },
            "vkBeginCommandBuffer(upload)",
        ) {
            unsafe { device.free_command_buffers(self.command_pool, &[cb]) };
            return Err(e);
        }

        Ok(cb)
    }

    /// End recording, submit with no semaphores, block until the queue is
    /// idle, then free the command buffer.
    pub fn end_and_submit(
        &self,
        device: &ash::Device,
        queue: vk::Queue,
        cb: vk::CommandBuffer,
    ) -> Result<()> {
        let result = (|| {
            vk_check(
                unsafe { device.end_command_buffer(cb) },
                "vkEndCommandBuffer(upload)",
            )?;

            let command_buffers = [cb];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

            vk_check(
                unsafe { device.queue_submit(queue, &[submit_info.build()], vk::Fence::null()) },
                "vkQueueSubmit(upload)",
            )?;
            vk_check(
                unsafe { device.queue_wait_idle(queue) },
                "vkQueueWaitIdle(upload)",
            )
        })();

        unsafe { device.free_command_buffers(self.command_pool, &[cb]) };
        result
    }
}
