// Synchronization primitives
//
// One triple per frame in flight. The fence starts signaled so the first
// wait on a fresh slot returns immediately.

use ash::vk;

use super::error::{vk_check, Result};

pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let image_available = vk_check(
            unsafe { device.create_semaphore(&semaphore_info, None) },
            "vkCreateSemaphore(image_available)",
        )?;

        let render_finished = match vk_check(
            unsafe { device.create_semaphore(&semaphore_info, None) },
            "vkCreateSemaphore(render_finished)",
        ) {
            Ok(s) => s,
            Err(e) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(e);
            }
        };

        let in_flight = match vk_check(
            unsafe { device.create_fence(&fence_info, None) },
            "vkCreateFence(in_flight)",
        ) {
            Ok(f) => f,
            Err(e) => {
                unsafe {
                    device.destroy_semaphore(render_finished, None);
                    device.destroy_semaphore(image_available, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            if self.in_flight != vk::Fence::null() {
                device.destroy_fence(self.in_flight, None);
                self.in_flight = vk::Fence::null();
            }
            if self.render_finished != vk::Semaphore::null() {
                device.destroy_semaphore(self.render_finished, None);
                self.render_finished = vk::Semaphore::null();
            }
            if self.image_available != vk::Semaphore::null() {
                device.destroy_semaphore(self.image_available, None);
                self.image_available = vk::Semaphore::null();
            }
        }
    }
}
