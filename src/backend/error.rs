// Error taxonomy for the Vulkan backend
//
// Two fatal kinds: capability/configuration failures (no fallback exists)
// and raw API failures (wrapped with the call name and numeric code).
// Presentation staleness is NOT an error; see renderer::FrameStatus.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = GfxError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GfxError {
    /// No device, format, memory type or similar capability satisfies the
    /// request. There is no fallback path; callers abort after cleanup.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    /// A Vulkan call returned something other than VK_SUCCESS.
    #[error("{call} failed ({code:?})")]
    Api {
        call: &'static str,
        code: vk::Result,
    },

    /// Shader bytecode could not be loaded (missing, empty, misaligned).
    #[error("shader {path:?}: {reason}")]
    Shader { path: PathBuf, reason: String },
}

/// Wrap a raw Vulkan result with the name of the call that produced it.
pub fn vk_check<T>(result: std::result::Result<T, vk::Result>, call: &'static str) -> Result<T> {
    result.map_err(|code| GfxError::Api { call, code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_carries_call_and_code() {
        let r: std::result::Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
        let err = vk_check(r, "vkQueueSubmit").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("vkQueueSubmit"));
        assert!(msg.contains("ERROR_DEVICE_LOST"));
    }

    #[test]
    fn success_passes_through() {
        let r: std::result::Result<u32, vk::Result> = Ok(7);
        assert_eq!(vk_check(r, "vkAnything").unwrap(), 7);
    }
}
