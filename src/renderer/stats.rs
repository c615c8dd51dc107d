// renderer/stats.rs

/// Per-camera counters for one frame. Zeroed when the camera's
/// `SetCamera` command executes, accumulated by the draws that follow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub draw_calls: u32,
    pub vertices: u32,
    pub triangles: u32,
    pub lights: u32,
}

impl CameraStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whole-frame totals across recording and presentation, reset when a new
/// frame starts recording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub cameras_rendered: u32,
    pub cameras_skipped: u32,
    pub shadow_maps_rendered: u32,
    pub lights_truncated: u32,
    pub buffers_executed: u32,
    pub draw_calls: u32,
}

impl FrameStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_counters() {
        let mut stats = CameraStats {
            draw_calls: 3,
            vertices: 12,
            triangles: 4,
            lights: 2,
        };
        stats.reset();
        assert_eq!(stats, CameraStats::default());
    }
}
