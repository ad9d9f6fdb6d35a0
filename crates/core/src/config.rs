//! Session driver configuration

/// Channel capacities for the session driver.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Operator command queue depth
    pub command_buffer: usize,
    /// Internal completion queue depth (capture results, action failures)
    pub internal_buffer: usize,
    /// Playback route queue depth
    pub playback_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_buffer: 16,
            internal_buffer: 32,
            playback_buffer: 16,
        }
    }
}
