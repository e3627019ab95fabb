use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub bind_addr: String,
    /// Keep-alive goes out after this long without hearing from the host
    pub keep_alive_interval: Duration,
    /// How long to wait for the mediation service and the host handshake
    pub rendezvous_timeout: Duration,
    pub frame_interval: Duration,
    /// Frames between two player list broadcasts, for interpolation
    pub interpolation_frames: u32,
    /// Own position goes out every this many frames
    pub position_send_every: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".to_string(),
            keep_alive_interval: Duration::from_secs(5),
            rendezvous_timeout: Duration::from_secs(2),
            frame_interval: Duration::from_millis(16),
            interpolation_frames: 6,
            position_send_every: 3,
        }
    }
}
