/// Errors that can occur while talking to a tracker or writing the record stream.
///
/// These never reach stdout as-is. Record-level failures (`no_device`,
/// `runtime_error`) are emitted by the bridge itself; a `BridgeError` means the
/// run cannot continue.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("HID error: {0}")]
    Hid(String),

    #[error("Eye tracker SDK call `{call}` failed with status {status}")]
    Sdk { call: &'static str, status: i32 },

    #[error("Backend `{0}` does not deliver gaze data")]
    Unsupported(&'static str),

    #[error("Gaze data subscription already active")]
    AlreadySubscribed,

    #[error("Backend `{0}` is not compiled in (enable the `{0}` feature)")]
    BackendUnavailable(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Output stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Gaze stream stopped")]
    StreamStopped,
}
