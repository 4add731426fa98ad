pub mod camera;
pub mod recognizer;
pub mod rgba_converter;
pub mod skeleton;

// Re-exports for convenience
pub use camera::{CameraStream, available_cameras, start_camera_stream};
pub use recognizer::{RecognizerBackend, start_recognizer};
