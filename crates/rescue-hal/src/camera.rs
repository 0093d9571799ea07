//! Generic `Camera` trait and the frame type handed to perception.

use rescue_types::RescueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Gray8,
    Rgb24,
    /// Encoded JPEG bytes; `width`/`height` may be zero when unknown.
    Jpeg,
}

/// A single image from the robot's camera.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// A blank greyscale frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: FrameFormat::Gray8,
            data: vec![0u8; (width * height) as usize],
        }
    }
}

/// A camera or image-capture device.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"front_rgb"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`RescueError::CapabilityFailed`] if no frame could be
    /// captured (device disconnected, bridge unreachable, ...).
    fn capture(&mut self) -> Result<CameraFrame, RescueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
    }

    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture(&mut self) -> Result<CameraFrame, RescueError> {
            Ok(CameraFrame {
                width: 2,
                height: 2,
                format: FrameFormat::Rgb24,
                data: vec![0u8; 4 * 3],
            })
        }
    }

    #[test]
    fn mock_camera_capture() {
        let mut cam = MockCamera {
            id: "front_rgb".to_string(),
        };
        assert_eq!(cam.id(), "front_rgb");
        let frame = cam.capture().unwrap();
        assert_eq!(frame.format, FrameFormat::Rgb24);
        assert_eq!(frame.data.len(), 12);
    }

    #[test]
    fn blank_frame_is_sized() {
        let frame = CameraFrame::blank(4, 3);
        assert_eq!(frame.data.len(), 12);
        assert!(frame.data.iter().all(|b| *b == 0));
    }
}
