// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the sensor device abstraction

//! Shared types for sensor devices
//!
//! Streams, formats, frames and the errors reported by the device layer.
//! Skeleton-specific types live in [`super::skeleton`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::skeleton::SkeletonFrame;

/// Connection state reported by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorStatus {
    /// Sensor is attached and ready for streaming
    Connected,
    /// Sensor has been unplugged
    Disconnected,
    /// Sensor is attached and still starting up
    Initializing,
    /// Sensor is attached but the external power supply is missing
    NotPowered,
    /// Sensor is attached but some component is not ready
    NotReady,
    /// Sensor is not a genuine device
    DeviceNotGenuine,
}

impl SensorStatus {
    /// Only a connected sensor may have its streams enabled
    pub fn can_stream(&self) -> bool {
        matches!(self, SensorStatus::Connected)
    }
}

impl std::fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SensorStatus::Connected => "connected",
            SensorStatus::Disconnected => "disconnected",
            SensorStatus::Initializing => "initializing",
            SensorStatus::NotPowered => "not powered",
            SensorStatus::NotReady => "not ready",
            SensorStatus::DeviceNotGenuine => "not genuine",
        };
        f.write_str(name)
    }
}

/// The three streams a sensor can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Depth,
    Color,
    Skeleton,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Depth => write!(f, "depth"),
            StreamKind::Color => write!(f, "color"),
            StreamKind::Skeleton => write!(f, "skeleton"),
        }
    }
}

/// Pixel layout of an image stream as handed to the display layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelLayout {
    /// 16-bit grayscale, one `u16` per pixel
    Gray16,
    /// 32-bit B G R x byte order
    Bgr32,
}

impl PixelLayout {
    /// Bytes occupied by one pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelLayout::Gray16 => 2,
            PixelLayout::Bgr32 => 4,
        }
    }
}

/// Image formats a sensor can be asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    DepthResolution640x480Fps30,
    DepthResolution320x240Fps30,
    DepthResolution80x60Fps30,
    RgbResolution640x480Fps30,
    RgbResolution1280x960Fps12,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::DepthResolution640x480Fps30,
        ImageFormat::DepthResolution320x240Fps30,
        ImageFormat::DepthResolution80x60Fps30,
        ImageFormat::RgbResolution640x480Fps30,
        ImageFormat::RgbResolution1280x960Fps12,
    ];

    /// Frame size in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageFormat::DepthResolution640x480Fps30 | ImageFormat::RgbResolution640x480Fps30 => {
                (640, 480)
            }
            ImageFormat::DepthResolution320x240Fps30 => (320, 240),
            ImageFormat::DepthResolution80x60Fps30 => (80, 60),
            ImageFormat::RgbResolution1280x960Fps12 => (1280, 960),
        }
    }

    pub fn fps(&self) -> u32 {
        match self {
            ImageFormat::RgbResolution1280x960Fps12 => 12,
            _ => 30,
        }
    }

    /// Stream this format belongs to
    pub fn stream_kind(&self) -> StreamKind {
        match self {
            ImageFormat::DepthResolution640x480Fps30
            | ImageFormat::DepthResolution320x240Fps30
            | ImageFormat::DepthResolution80x60Fps30 => StreamKind::Depth,
            ImageFormat::RgbResolution640x480Fps30 | ImageFormat::RgbResolution1280x960Fps12 => {
                StreamKind::Color
            }
        }
    }

    pub fn layout(&self) -> PixelLayout {
        match self.stream_kind() {
            StreamKind::Depth => PixelLayout::Gray16,
            _ => PixelLayout::Bgr32,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (width, height) = self.dimensions();
        write!(
            f,
            "{} {}x{} @ {}fps",
            self.stream_kind(),
            width,
            height,
            self.fps()
        )
    }
}

/// Geometry of an enabled image stream
///
/// Fixed for as long as the stream stays enabled. Buffers sized from a
/// descriptor must be reallocated whenever the stream is re-enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub format: ImageFormat,
}

impl StreamDescriptor {
    pub fn from_format(format: ImageFormat) -> Self {
        let (width, height) = format.dimensions();
        Self {
            width,
            height,
            bytes_per_pixel: format.layout().bytes_per_pixel(),
            format,
        }
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel as usize
    }

    /// Bytes per frame
    pub fn frame_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} ({} B/px, {})",
            self.width, self.height, self.bytes_per_pixel, self.format
        )
    }
}

/// Pixel payload of an image frame
#[derive(Clone)]
pub enum FramePixels {
    /// Depth samples, one per pixel
    Depth(Arc<[u16]>),
    /// Color bytes, `bytes_per_pixel` per pixel
    Color(Arc<[u8]>),
}

impl std::fmt::Debug for FramePixels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramePixels::Depth(data) => write!(f, "FramePixels::Depth({} samples)", data.len()),
            FramePixels::Color(data) => write!(f, "FramePixels::Color({} bytes)", data.len()),
        }
    }
}

/// A single depth or color image delivered by the sensor
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub frame_number: u64,
    pub timestamp_ms: u64,
    pub pixels: FramePixels,
}

impl ImageFrame {
    /// Build a depth frame from raw samples
    pub fn depth(format: ImageFormat, frame_number: u64, samples: Vec<u16>) -> Self {
        let (width, height) = format.dimensions();
        Self {
            format,
            width,
            height,
            bytes_per_pixel: format.layout().bytes_per_pixel(),
            frame_number,
            timestamp_ms: 0,
            pixels: FramePixels::Depth(samples.into()),
        }
    }

    /// Build a color frame from raw bytes
    pub fn color(format: ImageFormat, frame_number: u64, bytes: Vec<u8>) -> Self {
        let (width, height) = format.dimensions();
        Self {
            format,
            width,
            height,
            bytes_per_pixel: format.layout().bytes_per_pixel(),
            frame_number,
            timestamp_ms: 0,
            pixels: FramePixels::Color(bytes.into()),
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self.pixels {
            FramePixels::Depth(_) => StreamKind::Depth,
            FramePixels::Color(_) => StreamKind::Color,
        }
    }

    /// Number of elements in the payload (samples for depth, bytes for color)
    pub fn pixel_data_length(&self) -> usize {
        match &self.pixels {
            FramePixels::Depth(data) => data.len(),
            FramePixels::Color(data) => data.len(),
        }
    }

    /// Payload viewed as raw bytes, in native byte order
    pub fn as_bytes(&self) -> &[u8] {
        match &self.pixels {
            FramePixels::Depth(data) => bytemuck::cast_slice(&data[..]),
            FramePixels::Color(data) => &data[..],
        }
    }

    /// Copy the payload into a caller-provided buffer
    ///
    /// Copies `min(dst.len(), payload.len())` bytes and returns the count.
    pub fn copy_pixel_data_to(&self, dst: &mut [u8]) -> usize {
        let src = self.as_bytes();
        let len = src.len().min(dst.len());
        dst[..len].copy_from_slice(&src[..len]);
        len
    }
}

/// A frame-ready notification
///
/// Each variant carries the frame if the device managed to produce one in
/// time. `None` is the normal "nothing this tick" case.
#[derive(Debug, Clone)]
pub enum FrameReady {
    Depth(Option<ImageFrame>),
    Color(Option<ImageFrame>),
    Skeleton(Option<SkeletonFrame>),
}

impl FrameReady {
    pub fn kind(&self) -> StreamKind {
        match self {
            FrameReady::Depth(_) => StreamKind::Depth,
            FrameReady::Color(_) => StreamKind::Color,
            FrameReady::Skeleton(_) => StreamKind::Skeleton,
        }
    }
}

/// Receiver half of a device's frame-ready notifications
pub type FrameReceiver = tokio::sync::mpsc::Receiver<FrameReady>;

/// Sender half of a device's frame-ready notifications
pub type FrameSender = tokio::sync::mpsc::Sender<FrameReady>;

/// Result type for device operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Error types for device operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// Operation requires a connected sensor
    NotConnected(SensorStatus),
    /// Stream must be enabled first
    StreamNotEnabled(StreamKind),
    /// Format cannot be used for the requested stream
    FormatNotSupported(ImageFormat),
    /// Device is already started
    AlreadyRunning,
    /// Device went away during the operation
    Disconnected,
    /// Other errors
    Other(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::NotConnected(status) => write!(f, "Sensor not connected ({})", status),
            SensorError::StreamNotEnabled(kind) => write!(f, "{} stream not enabled", kind),
            SensorError::FormatNotSupported(format) => {
                write!(f, "Format not supported: {}", format)
            }
            SensorError::AlreadyRunning => write!(f, "Sensor already running"),
            SensorError::Disconnected => write!(f, "Sensor disconnected"),
            SensorError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for SensorError {}
