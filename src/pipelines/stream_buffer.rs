// SPDX-License-Identifier: GPL-3.0-only

//! Pixel buffers for depth and color streams
//!
//! A [`PixelBuffer`] is sized once from a [`StreamDescriptor`] and then
//! overwritten in place by every frame of that stream. Frames whose payload
//! does not match the buffer's `width × height × bytes_per_pixel` are
//! rejected and leave the buffer untouched; callers must allocate a new
//! buffer whenever the stream is re-enabled.

use std::sync::Arc;

use tracing::debug;

use crate::backends::sensor::{ImageFrame, PixelLayout, StreamDescriptor, StreamKind};

pub type BufferResult<T> = Result<T, BufferError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Frame payload length differs from the buffer size
    SizeMismatch { expected: usize, actual: usize },
    /// Frame belongs to another stream
    KindMismatch {
        expected: StreamKind,
        actual: StreamKind,
    },
    /// Target rectangle does not fit inside the buffer
    RectOutOfBounds(PixelRect),
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::SizeMismatch { expected, actual } => write!(
                f,
                "Frame is {} bytes, buffer expects {} bytes",
                actual, expected
            ),
            BufferError::KindMismatch { expected, actual } => {
                write!(f, "Got a {} frame for a {} buffer", actual, expected)
            }
            BufferError::RectOutOfBounds(rect) => write!(
                f,
                "Rectangle {}x{} at ({}, {}) is outside the buffer",
                rect.width, rect.height, rect.x, rect.y
            ),
        }
    }
}

impl std::error::Error for BufferError {}

/// Rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Result of offering a frame to a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Buffer now holds the frame
    Written,
    /// No frame this tick, buffer unchanged
    Skipped,
}

/// Pre-sized pixel storage for one image stream
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    kind: StreamKind,
    descriptor: StreamDescriptor,
    rect: PixelRect,
    stride: usize,
    data: Vec<u8>,
    frame_number: Option<u64>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer for `descriptor`
    pub fn new(kind: StreamKind, descriptor: StreamDescriptor) -> Self {
        debug!(stream = %kind, %descriptor, "Allocating pixel buffer");
        Self {
            kind,
            descriptor,
            rect: PixelRect::full(descriptor.width, descriptor.height),
            stride: descriptor.stride(),
            data: vec![0; descriptor.frame_len()],
            frame_number: None,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn layout(&self) -> PixelLayout {
        self.descriptor.format.layout()
    }

    /// Full-frame rectangle
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Frame number of the last frame written
    pub fn frame_number(&self) -> Option<u64> {
        self.frame_number
    }

    /// Copy a frame into the buffer
    ///
    /// `None` is the normal "no frame this tick" case and is skipped.
    pub fn write_frame(&mut self, frame: Option<&ImageFrame>) -> BufferResult<WriteOutcome> {
        let Some(frame) = frame else {
            return Ok(WriteOutcome::Skipped);
        };

        if frame.kind() != self.kind {
            return Err(BufferError::KindMismatch {
                expected: self.kind,
                actual: frame.kind(),
            });
        }

        let pixels = frame.as_bytes();
        if pixels.len() != self.data.len() {
            return Err(BufferError::SizeMismatch {
                expected: self.data.len(),
                actual: pixels.len(),
            });
        }

        let rect = self.rect;
        let stride = self.stride;
        self.write_pixels(rect, pixels, stride)?;
        self.frame_number = Some(frame.frame_number);
        Ok(WriteOutcome::Written)
    }

    /// Copy `src` rows of `src_stride` bytes into `rect`
    pub fn write_pixels(&mut self, rect: PixelRect, src: &[u8], src_stride: usize) -> BufferResult<()> {
        let bpp = self.descriptor.bytes_per_pixel as usize;
        let fits = rect.x.checked_add(rect.width).is_some_and(|r| r <= self.descriptor.width)
            && rect.y.checked_add(rect.height).is_some_and(|b| b <= self.descriptor.height);
        if !fits {
            return Err(BufferError::RectOutOfBounds(rect));
        }

        let row_len = rect.width as usize * bpp;
        let rows = rect.height as usize;
        if rows == 0 || row_len == 0 {
            return Ok(());
        }

        let needed = (rows - 1) * src_stride + row_len;
        if src_stride < row_len || src.len() < needed {
            return Err(BufferError::SizeMismatch {
                expected: needed,
                actual: src.len(),
            });
        }

        if rect == self.rect && src_stride == self.stride {
            let len = self.data.len();
            self.data.copy_from_slice(&src[..len]);
            return Ok(());
        }

        for row in 0..rows {
            let dst_start = (rect.y as usize + row) * self.stride + rect.x as usize * bpp;
            let src_start = row * src_stride;
            self.data[dst_start..dst_start + row_len]
                .copy_from_slice(&src[src_start..src_start + row_len]);
        }
        Ok(())
    }

    /// Immutable copy for handing to the display layer
    pub fn snapshot(&self) -> PixelSnapshot {
        PixelSnapshot {
            kind: self.kind,
            descriptor: self.descriptor,
            stride: self.stride,
            frame_number: self.frame_number,
            data: Arc::from(self.data.as_slice()),
        }
    }
}

/// Shared, read-only view of a buffer at one point in time
#[derive(Clone)]
pub struct PixelSnapshot {
    pub kind: StreamKind,
    pub descriptor: StreamDescriptor,
    pub stride: usize,
    pub frame_number: Option<u64>,
    pub data: Arc<[u8]>,
}

impl std::fmt::Debug for PixelSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelSnapshot")
            .field("kind", &self.kind)
            .field("descriptor", &self.descriptor)
            .field("frame_number", &self.frame_number)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::ImageFormat;

    fn depth_buffer() -> PixelBuffer {
        PixelBuffer::new(
            StreamKind::Depth,
            StreamDescriptor::from_format(ImageFormat::DepthResolution80x60Fps30),
        )
    }

    #[test]
    fn test_buffer_sized_from_descriptor() {
        let buffer = depth_buffer();
        assert_eq!(buffer.stride(), 160);
        assert_eq!(buffer.data().len(), 80 * 60 * 2);
        assert_eq!(buffer.rect(), PixelRect::full(80, 60));
        assert_eq!(buffer.layout(), PixelLayout::Gray16);
    }

    #[test]
    fn test_absent_frame_is_skipped() {
        let mut buffer = depth_buffer();
        assert_eq!(buffer.write_frame(None), Ok(WriteOutcome::Skipped));
        assert!(buffer.frame_number().is_none());
    }

    #[test]
    fn test_frame_copied_verbatim() {
        let mut buffer = depth_buffer();
        let samples: Vec<u16> = (0..80 * 60).map(|i| i as u16).collect();
        let frame = ImageFrame::depth(ImageFormat::DepthResolution80x60Fps30, 7, samples);

        assert_eq!(buffer.write_frame(Some(&frame)), Ok(WriteOutcome::Written));
        assert_eq!(buffer.data(), frame.as_bytes());
        assert_eq!(buffer.frame_number(), Some(7));
    }

    #[test]
    fn test_mismatched_size_rejected_and_buffer_untouched() {
        let mut buffer = depth_buffer();
        let good = ImageFrame::depth(ImageFormat::DepthResolution80x60Fps30, 1, vec![9; 80 * 60]);
        buffer.write_frame(Some(&good)).unwrap();

        // Frame from a 320x240 stream offered to an 80x60 buffer
        let larger = ImageFrame::depth(
            ImageFormat::DepthResolution320x240Fps30,
            2,
            vec![1; 320 * 240],
        );
        assert_eq!(
            buffer.write_frame(Some(&larger)),
            Err(BufferError::SizeMismatch {
                expected: 80 * 60 * 2,
                actual: 320 * 240 * 2,
            })
        );

        let mut truncated = good.clone();
        truncated.pixels = crate::backends::sensor::FramePixels::Depth(vec![1u16; 10].into());
        assert!(matches!(
            buffer.write_frame(Some(&truncated)),
            Err(BufferError::SizeMismatch { actual: 20, .. })
        ));

        assert_eq!(buffer.data(), good.as_bytes());
        assert_eq!(buffer.frame_number(), Some(1));
    }

    #[test]
    fn test_color_frame_rejected_by_depth_buffer() {
        let mut buffer = depth_buffer();
        let frame = ImageFrame::color(ImageFormat::RgbResolution640x480Fps30, 1, vec![0; 16]);
        assert_eq!(
            buffer.write_frame(Some(&frame)),
            Err(BufferError::KindMismatch {
                expected: StreamKind::Depth,
                actual: StreamKind::Color,
            })
        );
    }

    #[test]
    fn test_write_pixels_sub_rect() {
        let mut buffer = PixelBuffer::new(
            StreamKind::Color,
            StreamDescriptor::from_format(ImageFormat::RgbResolution640x480Fps30),
        );
        let rect = PixelRect {
            x: 1,
            y: 2,
            width: 2,
            height: 2,
        };
        // Source rows padded to 12 bytes
        let src: Vec<u8> = (0..24).collect();
        buffer.write_pixels(rect, &src, 12).unwrap();

        let stride = buffer.stride();
        assert_eq!(&buffer.data()[2 * stride + 4..2 * stride + 12], &src[0..8]);
        assert_eq!(&buffer.data()[3 * stride + 4..3 * stride + 12], &src[12..20]);
        assert_eq!(buffer.data()[2 * stride], 0);

        let outside = PixelRect {
            x: 639,
            y: 0,
            width: 2,
            height: 1,
        };
        assert_eq!(
            buffer.write_pixels(outside, &src, 12),
            Err(BufferError::RectOutOfBounds(outside))
        );
    }
}
