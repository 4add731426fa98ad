use std::time::Instant;

use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use thiserror::Error;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{format} buffer too small for {width}x{height}: got {got} bytes, need {need}")]
    BufferTooSmall {
        format: &'static str,
        width: u32,
        height: u32,
        got: usize,
        need: usize,
    },
    #[error("MJPEG decode failed: {0}")]
    Jpeg(String),
    #[error("{format} to RGBA conversion failed: {reason}")]
    Yuv {
        format: &'static str,
        reason: String,
    },
}

/// Decodes one camera buffer into an RGBA [`Frame`] stamped with `timestamp`.
pub fn convert_camera_frame(buffer: &Buffer, timestamp: Instant) -> Result<Frame, ConvertError> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = buffer.buffer();

    let (rgba, width, height) = match buffer.source_frame_format() {
        FrameFormat::NV12 => (nv12_to_rgba(data, width, height)?, width, height),
        FrameFormat::YUYV => (yuyv_to_rgba(data, width, height)?, width, height),
        FrameFormat::MJPEG => mjpeg_to_rgba(data)?,
        FrameFormat::RAWRGB => (packed_to_rgba(data, width, height, Layout::Rgb)?, width, height),
        FrameFormat::RAWBGR => (packed_to_rgba(data, width, height, Layout::Bgr)?, width, height),
        FrameFormat::GRAY => (packed_to_rgba(data, width, height, Layout::Gray)?, width, height),
    };

    Ok(Frame {
        rgba,
        width,
        height,
        timestamp,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    Rgb,
    Bgr,
    Gray,
}

impl Layout {
    fn name(self) -> &'static str {
        match self {
            Layout::Rgb => "RGB",
            Layout::Bgr => "BGR",
            Layout::Gray => "GRAY",
        }
    }

    fn bytes_per_pixel(self) -> usize {
        match self {
            Layout::Rgb | Layout::Bgr => 3,
            Layout::Gray => 1,
        }
    }
}

fn check_len(
    format: &'static str,
    data: &[u8],
    width: u32,
    height: u32,
    need: usize,
) -> Result<(), ConvertError> {
    if data.len() < need {
        return Err(ConvertError::BufferTooSmall {
            format,
            width,
            height,
            got: data.len(),
            need,
        });
    }
    Ok(())
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    let y_plane_len = pixel_count(width, height);
    let uv_plane_len = y_plane_len / 2;
    check_len("NV12", data, width, height, y_plane_len + uv_plane_len)?;

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_plane_len],
        y_stride: width,
        uv_plane: &data[y_plane_len..y_plane_len + uv_plane_len],
        uv_stride: width,
        width,
        height,
    };

    let mut rgba = vec![0u8; y_plane_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| ConvertError::Yuv {
        format: "NV12",
        reason: format!("{err:?}"),
    })?;

    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    check_len("YUYV", data, width, height, pixel_count(width, height) * 2)?;

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| ConvertError::Yuv {
        format: "YUYV",
        reason: format!("{err:?}"),
    })?;

    Ok(rgba)
}

/// MJPEG carries its own dimensions, which win over the negotiated ones.
fn mjpeg_to_rgba(data: &[u8]) -> Result<(Vec<u8>, u32, u32), ConvertError> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| ConvertError::Jpeg(format!("{err:?}")))?;

    let info = decoder
        .info()
        .ok_or_else(|| ConvertError::Jpeg("missing image info after decode".to_string()))?;
    let (width, height) = (jpeg_dimension(info.width)?, jpeg_dimension(info.height)?);
    check_len("MJPEG", &rgba, width, height, pixel_count(width, height) * 4)?;

    Ok((rgba, width, height))
}

fn jpeg_dimension<T: TryInto<u32>>(value: T) -> Result<u32, ConvertError> {
    value
        .try_into()
        .map_err(|_| ConvertError::Jpeg("MJPEG dimensions do not fit u32".to_string()))
}

fn packed_to_rgba(
    data: &[u8],
    width: u32,
    height: u32,
    layout: Layout,
) -> Result<Vec<u8>, ConvertError> {
    let bpp = layout.bytes_per_pixel();
    check_len(layout.name(), data, width, height, pixel_count(width, height) * bpp)?;

    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(bpp))
        .for_each(|(dst, src)| {
            let [r, g, b] = match layout {
                Layout::Rgb => [src[0], src[1], src[2]],
                Layout::Bgr => [src[2], src[1], src[0]],
                Layout::Gray => [src[0]; 3],
            };
            dst.copy_from_slice(&[r, g, b, 255]);
        });

    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_swaps_into_rgba() {
        let bgr = [10, 20, 30, 40, 50, 60];
        let rgba = packed_to_rgba(&bgr, 2, 1, Layout::Bgr).unwrap();
        assert_eq!(rgba, vec![30, 20, 10, 255, 60, 50, 40, 255]);
    }

    #[test]
    fn gray_expands_to_opaque_rgba() {
        let rgba = packed_to_rgba(&[7, 200], 1, 2, Layout::Gray).unwrap();
        assert_eq!(rgba, vec![7, 7, 7, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = packed_to_rgba(&[1, 2, 3], 2, 1, Layout::Rgb).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::BufferTooSmall { got: 3, need: 6, .. }
        ));

        let err = nv12_to_rgba(&[0; 5], 2, 2).unwrap_err();
        assert!(matches!(err, ConvertError::BufferTooSmall { format: "NV12", .. }));
    }
}
