//! Image access for conversion and tiling.
//!
//! Label code only needs two things from images: their dimensions (probed
//! without a full decode) and, for tiling, load/crop/pad/save. Both sit behind
//! traits so the engines can be driven by a fake in tests.

use std::io::Cursor;
use std::path::Path;

use image::{
    imageops, DynamicImage, ImageBuffer, ImageDecoder, ImageFormat, ImageReader, Pixel, Rgba,
    RgbaImage,
};

use crate::error::RslabelError;
use crate::fsutil::write_atomic;
use crate::ir::ImageInfo;

/// Reads image dimensions and channel count.
pub trait ImageProbe {
    fn probe(&self, path: &Path) -> Result<ImageInfo, RslabelError>;
}

/// Pixel-level operations used by the tiling engine.
pub trait ImageBackend: ImageProbe + Sync {
    type Pixels;

    fn load(&self, path: &Path) -> Result<(ImageInfo, Self::Pixels), RslabelError>;

    /// Copies the region `[x0, x1) x [y0, y1)`, clipped to the image.
    fn crop(&self, pixels: &Self::Pixels, x0: u32, y0: u32, x1: u32, y1: u32) -> Self::Pixels;

    /// Extends `pixels` on the right and bottom to `width` x `height` with
    /// `fill`. Never shrinks.
    fn pad(&self, pixels: Self::Pixels, width: u32, height: u32, fill: [u8; 3]) -> Self::Pixels;

    /// Encodes by the extension of `path` and writes atomically.
    fn save(&self, pixels: &Self::Pixels, path: &Path) -> Result<(), RslabelError>;
}

/// [`ImageBackend`] on top of the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct RasterBackend;

impl ImageProbe for RasterBackend {
    fn probe(&self, path: &Path) -> Result<ImageInfo, RslabelError> {
        let read_error = |source| RslabelError::ImageRead {
            path: path.to_path_buf(),
            source,
        };

        let decoder = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|source| RslabelError::path_io(path, source))?
            .into_decoder()
            .map_err(read_error)?;

        let (width, height) = decoder.dimensions();
        Ok(ImageInfo::new(
            width,
            height,
            decoder.color_type().channel_count(),
        ))
    }
}

impl ImageBackend for RasterBackend {
    type Pixels = DynamicImage;

    fn load(&self, path: &Path) -> Result<(ImageInfo, DynamicImage), RslabelError> {
        let image = image::open(path).map_err(|source| RslabelError::ImageRead {
            path: path.to_path_buf(),
            source,
        })?;
        let info = ImageInfo::new(image.width(), image.height(), image.color().channel_count());
        Ok((info, image))
    }

    fn crop(&self, pixels: &DynamicImage, x0: u32, y0: u32, x1: u32, y1: u32) -> DynamicImage {
        pixels.crop_imm(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    fn pad(&self, pixels: DynamicImage, width: u32, height: u32, fill: [u8; 3]) -> DynamicImage {
        if pixels.width() >= width && pixels.height() >= height {
            return pixels;
        }

        let width = width.max(pixels.width());
        let height = height.max(pixels.height());
        let [r, g, b] = fill;
        // One-pixel swatch, converted to each buffer type by `image` itself.
        let swatch =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([r, g, b, u8::MAX])));

        // Pad in the source's own pixel type so edge tiles keep its bit depth.
        match &pixels {
            DynamicImage::ImageLuma8(buffer) => DynamicImage::ImageLuma8(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_luma8().get_pixel(0, 0),
            )),
            DynamicImage::ImageLumaA8(buffer) => DynamicImage::ImageLumaA8(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_luma_alpha8().get_pixel(0, 0),
            )),
            DynamicImage::ImageRgb8(buffer) => DynamicImage::ImageRgb8(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_rgb8().get_pixel(0, 0),
            )),
            DynamicImage::ImageRgba8(buffer) => DynamicImage::ImageRgba8(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_rgba8().get_pixel(0, 0),
            )),
            DynamicImage::ImageLuma16(buffer) => DynamicImage::ImageLuma16(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_luma16().get_pixel(0, 0),
            )),
            DynamicImage::ImageLumaA16(buffer) => DynamicImage::ImageLumaA16(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_luma_alpha16().get_pixel(0, 0),
            )),
            DynamicImage::ImageRgb16(buffer) => DynamicImage::ImageRgb16(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_rgb16().get_pixel(0, 0),
            )),
            DynamicImage::ImageRgba16(buffer) => DynamicImage::ImageRgba16(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_rgba16().get_pixel(0, 0),
            )),
            DynamicImage::ImageRgb32F(buffer) => DynamicImage::ImageRgb32F(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_rgb32f().get_pixel(0, 0),
            )),
            DynamicImage::ImageRgba32F(buffer) => DynamicImage::ImageRgba32F(pad_buffer(
                buffer,
                width,
                height,
                *swatch.to_rgba32f().get_pixel(0, 0),
            )),
            other => DynamicImage::ImageRgba8(pad_buffer(
                &other.to_rgba8(),
                width,
                height,
                *swatch.to_rgba8().get_pixel(0, 0),
            )),
        }
    }

    fn save(&self, pixels: &DynamicImage, path: &Path) -> Result<(), RslabelError> {
        let write_error = |source| RslabelError::ImageWrite {
            path: path.to_path_buf(),
            source,
        };

        let format = ImageFormat::from_path(path).map_err(write_error)?;
        let mut bytes = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut bytes), format)
            .map_err(write_error)?;
        write_atomic(path, &bytes)
    }
}

/// Copies `source` onto a `width` x `height` canvas of `fill`, top-left aligned.
fn pad_buffer<P: Pixel>(
    source: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
    fill: P,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let mut canvas = ImageBuffer::from_pixel(width, height, fill);
    imageops::replace(&mut canvas, source, 0, 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, GenericImageView, Luma, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, 7])
        }))
    }

    #[test]
    fn crop_clips_to_image() {
        let backend = RasterBackend;
        let image = gradient(50, 40);
        let tile = backend.crop(&image, 30, 20, 80, 70);
        assert_eq!(tile.dimensions(), (20, 20));
        assert_eq!(tile.get_pixel(0, 0).0, [30, 20, 7, 255]);
    }

    #[test]
    fn pad_fills_right_and_bottom_and_keeps_channels() {
        let backend = RasterBackend;
        let padded = backend.pad(gradient(20, 10), 30, 30, [1, 2, 3]);
        assert_eq!(padded.dimensions(), (30, 30));
        assert_eq!(padded.color(), ColorType::Rgb8);
        assert_eq!(padded.get_pixel(5, 5).0, [5, 5, 7, 255]);
        assert_eq!(padded.get_pixel(25, 5).0, [1, 2, 3, 255]);
        assert_eq!(padded.get_pixel(5, 25).0, [1, 2, 3, 255]);
    }

    #[test]
    fn pad_keeps_sixteen_bit_samples() {
        let backend = RasterBackend;
        let deep = DynamicImage::ImageLuma16(ImageBuffer::from_fn(100, 50, |x, y| {
            Luma([40_000 + (x + y) as u16])
        }));

        let cropped = backend.crop(&deep, 0, 0, 300, 300);
        assert_eq!(cropped.color(), ColorType::L16);

        let padded = backend.pad(cropped, 300, 300, [0, 0, 0]);
        assert_eq!(padded.color(), ColorType::L16);
        let samples = padded.as_luma16().expect("luma16 buffer");
        assert_eq!(samples.dimensions(), (300, 300));
        assert_eq!(samples.get_pixel(7, 3).0, [40_010]);
        assert_eq!(samples.get_pixel(150, 10).0, [0]);
        assert_eq!(samples.get_pixel(10, 150).0, [0]);
    }

    #[test]
    fn pad_is_a_no_op_when_large_enough() {
        let backend = RasterBackend;
        let padded = backend.pad(gradient(40, 40), 30, 30, [0, 0, 0]);
        assert_eq!(padded.dimensions(), (40, 40));
    }

    #[test]
    fn save_then_probe_reports_dimensions() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("tile.png");
        let backend = RasterBackend;
        backend.save(&gradient(12, 9), &path).expect("save");

        let info = backend.probe(&path).expect("probe");
        assert_eq!(info, ImageInfo::new(12, 9, 3));

        let (loaded_info, loaded) = backend.load(&path).expect("load");
        assert_eq!(loaded_info, info);
        assert_eq!(loaded.get_pixel(3, 4).0, [3, 4, 7, 255]);
    }

    #[test]
    fn probe_missing_file_is_io_error() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = RasterBackend
            .probe(&temp.path().join("missing.jpg"))
            .unwrap_err();
        assert!(matches!(err, RslabelError::PathIo { .. }));
    }
}
