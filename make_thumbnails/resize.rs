use std::io::{BufWriter, Write as _};
use std::path::Path;

use anyhow::Context as _;
use common::{new_temp_file_in, quote_path};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Largest size with the aspect ratio of `source` which fits in `bounds`. Never below 1 pixel.
#[must_use]
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_width, src_height) = (u64::from(source.0.max(1)), u64::from(source.1.max(1)));
    let (width, height) = (u64::from(bounds.0), u64::from(bounds.1));
    let (new_width, new_height) = if src_width * height > width * src_height {
        (width, width * src_height / src_width)
    } else {
        (height * src_width / src_height, height)
    };
    (to_dimension(new_width), to_dimension(new_height))
}

fn to_dimension(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX).max(1)
}

/// Writes the thumbnail of `input` to `output`, which must not exist. The format follows the
/// extension of `output`. `quality` only applies to JPEG.
pub fn create_thumbnail(
    input: &Path,
    output: &Path,
    bounds: (u32, u32),
    quality: u8,
) -> anyhow::Result<()> {
    let image = image::open(input)
        .with_context(|| format!("failed to decode the image {}", quote_path(input)))?;
    let (width, height) = fit_within((image.width(), image.height()), bounds);
    let thumbnail = image.resize_exact(width, height, FilterType::Lanczos3);

    let format = ImageFormat::from_path(output)
        .with_context(|| format!("no image format for {}", quote_path(output)))?;
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = new_temp_file_in(parent)
        .with_context(|| format!("failed to create a temporary file in {}", quote_path(parent)))?;
    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        let encoded = if format == ImageFormat::Jpeg {
            flatten_on_white(&thumbnail)
                .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
        } else {
            thumbnail.write_to(&mut writer, format)
        };
        encoded.with_context(|| {
            format!("failed to encode the thumbnail of {}", quote_path(input))
        })?;
        writer.flush().with_context(|| format!("failed to write {}", quote_path(output)))?;
    }
    temp_file
        .persist_noclobber(output)
        .with_context(|| format!("failed to write {}", quote_path(output)))?;
    Ok(())
}

/// JPEG has no alpha channel: transparent pixels become white.
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [red, green, blue, alpha] = rgba.get_pixel(x, y).0;
        let blend = |channel: u8| {
            let (channel, alpha) = (u16::from(channel), u16::from(alpha));
            let blended = (channel * alpha + 255 * (255 - alpha) + 127) / 255;
            u8::try_from(blended).unwrap_or(u8::MAX)
        };
        Rgb([blend(red), blend(green), blend(blue)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_fs::TempDir;
    use assert_fs::fixture::{FileWriteStr as _, PathChild as _};

    use test_helper::{Check as _, check_err_contains, write_image, write_transparent_image};

    #[test]
    fn wide_images_fit_the_width() {
        assert_eq!(fit_within((4000, 2000), (800, 600)), (800, 400));
        assert_eq!(fit_within((1000, 10), (800, 600)), (800, 8));
        assert_eq!(fit_within((100_000, 1), (800, 600)), (800, 1));
    }

    #[test]
    fn tall_images_fit_the_height() {
        assert_eq!(fit_within((3000, 4000), (800, 600)), (450, 600));
        assert_eq!(fit_within((1, 100_000), (800, 600)), (1, 600));
    }

    #[test]
    fn same_ratio_fits_exactly() {
        assert_eq!(fit_within((1600, 1200), (800, 600)), (800, 600));
        assert_eq!(fit_within((40, 30), (800, 600)), (800, 600));
    }

    #[test]
    fn png_thumbnail() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let input = temp.child("in.png");
        let output = temp.child("out.png");
        write_image(&input, 64, 32)?;
        create_thumbnail(&input, &output, (16, 16), 85)?;
        output.check_is_image_with_dimensions(16, 8)
    }

    #[test]
    fn transparent_image_to_jpeg_is_flattened_on_white() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let input = temp.child("in.png");
        let output = temp.child("out.jpg");
        write_transparent_image(&input, 20, 40)?;
        create_thumbnail(&input, &output, (10, 10), 90)?;
        output.check_is_image_with_dimensions(5, 10)?;
        let decoded = image::open(&output)?.to_rgb8();
        let Rgb([red, green, blue]) = *decoded.get_pixel(2, 5);
        assert!(red > 245 && green > 245 && blue > 245, "{red} {green} {blue}");
        Ok(())
    }

    #[test]
    fn existing_output_is_not_replaced() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let input = temp.child("in.png");
        let output = temp.child("out.png");
        write_image(&input, 10, 10)?;
        output.write_str("precious")?;
        check_err_contains(create_thumbnail(&input, &output, (5, 5), 85), "failed to write")?;
        output.check_is_file_with_content("precious")?;
        temp.check_dir_contains_exactly(["in.png", "out.png"])
    }

    #[cfg(unix)]
    #[test]
    fn thumbnail_has_plain_permissions() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let input = temp.child("in.png");
        let output = temp.child("out.png");
        write_image(&input, 10, 10)?;
        create_thumbnail(&input, &output, (5, 5), 85)?;
        output.check_has_plain_file_permissions()
    }

    #[test]
    fn undecodable_input_is_an_error() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let input = temp.child("in.jpg");
        input.write_str("not an image")?;
        check_err_contains(
            create_thumbnail(&input, &temp.child("out.jpg"), (5, 5), 85),
            "failed to decode",
        )?;
        temp.check_dir_contains_exactly(["in.jpg"])
    }
}
