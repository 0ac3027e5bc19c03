//! Image preparation ahead of inference.
//!
//! Frames arrive in sensor orientation. They are rotated upright according to
//! the orientation hint, then cropped/scaled to the model input size according
//! to the crop policy. All buffers are RGB8, row-major. The pixel work needs
//! the `image` feature, which the tract backend enables.

#[cfg(feature = "image")]
use anyhow::{anyhow, Result};
#[cfg(feature = "image")]
use image::{imageops, imageops::FilterType, RgbImage};
use serde::{Deserialize, Serialize};

/// Physical device orientation, as reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
    Unknown,
}

/// EXIF-style image orientation: how the stored buffer must be transformed to
/// appear upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl From<DeviceOrientation> for Orientation {
    /// Back-camera sensors are mounted landscape-left; anything without a
    /// clear orientation is treated as portrait.
    fn from(device: DeviceOrientation) -> Self {
        match device {
            DeviceOrientation::PortraitUpsideDown => Orientation::Left,
            DeviceOrientation::LandscapeLeft => Orientation::Up,
            DeviceOrientation::LandscapeRight => Orientation::Down,
            DeviceOrientation::Portrait
            | DeviceOrientation::FaceUp
            | DeviceOrientation::FaceDown
            | DeviceOrientation::Unknown => Orientation::Right,
        }
    }
}

/// How a frame is fitted to the model's input size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropPolicy {
    /// Crop the centred region matching the input aspect ratio, then scale.
    #[default]
    CenterCrop,
    /// Scale to fit inside the input, padding with black.
    ScaleFit,
    /// Stretch to fill the input, ignoring aspect ratio.
    ScaleFill,
}

/// Wrap tightly packed RGB8 pixels in an image buffer.
#[cfg(feature = "image")]
pub fn frame_image(pixels: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    if width == 0 || height == 0 {
        return Err(anyhow!("image dimensions must be non-zero"));
    }
    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(anyhow!(
            "expected {} RGB bytes for {}x{}, received {}",
            expected,
            width,
            height,
            pixels.len()
        ));
    }
    RgbImage::from_raw(width, height, pixels.to_vec())
        .ok_or_else(|| anyhow!("invalid {}x{} RGB buffer", width, height))
}

/// Rotate/mirror `image` so it is upright.
#[cfg(feature = "image")]
pub fn orient(image: RgbImage, orientation: Orientation) -> RgbImage {
    match orientation {
        Orientation::Up => image,
        Orientation::UpMirrored => imageops::flip_horizontal(&image),
        Orientation::Down => imageops::rotate180(&image),
        Orientation::DownMirrored => imageops::flip_vertical(&image),
        Orientation::Right => imageops::rotate90(&image),
        Orientation::Left => imageops::rotate270(&image),
        Orientation::LeftMirrored => imageops::flip_horizontal(&imageops::rotate90(&image)),
        Orientation::RightMirrored => imageops::flip_horizontal(&imageops::rotate270(&image)),
    }
}

/// Fit `image` to `target_w` x `target_h` according to `policy`.
#[cfg(feature = "image")]
pub fn crop_and_scale(
    image: &RgbImage,
    policy: CropPolicy,
    target_w: u32,
    target_h: u32,
) -> Result<RgbImage> {
    if target_w == 0 || target_h == 0 {
        return Err(anyhow!("target dimensions must be non-zero"));
    }
    let (sw, sh) = (image.width() as u64, image.height() as u64);
    let (tw, th) = (target_w as u64, target_h as u64);
    let scaled = match policy {
        CropPolicy::ScaleFill => imageops::resize(image, target_w, target_h, FilterType::Nearest),
        CropPolicy::CenterCrop => {
            let (rw, rh) = if sw * th > sh * tw {
                ((sh * tw / th).max(1), sh)
            } else {
                (sw, (sw * th / tw).max(1))
            };
            let x0 = ((sw - rw) / 2) as u32;
            let y0 = ((sh - rh) / 2) as u32;
            let region = imageops::crop_imm(image, x0, y0, rw as u32, rh as u32).to_image();
            imageops::resize(&region, target_w, target_h, FilterType::Nearest)
        }
        CropPolicy::ScaleFit => {
            let (fw, fh) = if sw * th > sh * tw {
                (tw, (sh * tw / sw).max(1))
            } else {
                ((sw * th / sh).max(1), th)
            };
            let fitted = imageops::resize(image, fw as u32, fh as u32, FilterType::Nearest);
            let mut canvas = RgbImage::new(target_w, target_h);
            let ox = ((tw - fw) / 2) as i64;
            let oy = ((th - fh) / 2) as i64;
            imageops::replace(&mut canvas, &fitted, ox, oy);
            canvas
        }
    };
    Ok(scaled)
}

/// Orient then crop/scale in one step.
#[cfg(feature = "image")]
pub fn prepare(
    pixels: &[u8],
    width: u32,
    height: u32,
    orientation: Orientation,
    policy: CropPolicy,
    target_w: u32,
    target_h: u32,
) -> Result<RgbImage> {
    let upright = orient(frame_image(pixels, width, height)?, orientation);
    crop_and_scale(&upright, policy, target_w, target_h)
}

/// Planar (CHW) f32 tensor data normalised to 0..1.
#[cfg(feature = "image")]
pub fn to_planar_f32(image: &RgbImage) -> Vec<f32> {
    let plane = image.width() as usize * image.height() as usize;
    let mut out = vec![0f32; plane * 3];
    for (i, px) in image.as_raw().chunks_exact(3).enumerate() {
        for c in 0..3 {
            out[c * plane + i] = px[c] as f32 / 255.0;
        }
    }
    out
}


#[cfg(all(test, feature = "image"))]
mod image_tests {
    use super::*;

    // Each pixel's red channel holds its row-major index.
    fn indexed(width: u32, height: u32) -> RgbImage {
        let pixels: Vec<u8> = (0..width * height).flat_map(|i| [i as u8, 0, 0]).collect();
        frame_image(&pixels, width, height).unwrap()
    }

    fn reds(image: &RgbImage) -> Vec<u8> {
        image.pixels().map(|p| p[0]).collect()
    }

    #[test]
    fn frame_image_checks_length() {
        assert!(frame_image(&[0; 10], 2, 2).is_err());
        assert!(frame_image(&[0; 13], 2, 2).is_err());
        assert!(frame_image(&[], 0, 2).is_err());
        assert_eq!(frame_image(&[0; 12], 2, 2).unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn right_rotates_clockwise() {
        // 0 1 2        3 0
        // 3 4 5   ->   4 1
        //              5 2
        let out = orient(indexed(3, 2), Orientation::Right);
        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(reds(&out), vec![3, 0, 4, 1, 5, 2]);
    }

    #[test]
    fn left_rotates_counter_clockwise() {
        let out = orient(indexed(3, 2), Orientation::Left);
        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(reds(&out), vec![2, 5, 1, 4, 0, 3]);
    }

    #[test]
    fn down_rotates_half_turn() {
        let out = orient(indexed(3, 2), Orientation::Down);
        assert_eq!(reds(&out), vec![5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn mirrored_orientations() {
        assert_eq!(reds(&orient(indexed(3, 2), Orientation::UpMirrored)), vec![2, 1, 0, 5, 4, 3]);
        assert_eq!(
            reds(&orient(indexed(3, 2), Orientation::DownMirrored)),
            vec![3, 4, 5, 0, 1, 2]
        );
        // Transpose.
        assert_eq!(
            reds(&orient(indexed(3, 2), Orientation::LeftMirrored)),
            vec![0, 3, 1, 4, 2, 5]
        );
        assert_eq!(
            reds(&orient(indexed(3, 2), Orientation::RightMirrored)),
            vec![5, 2, 4, 1, 3, 0]
        );
    }

    #[test]
    fn center_crop_takes_middle_square() {
        // 4x2 source: centre square is columns 1..3.
        let out = crop_and_scale(&indexed(4, 2), CropPolicy::CenterCrop, 2, 2).unwrap();
        assert_eq!(reds(&out), vec![1, 2, 5, 6]);
    }

    #[test]
    fn scale_fit_pads_with_black() {
        let white = frame_image(&[255; 4 * 2 * 3], 4, 2).unwrap();
        let out = crop_and_scale(&white, CropPolicy::ScaleFit, 4, 4).unwrap();
        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(
            reds(&out),
            vec![0, 0, 0, 0, 255, 255, 255, 255, 255, 255, 255, 255, 0, 0, 0, 0]
        );
    }

    #[test]
    fn scale_fill_stretches() {
        // Left half 10, right half 200.
        let pixels: Vec<u8> = (0..8)
            .flat_map(|i| if i % 4 < 2 { [10, 0, 0] } else { [200, 0, 0] })
            .collect();
        let src = frame_image(&pixels, 4, 2).unwrap();
        let out = crop_and_scale(&src, CropPolicy::ScaleFill, 2, 2).unwrap();
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(reds(&out), vec![10, 200, 10, 200]);
    }

    #[test]
    fn prepare_orients_before_cropping() {
        // 3x2 rotated right becomes 2x3; the 2x2 crop offset rounds down to row 0.
        let src = indexed(3, 2);
        let out = prepare(src.as_raw(), 3, 2, Orientation::Right, CropPolicy::CenterCrop, 2, 2)
            .unwrap();
        assert_eq!(reds(&out), vec![3, 0, 4, 1]);
    }

    #[test]
    fn planar_layout_separates_channels() {
        let image = frame_image(&[255, 0, 0, 0, 255, 0], 2, 1).unwrap();
        let planar = to_planar_f32(&image);
        assert_eq!(planar, vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }
}
