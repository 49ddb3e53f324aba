//! Background and foreground image painting

use lcd_sens_types::{BackgroundLayer, ForegroundLayer, ScaleMode};
use std::time::Duration;

use crate::render_cache::{DecodedImage, ImageCache, Playback};

/// Frame duration for image directories used as foregrounds
const FOREGROUND_FRAME_DURATION: Duration = Duration::from_secs(1);

/// Render a background layer: solid color, then the image (if any) with `alpha`.
///
/// Animated images show the frame `playback` picks; image directories
/// advance every `frame_duration_ms`.
pub fn render_background(
    cr: &cairo::Context,
    layer: &BackgroundLayer,
    images: &mut ImageCache,
    playback: &mut Playback,
    width: f64,
    height: f64,
) -> Result<(), cairo::Error> {
    layer.color.apply_to_cairo(cr);
    cr.rectangle(0.0, 0.0, width, height);
    cr.fill()?;

    let Some(path) = &layer.image else {
        return Ok(());
    };
    let Some(sequence) = images.get(path) else {
        // Solid color only
        return Ok(());
    };
    let frame_duration = Duration::from_millis(layer.frame_duration_ms.max(1));
    let Some(image) = playback.pick(&sequence, frame_duration) else {
        return Ok(());
    };

    cr.save()?;
    cr.rectangle(0.0, 0.0, width, height);
    cr.clip();
    paint_scaled(cr, image, layer.scale_mode, width, height, layer.alpha)?;
    cr.restore()?;
    Ok(())
}

/// Render a foreground overlay at its position; a missing image skips the layer
pub fn render_foreground(
    cr: &cairo::Context,
    layer: &ForegroundLayer,
    images: &mut ImageCache,
    playback: &mut Playback,
    width: f64,
    height: f64,
) -> Result<(), cairo::Error> {
    let Some(path) = &layer.image else {
        return Ok(());
    };
    let Some(sequence) = images.get(path) else {
        return Ok(());
    };
    let Some(image) = playback.pick(&sequence, FOREGROUND_FRAME_DURATION) else {
        return Ok(());
    };

    cr.save()?;
    cr.translate(layer.position.x, layer.position.y);
    match layer.scale_mode {
        Some(mode) => paint_scaled(
            cr,
            image,
            mode,
            width - layer.position.x,
            height - layer.position.y,
            layer.opacity,
        )?,
        None => {
            let surface = image.to_surface()?;
            cr.set_source_surface(&surface, 0.0, 0.0)?;
            cr.paint_with_alpha(layer.opacity.clamp(0.0, 1.0))?;
        }
    }
    cr.restore()?;
    Ok(())
}

/// Paint `image` into the `width × height` box at the origin
fn paint_scaled(
    cr: &cairo::Context,
    image: &DecodedImage,
    mode: ScaleMode,
    width: f64,
    height: f64,
    alpha: f64,
) -> Result<(), cairo::Error> {
    let surface = image.to_surface()?;
    let img_width = image.width as f64;
    let img_height = image.height as f64;
    if img_width <= 0.0 || img_height <= 0.0 || width <= 0.0 || height <= 0.0 {
        return Ok(());
    }
    let alpha = alpha.clamp(0.0, 1.0);

    cr.save()?;
    match mode {
        ScaleMode::Stretch => {
            cr.scale(width / img_width, height / img_height);
            cr.set_source_surface(&surface, 0.0, 0.0)?;
        }
        ScaleMode::Fit | ScaleMode::Fill => {
            let scale = if mode == ScaleMode::Fit {
                (width / img_width).min(height / img_height)
            } else {
                (width / img_width).max(height / img_height)
            };
            cr.translate(
                (width - img_width * scale) / 2.0,
                (height - img_height * scale) / 2.0,
            );
            cr.scale(scale, scale);
            cr.set_source_surface(&surface, 0.0, 0.0)?;
        }
        ScaleMode::Centered => {
            cr.set_source_surface(
                &surface,
                ((width - img_width) / 2.0).floor(),
                ((height - img_height) / 2.0).floor(),
            )?;
        }
        ScaleMode::Tiled => {
            let pattern = cairo::SurfacePattern::create(&surface);
            pattern.set_extend(cairo::Extend::Repeat);
            cr.set_source(&pattern)?;
        }
    }

    if mode == ScaleMode::Fit {
        // Letterbox: only the image rectangle is painted
        cr.rectangle(0.0, 0.0, img_width, img_height);
        cr.clip();
    }
    cr.source().set_filter(cairo::Filter::Good);
    cr.paint_with_alpha(alpha)?;
    cr.restore()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use lcd_sens_types::Color;
    use std::path::{Path, PathBuf};

    const BLUE: u32 = 0xFF0000FF;
    const RED: u32 = 0xFFFF0000;

    fn pixel(surface: &mut cairo::ImageSurface, x: usize, y: usize) -> u32 {
        let stride = surface.stride() as usize;
        let data = surface.data().unwrap();
        u32::from_ne_bytes(data[y * stride + x * 4..y * stride + x * 4 + 4].try_into().unwrap())
    }

    fn write_image(dir: &Path, name: &str, image: &RgbaImage) -> PathBuf {
        let path = dir.join(name);
        image.save(&path).unwrap();
        path
    }

    /// Blue 8x8 canvas with `image` painted over it
    fn paint_over_blue(image: PathBuf, scale_mode: ScaleMode, alpha: f64) -> cairo::ImageSurface {
        let surface = cairo::ImageSurface::create(cairo::Format::ARgb32, 8, 8).unwrap();
        {
            let cr = cairo::Context::new(&surface).unwrap();
            let layer = BackgroundLayer {
                color: Color::from_rgba8(0, 0, 255, 255),
                image: Some(image),
                scale_mode,
                alpha,
                ..Default::default()
            };
            let mut playback = Playback::new(0);
            render_background(&cr, &layer, &mut ImageCache::new(), &mut playback, 8.0, 8.0)
                .unwrap();
        }
        surface
    }

    #[test]
    fn test_solid_background_without_image() {
        let mut surface = cairo::ImageSurface::create(cairo::Format::ARgb32, 8, 8).unwrap();
        {
            let cr = cairo::Context::new(&surface).unwrap();
            let layer = BackgroundLayer {
                color: Color::from_rgba8(0, 0, 255, 255),
                image: Some("/nonexistent/bg.png".into()),
                ..Default::default()
            };
            let mut playback = Playback::new(0);
            render_background(&cr, &layer, &mut ImageCache::new(), &mut playback, 8.0, 8.0)
                .unwrap();
        }
        assert_eq!(pixel(&mut surface, 3, 5), BLUE);
    }

    #[test]
    fn test_fit_letterboxes_wide_image() {
        let dir = tempfile::tempdir().unwrap();
        let wide = write_image(dir.path(), "wide.png", &RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255])));
        let mut surface = paint_over_blue(wide, ScaleMode::Fit, 1.0);

        // 4x2 scaled by 2 fills rows 2..6; the bars above and below stay blue
        assert_eq!(pixel(&mut surface, 4, 0), BLUE);
        assert_eq!(pixel(&mut surface, 4, 1), BLUE);
        assert_eq!(pixel(&mut surface, 4, 4), RED);
        assert_eq!(pixel(&mut surface, 1, 3), RED);
        assert_eq!(pixel(&mut surface, 4, 7), BLUE);
    }

    #[test]
    fn test_fill_crops_wide_image() {
        let dir = tempfile::tempdir().unwrap();
        // Green edge columns 0-1 and 6-7 around a red middle
        let wide = RgbaImage::from_fn(8, 2, |x, _| {
            if (2..6).contains(&x) {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 255, 0, 255])
            }
        });
        let wide = write_image(dir.path(), "wide.png", &wide);
        let mut surface = paint_over_blue(wide, ScaleMode::Fill, 1.0);

        // Scaled by 4 and centered, only the red middle remains visible
        for (x, y) in [(0, 3), (0, 4), (7, 4), (3, 5)] {
            assert_eq!(pixel(&mut surface, x, y), RED, "pixel {},{}", x, y);
        }
    }

    #[test]
    fn test_stretch_covers_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let tall = write_image(dir.path(), "tall.png", &RgbaImage::from_pixel(4, 8, Rgba([255, 0, 0, 255])));
        let mut surface = paint_over_blue(tall, ScaleMode::Stretch, 1.0);

        // Fit would leave columns 0-1 blue
        for (x, y) in [(1, 0), (6, 7), (1, 4), (4, 4)] {
            assert_eq!(pixel(&mut surface, x, y), RED, "pixel {},{}", x, y);
        }
    }

    #[test]
    fn test_image_alpha_blends_over_color() {
        let dir = tempfile::tempdir().unwrap();
        let red = write_image(dir.path(), "red.png", &RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])));
        let mut surface = paint_over_blue(red, ScaleMode::Stretch, 0.5);

        let px = pixel(&mut surface, 4, 4);
        let (a, r, g, b) = (px >> 24, (px >> 16) & 0xFF, (px >> 8) & 0xFF, px & 0xFF);
        assert_eq!(a, 0xFF);
        assert_eq!(g, 0);
        assert!((126..=129).contains(&r), "red {}", r);
        assert!((126..=129).contains(&b), "blue {}", b);
    }

    #[test]
    fn test_animated_background_reports_next_change() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "1.png", &RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));
        write_image(dir.path(), "2.png", &RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])));

        let mut surface = cairo::ImageSurface::create(cairo::Format::ARgb32, 8, 8).unwrap();
        let mut playback = Playback::new(2_300);
        {
            let cr = cairo::Context::new(&surface).unwrap();
            let layer = BackgroundLayer {
                image: Some(dir.path().to_path_buf()),
                frame_duration_ms: 1000,
                ..Default::default()
            };
            render_background(&cr, &layer, &mut ImageCache::new(), &mut playback, 8.0, 8.0)
                .unwrap();
        }
        // 2300 ms into a 2 s loop is 300 ms into the first image
        assert_eq!(pixel(&mut surface, 4, 4), RED);
        assert_eq!(playback.next_change(), Some(Duration::from_millis(700)));
    }
}
