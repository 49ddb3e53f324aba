//! Scene compositor
//!
//! Turns a [`Scene`] plus a metrics snapshot into an RGBA [`Frame`]. Every
//! call paints onto a fresh surface, so equal inputs produce equal bytes.

use chrono::NaiveDateTime;
use lcd_sens_types::{Frame, Layer, MetricKind, MetricSample, MetricsSnapshot, Scene};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use crate::arc_display::render_circular_graph;
use crate::background::{render_background, render_foreground};
use crate::bar_display::render_bar_graph;
use crate::error::RenderError;
use crate::render_cache::{ImageCache, Playback};
use crate::text_renderer::{format_value, render_text, resolve_text};

/// Stateful renderer: owns the decoded image cache and the last known value
/// of every metric it has seen.
#[derive(Default)]
pub struct Compositor {
    images: ImageCache,
    last_known: HashMap<MetricKind, MetricSample>,
    next_frame: Option<Duration>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `scene` into a `width × height` frame.
    ///
    /// Backgrounds are painted first, foregrounds last, everything else in
    /// list order. For 90/270 rotations the layout is done on a
    /// `height × width` canvas and rotated clockwise into place.
    pub fn render(
        &mut self,
        scene: &Scene,
        snapshot: &MetricsSnapshot,
        now: NaiveDateTime,
        width: u32,
        height: u32,
    ) -> Result<Frame, RenderError> {
        let (canvas_w, canvas_h) = if scene.rotation.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        };
        let (cw, ch) = match (i32::try_from(canvas_w), i32::try_from(canvas_h)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(RenderError::InvalidSize { width, height }),
        };

        for sample in snapshot.iter() {
            self.last_known.insert(sample.kind, sample.clone());
        }

        // Animations run on wall-clock time so every caller sees the same frame
        let mut playback = Playback::new(now.and_utc().timestamp_millis().max(0) as u64);
        let mut surface = cairo::ImageSurface::create(cairo::Format::ARgb32, cw, ch)?;
        {
            let cr = cairo::Context::new(&surface)?;
            cr.set_source_rgb(0.0, 0.0, 0.0);
            cr.paint()?;

            let layers: Vec<&Layer> = scene.enabled_layers().collect();
            let ordered = layers
                .iter()
                .filter(|l| matches!(l, Layer::Background(_)))
                .chain(
                    layers
                        .iter()
                        .filter(|l| !matches!(l, Layer::Background(_) | Layer::Foreground(_))),
                )
                .chain(layers.iter().filter(|l| matches!(l, Layer::Foreground(_))));

            for layer in ordered {
                cr.save()?;
                let result =
                    self.render_layer(&cr, layer, snapshot, now, &mut playback, cw as f64, ch as f64);
                cr.restore()?;
                if let Err(e) = result {
                    log::debug!("Skipping {} layer: {}", layer.type_name(), e);
                }
            }
        }

        self.next_frame = playback.next_change();

        surface.flush();
        let stride = surface.stride() as usize;
        let data = surface.data()?;
        let rgba = argb32_to_rgba(&data, canvas_w as usize, canvas_h as usize, stride);
        drop(data);

        let frame = Frame::from_rgba(canvas_w, canvas_h, rgba)?;
        log::trace!(
            "Rendered {} layers into {}x{} (rotation {})",
            scene.layers.len(),
            width,
            height,
            scene.rotation.degrees()
        );
        Ok(frame.rotated(scene.rotation))
    }

    fn render_layer(
        &mut self,
        cr: &cairo::Context,
        layer: &Layer,
        snapshot: &MetricsSnapshot,
        now: NaiveDateTime,
        playback: &mut Playback,
        width: f64,
        height: f64,
    ) -> Result<(), cairo::Error> {
        match layer {
            Layer::Background(bg) => {
                render_background(cr, bg, &mut self.images, playback, width, height)
            }
            Layer::Foreground(fg) => {
                render_foreground(cr, fg, &mut self.images, playback, width, height)
            }
            Layer::Text(_) | Layer::Metric(_) | Layer::Date(_) | Layer::Time(_) => {
                let Some(text) = resolve_text(layer, snapshot, &self.last_known, now) else {
                    return Ok(());
                };
                let (style, position) = match layer {
                    Layer::Text(l) => (&l.style, l.position),
                    Layer::Metric(l) => (&l.style, l.position),
                    Layer::Date(l) => (&l.style, l.position),
                    Layer::Time(l) => (&l.style, l.position),
                    _ => return Ok(()),
                };
                render_text(cr, &text, style, position.x, position.y)
            }
            Layer::BarGraph(bar) => {
                let value = self.gauge_value(bar.metric, snapshot).unwrap_or(bar.value);
                render_bar_graph(cr, bar, value)
            }
            Layer::CircularGraph(circle) => {
                let sample = self.gauge_sample(circle.metric, snapshot);
                let value = sample.map(|s| s.value).unwrap_or(circle.value);
                let unit = sample.map(|s| s.unit.as_str()).unwrap_or("");
                let text = format!("{}{}", format_value(value, 0), unit);
                render_circular_graph(cr, circle, value, Some(&text))
            }
        }
    }

    fn gauge_sample<'a>(
        &'a self,
        metric: Option<MetricKind>,
        snapshot: &'a MetricsSnapshot,
    ) -> Option<&'a MetricSample> {
        let kind = metric?;
        snapshot.get(kind).or_else(|| self.last_known.get(&kind))
    }

    fn gauge_value(&self, metric: Option<MetricKind>, snapshot: &MetricsSnapshot) -> Option<f64> {
        self.gauge_sample(metric, snapshot).map(|s| s.value)
    }

    /// Time until an animated image in the last rendered scene changes
    /// frame; `None` when nothing visible is animated.
    pub fn next_frame_in(&self) -> Option<Duration> {
        self.next_frame
    }

    /// Drop cached images (e.g. after the configuration changed)
    pub fn clear_image_cache(&mut self) {
        self.images.clear();
    }
}

/// Convert premultiplied native-endian ARGB32 rows into straight RGBA8
fn argb32_to_rgba(data: &[u8], width: usize, height: usize, stride: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row = &data[y * stride..y * stride + width * 4];
        for px in row.chunks_exact(4) {
            let argb = u32::from_ne_bytes([px[0], px[1], px[2], px[3]]);
            let a = (argb >> 24) as u8;
            let unpremul = |c: u32| -> u8 {
                let c = c & 0xFF;
                match a {
                    0 => 0,
                    255 => c as u8,
                    _ => ((c * 255 + a as u32 / 2) / a as u32).min(255) as u8,
                }
            };
            out.extend_from_slice(&[unpremul(argb >> 16), unpremul(argb >> 8), unpremul(argb), a]);
        }
    }
    out
}

/// Encode a frame as PNG
pub fn write_png<W: Write>(frame: &Frame, writer: &mut W) -> Result<(), RenderError> {
    let (width, height) = frame.dimensions();
    let invalid = || RenderError::InvalidSize { width, height };
    let w = i32::try_from(width).map_err(|_| invalid())?;
    let h = i32::try_from(height).map_err(|_| invalid())?;
    let stride = cairo::Format::ARgb32.stride_for_width(width)?;

    let mut data = vec![0u8; stride as usize * height as usize];
    for (y, row) in frame.as_bytes().chunks_exact(width as usize * 4).enumerate() {
        for (x, px) in row.chunks_exact(4).enumerate() {
            let [r, g, b, a] = [px[0] as u32, px[1] as u32, px[2] as u32, px[3] as u32];
            let premul = |c: u32| (c * a + 127) / 255;
            let argb = a << 24 | premul(r) << 16 | premul(g) << 8 | premul(b);
            let o = y * stride as usize + x * 4;
            data[o..o + 4].copy_from_slice(&argb.to_ne_bytes());
        }
    }

    let surface = cairo::ImageSurface::create_for_data(data, cairo::Format::ARgb32, w, h, stride)?;
    surface.write_to_png(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate};
    use lcd_sens_types::{
        BackgroundLayer, BarGraphLayer, Color, MetricLayer, Position, Rotation, TimeLayer,
    };

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn solid(color: Color) -> Layer {
        Layer::Background(BackgroundLayer {
            color,
            ..Default::default()
        })
    }

    fn red_bar(x: f64, y: f64) -> Layer {
        Layer::BarGraph(BarGraphLayer {
            position: Position::new(x, y),
            width: 10.0,
            height: 10.0,
            value: 100.0,
            fill_color: Color::from_rgba8(255, 0, 0, 255),
            ..Default::default()
        })
    }

    fn render(scene: &Scene, w: u32, h: u32) -> Frame {
        Compositor::new()
            .render(scene, &MetricsSnapshot::empty(), noon(), w, h)
            .unwrap()
    }

    #[test]
    fn test_empty_scene_is_opaque_black() {
        let frame = render(&Scene::default(), 16, 8);
        assert_eq!(frame.dimensions(), (16, 8));
        assert!(frame.as_bytes().chunks_exact(4).all(|px| px == [0, 0, 0, 255]));

        let disabled = Scene::new(
            Rotation::Deg0,
            vec![Layer::Background(BackgroundLayer {
                enabled: false,
                color: Color::WHITE,
                ..Default::default()
            })],
        );
        assert_eq!(render(&disabled, 16, 8), Frame::new(16, 8));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let mut time = TimeLayer::default();
        time.position = Position::new(40.0, 20.0);
        time.style.shadow.enabled = true;
        let scene = Scene::new(
            Rotation::Deg0,
            vec![
                solid(Color::from_rgba8(10, 20, 30, 255)),
                Layer::Time(time),
                red_bar(2.0, 2.0),
            ],
        );
        let a = render(&scene, 80, 40);
        let b = render(&scene, 80, 40);
        assert_eq!(a, b);
    }

    #[test]
    fn test_alpha_over() {
        let opaque = render(
            &Scene::new(Rotation::Deg0, vec![solid(Color::from_rgba8(0, 255, 0, 255))]),
            4,
            4,
        );
        assert_eq!(opaque.pixel(1, 1), [0, 255, 0, 255]);

        let transparent = render(&Scene::new(Rotation::Deg0, vec![solid(Color::TRANSPARENT)]), 4, 4);
        assert_eq!(transparent, Frame::new(4, 4));
    }

    #[test]
    fn test_backgrounds_paint_below_listed_gauges() {
        // Background listed after the bar must still end up beneath it
        let scene = Scene::new(
            Rotation::Deg0,
            vec![red_bar(0.0, 0.0), solid(Color::from_rgba8(0, 0, 255, 255))],
        );
        let frame = render(&scene, 20, 20);
        assert_eq!(frame.pixel(5, 5), [255, 0, 0, 255]);
        assert_eq!(frame.pixel(15, 15), [0, 0, 255, 255]);
    }

    #[test]
    fn test_rotation_90_lays_out_on_swapped_canvas() {
        let scene = Scene::new(Rotation::Deg90, vec![red_bar(0.0, 0.0)]);
        let frame = render(&scene, 40, 20);
        assert_eq!(frame.dimensions(), (40, 20));
        // Top-left of the layout ends up top-right on the panel
        assert_eq!(frame.pixel(35, 5), [255, 0, 0, 255]);
        assert_eq!(frame.pixel(5, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn test_gauge_uses_last_known_value() {
        let bar = Layer::BarGraph(BarGraphLayer {
            position: Position::new(0.0, 0.0),
            width: 10.0,
            height: 4.0,
            metric: Some(MetricKind::CpuUsage),
            fill_color: Color::from_rgba8(255, 0, 0, 255),
            background_color: Color::from_rgba8(0, 0, 255, 255),
            ..Default::default()
        });
        let scene = Scene::new(Rotation::Deg0, vec![bar]);
        let mut compositor = Compositor::new();
        let now = Local::now();
        let full = MetricsSnapshot::new(
            vec![MetricSample::new(MetricKind::CpuUsage, 100.0, now)],
            now,
        );

        let first = compositor.render(&scene, &full, noon(), 10, 4).unwrap();
        assert_eq!(first.pixel(8, 2), [255, 0, 0, 255]);

        let second = compositor
            .render(&scene, &MetricsSnapshot::empty(), noon(), 10, 4)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_absent_metric_text_is_skipped() {
        let scene = Scene::new(
            Rotation::Deg0,
            vec![Layer::Metric(MetricLayer::new(MetricKind::GpuTemperature))],
        );
        assert_eq!(render(&scene, 8, 8), Frame::new(8, 8));
    }

    #[test]
    fn test_animated_background_schedules_next_frame() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 255, 255]))
            .save(dir.path().join("b.png"))
            .unwrap();

        let animated = Scene::new(
            Rotation::Deg0,
            vec![Layer::Background(BackgroundLayer {
                image: Some(dir.path().to_path_buf()),
                frame_duration_ms: 500,
                ..Default::default()
            })],
        );
        let mut compositor = Compositor::new();

        // noon() is a whole second, the start of the first image
        let first = compositor
            .render(&animated, &MetricsSnapshot::empty(), noon(), 4, 4)
            .unwrap();
        assert_eq!(first.pixel(2, 2), [255, 0, 0, 255]);
        assert_eq!(compositor.next_frame_in(), Some(Duration::from_millis(500)));

        let later = noon() + chrono::Duration::milliseconds(600);
        let second = compositor
            .render(&animated, &MetricsSnapshot::empty(), later, 4, 4)
            .unwrap();
        assert_eq!(second.pixel(2, 2), [0, 0, 255, 255]);
        assert_eq!(compositor.next_frame_in(), Some(Duration::from_millis(400)));

        compositor
            .render(&Scene::default(), &MetricsSnapshot::empty(), noon(), 4, 4)
            .unwrap();
        assert_eq!(compositor.next_frame_in(), None);
    }

    #[test]
    fn test_invalid_size() {
        let err = Compositor::new()
            .render(&Scene::default(), &MetricsSnapshot::empty(), noon(), 0, 10)
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidSize { width: 0, height: 10 }));
    }

    #[test]
    fn test_png_output_has_signature() {
        let mut out = Vec::new();
        write_png(&Frame::new(4, 4), &mut out).unwrap();
        assert_eq!(&out[..8], b"\x89PNG\r\n\x1a\n");
    }
}
