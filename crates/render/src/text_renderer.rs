//! Text resolution and drawing for text-bearing layers

use chrono::NaiveDateTime;
use lcd_sens_types::{
    GradientDirection, Layer, MetricKind, MetricLayer, MetricSample, MetricsSnapshot,
    TextAlignment, TextStyle,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::pango_text::{layout_size, text_layout};

/// `{label}`, `{value}`, `{value:.N}` and `{unit}`
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(label|value|unit)(?::\.(\d{1,2}))?\}").expect("Invalid regex")
});

/// Text a layer displays for this frame.
///
/// Static text is returned as is, date/time layers format `now`, metric
/// layers fill their format string from `snapshot`, falling back to
/// `last_known`. Returns `None` for non-text layers and for metrics that have
/// never been sampled.
pub fn resolve_text(
    layer: &Layer,
    snapshot: &MetricsSnapshot,
    last_known: &HashMap<MetricKind, MetricSample>,
    now: NaiveDateTime,
) -> Option<String> {
    match layer {
        Layer::Text(text) => Some(text.text.clone()),
        Layer::Date(date) => Some(now.format(&date.format_string()).to_string()),
        Layer::Time(time) => Some(now.format(time.format_string()).to_string()),
        Layer::Metric(metric) => {
            let sample = snapshot
                .get(metric.metric)
                .or_else(|| last_known.get(&metric.metric))?;
            Some(format_metric(metric, sample))
        }
        _ => None,
    }
}

/// Fill a metric layer's format string from `sample`
pub fn format_metric(layer: &MetricLayer, sample: &MetricSample) -> String {
    let label = if layer.label.is_empty() {
        sample.label.as_str()
    } else {
        layer.label.as_str()
    };
    let unit = if layer.unit.is_empty() {
        sample.unit.as_str()
    } else {
        layer.unit.as_str()
    };

    PLACEHOLDER
        .replace_all(&layer.format_string, |caps: &Captures| match &caps[1] {
            "label" => label.to_string(),
            "unit" => unit.to_string(),
            _ => {
                let decimals = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse::<u8>().ok())
                    .unwrap_or(layer.decimals);
                format_value(sample.value, decimals)
            }
        })
        .into_owned()
}

/// Round half away from zero to `decimals` places and format
pub fn format_value(value: f64, decimals: u8) -> String {
    let factor = 10f64.powi(decimals as i32);
    let mut rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        // Avoid "-0"
        rounded = 0.0;
    }
    format!("{:.*}", decimals as usize, rounded)
}

/// Draw `text` anchored at `(x, y)`: horizontal anchor from the alignment,
/// vertical anchor at the middle of the text.
pub fn render_text(
    cr: &cairo::Context,
    text: &str,
    style: &TextStyle,
    x: f64,
    y: f64,
) -> Result<(), cairo::Error> {
    if text.is_empty() {
        return Ok(());
    }

    let layout = text_layout(cr, text, &style.font_family, style.font_size);
    let size = layout_size(&layout);
    let left = match style.alignment {
        TextAlignment::Left => x,
        TextAlignment::Center => x - size.width / 2.0,
        TextAlignment::Right => x - size.width,
    };
    let top = y - size.height / 2.0;

    if style.shadow.enabled {
        render_shadow(cr, &layout, style, left, top, size.width, size.height)?;
    }

    cr.save()?;
    cr.move_to(left, top);
    pangocairo::functions::layout_path(cr, &layout);

    if style.gradient.enabled {
        let g = &style.gradient;
        let (x1, y1) = match g.direction {
            GradientDirection::Vertical => (left, top + size.height),
            GradientDirection::Horizontal => (left + size.width, top),
            GradientDirection::Diagonal => (left + size.width, top + size.height),
        };
        let pattern = cairo::LinearGradient::new(left, top, x1, y1);
        pattern.add_color_stop_rgba(0.0, g.color1.r, g.color1.g, g.color1.b, g.color1.a);
        pattern.add_color_stop_rgba(1.0, g.color2.r, g.color2.g, g.color2.b, g.color2.a);
        cr.set_source(&pattern)?;
    } else {
        style.color.apply_to_cairo(cr);
    }

    if style.outline.enabled && style.outline.width > 0.0 {
        cr.fill_preserve()?;
        style.outline.color.apply_to_cairo(cr);
        cr.set_line_width(style.outline.width);
        cr.set_line_join(cairo::LineJoin::Round);
        cr.stroke()?;
    } else {
        cr.fill()?;
    }
    cr.restore()?;
    Ok(())
}

/// Blur the text silhouette on an A8 mask and paint it with the shadow color
fn render_shadow(
    cr: &cairo::Context,
    layout: &pango::Layout,
    style: &TextStyle,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
) -> Result<(), cairo::Error> {
    let shadow = &style.shadow;
    let pad = shadow.blur as i32 + 2;
    let mask_w = width.ceil() as i32 + 2 * pad;
    let mask_h = height.ceil() as i32 + 2 * pad;
    if mask_w <= 0 || mask_h <= 0 {
        return Ok(());
    }

    let mut mask = cairo::ImageSurface::create(cairo::Format::A8, mask_w, mask_h)?;
    {
        let mcr = cairo::Context::new(&mask)?;
        mcr.move_to(pad as f64, pad as f64);
        pangocairo::functions::update_layout(&mcr, layout);
        pangocairo::functions::show_layout(&mcr, layout);
    }
    // Restore the layout's context for the fill pass
    pangocairo::functions::update_layout(cr, layout);

    mask.flush();
    let stride = mask.stride() as usize;
    match mask.data() {
        Ok(mut data) => box_blur(
            &mut data,
            mask_w as usize,
            mask_h as usize,
            stride,
            shadow.blur,
        ),
        Err(e) => {
            log::debug!("Shadow mask not accessible, drawing it unblurred: {}", e);
        }
    }

    cr.save()?;
    shadow.color.apply_to_cairo(cr);
    cr.mask_surface(
        &mask,
        (left + shadow.offset_x as f64 - pad as f64).round(),
        (top + shadow.offset_y as f64 - pad as f64).round(),
    )?;
    cr.restore()?;
    Ok(())
}

/// 3×3 box blur applied `passes` times to a single-channel buffer.
///
/// Edge pixels average only their in-bounds neighbours.
pub fn box_blur(data: &mut [u8], width: usize, height: usize, stride: usize, passes: u32) {
    if width == 0 || height == 0 {
        return;
    }
    let mut scratch = vec![0u8; stride * height];
    for _ in 0..passes {
        // Horizontal
        for y in 0..height {
            let row = &data[y * stride..y * stride + width];
            for x in 0..width {
                let lo = x.saturating_sub(1);
                let hi = (x + 1).min(width - 1);
                let sum: u32 = row[lo..=hi].iter().map(|&v| v as u32).sum();
                scratch[y * stride + x] = (sum / (hi - lo + 1) as u32) as u8;
            }
        }
        // Vertical
        for y in 0..height {
            let lo = y.saturating_sub(1);
            let hi = (y + 1).min(height - 1);
            for x in 0..width {
                let sum: u32 = (lo..=hi).map(|yy| scratch[yy * stride + x] as u32).sum();
                data[y * stride + x] = (sum / (hi - lo + 1) as u32) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate};
    use lcd_sens_types::{DateLayer, TextLayer, TimeLayer};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn snapshot_with(kind: MetricKind, value: f64) -> MetricsSnapshot {
        let now = Local::now();
        MetricsSnapshot::new(vec![MetricSample::new(kind, value, now)], now)
    }

    #[test]
    fn test_time_text() {
        let empty = MetricsSnapshot::empty();
        let cache = HashMap::new();
        let mut time = TimeLayer::default();
        let text = resolve_text(&Layer::Time(time.clone()), &empty, &cache, at(14, 5, 0));
        assert_eq!(text.as_deref(), Some("14:05"));

        time.show_seconds = true;
        let text = resolve_text(&Layer::Time(time.clone()), &empty, &cache, at(14, 5, 0));
        assert_eq!(text.as_deref(), Some("14:05:00"));

        time.use_24_hour = false;
        time.show_seconds = false;
        time.show_am_pm = true;
        let text = resolve_text(&Layer::Time(time), &empty, &cache, at(14, 5, 0));
        assert_eq!(text.as_deref(), Some("02:05 PM"));
    }

    #[test]
    fn test_date_text() {
        let date = DateLayer {
            show_year: true,
            ..Default::default()
        };
        let text = resolve_text(
            &Layer::Date(date),
            &MetricsSnapshot::empty(),
            &HashMap::new(),
            at(9, 0, 0),
        );
        assert_eq!(text.as_deref(), Some("Monday 3 March 2025"));
    }

    #[test]
    fn test_metric_text_rounding() {
        let snapshot = snapshot_with(MetricKind::CpuUsage, 42.3);
        let mut layer = MetricLayer::new(MetricKind::CpuUsage);
        layer.label = "CPU ".to_string();

        let text = resolve_text(&Layer::Metric(layer.clone()), &snapshot, &HashMap::new(), at(0, 0, 0));
        assert_eq!(text.as_deref(), Some("CPU 42%"));

        layer.decimals = 1;
        let text = resolve_text(&Layer::Metric(layer), &snapshot, &HashMap::new(), at(0, 0, 0));
        assert_eq!(text.as_deref(), Some("CPU 42.3%"));
    }

    #[test]
    fn test_inline_precision_and_sample_label() {
        let sample = MetricSample::new(MetricKind::CpuTemperature, 61.25, Local::now());
        let mut layer = MetricLayer::new(MetricKind::CpuTemperature);
        layer.format_string = "{label}: {value:.1} {unit}".to_string();
        assert_eq!(format_metric(&layer, &sample), "CPU Temp: 61.3 °C");
    }

    #[test]
    fn test_custom_format_string_fills_every_placeholder() {
        let snapshot = snapshot_with(MetricKind::CpuUsage, 42.0);
        let mut layer = MetricLayer::new(MetricKind::CpuUsage);
        layer.label = "CPU".to_string();
        layer.format_string = "{label} {value}{unit}".to_string();

        let text = resolve_text(&Layer::Metric(layer.clone()), &snapshot, &HashMap::new(), at(0, 0, 0));
        assert_eq!(text.as_deref(), Some("CPU 42%"));

        // Literal text around placeholders and unknown braces are kept
        layer.format_string = "[{label}] {value:.2} {unit} {other}".to_string();
        layer.unit = " pct".to_string();
        let text = resolve_text(&Layer::Metric(layer), &snapshot, &HashMap::new(), at(0, 0, 0));
        assert_eq!(text.as_deref(), Some("[CPU] 42.00  pct {other}"));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(format_value(2.5, 0), "3");
        assert_eq!(format_value(-2.5, 0), "-3");
        assert_eq!(format_value(-0.2, 0), "0");
        assert_eq!(format_value(1.25, 1), "1.3");
    }

    #[test]
    fn test_absent_metric_uses_last_known_or_skips() {
        let layer = Layer::Metric(MetricLayer::new(MetricKind::GpuUsage));
        let empty = MetricsSnapshot::empty();
        assert_eq!(resolve_text(&layer, &empty, &HashMap::new(), at(0, 0, 0)), None);

        let mut cache = HashMap::new();
        cache.insert(
            MetricKind::GpuUsage,
            MetricSample::new(MetricKind::GpuUsage, 17.0, Local::now()),
        );
        let text = resolve_text(&layer, &empty, &cache, at(0, 0, 0));
        assert_eq!(text.as_deref(), Some("GPU Usage17%"));
    }

    #[test]
    fn test_static_text_is_literal() {
        let layer = Layer::Text(TextLayer {
            text: "{value}".to_string(),
            ..Default::default()
        });
        let text = resolve_text(&layer, &MetricsSnapshot::empty(), &HashMap::new(), at(0, 0, 0));
        assert_eq!(text.as_deref(), Some("{value}"));
    }

    #[test]
    fn test_box_blur_spreads_and_preserves_flat_areas() {
        let (w, h) = (5, 5);
        let mut data = vec![0u8; w * h];
        data[2 * w + 2] = 255;
        box_blur(&mut data, w, h, w, 1);
        assert!(data[2 * w + 2] < 255);
        assert!(data[2 * w + 1] > 0);
        assert_eq!(data[0], 0);

        let mut flat = vec![90u8; w * h];
        box_blur(&mut flat, w, h, w, 3);
        assert!(flat.iter().all(|&v| v == 90));
    }
}
