//! Circular (ring) gauge rendering

use lcd_sens_types::CircularGraphLayer;

use crate::text_renderer::render_text;

/// Render a ring gauge centered on the layer position.
///
/// `radius` is the outer edge of the ring; the stroke runs `thickness` inward.
/// `value_text` is drawn in the center when the layer shows its value.
pub fn render_circular_graph(
    cr: &cairo::Context,
    layer: &CircularGraphLayer,
    value: f64,
    value_text: Option<&str>,
) -> Result<(), cairo::Error> {
    let thickness = layer.thickness.min(layer.radius);
    if layer.radius <= 0.0 || thickness <= 0.0 {
        return Ok(());
    }
    let (cx, cy) = (layer.position.x, layer.position.y);
    let stroke_radius = layer.radius - thickness / 2.0;
    let sweep = layer.sweep_angle.clamp(-360.0, 360.0);
    let start_rad = layer.start_angle.to_radians();

    cr.save()?;
    cr.set_line_width(thickness);
    cr.set_line_cap(cairo::LineCap::Butt);

    if layer.show_track {
        cr.new_path();
        arc_path(cr, cx, cy, stroke_radius, start_rad, sweep.to_radians());
        layer.track_color.apply_to_cairo(cr);
        cr.stroke()?;
    }

    let fraction = layer.fraction(value);
    if fraction > 0.0 {
        cr.new_path();
        arc_path(
            cr,
            cx,
            cy,
            stroke_radius,
            start_rad,
            (sweep * fraction).to_radians(),
        );
        layer.fill_color.apply_to_cairo(cr);
        cr.stroke()?;
    }
    cr.restore()?;

    if layer.show_value {
        if let Some(text) = value_text {
            render_text(cr, text, &layer.value_style, cx, cy)?;
        }
    }
    Ok(())
}

/// Arc from `start` sweeping `sweep` radians (negative sweeps counter-clockwise)
fn arc_path(cr: &cairo::Context, cx: f64, cy: f64, radius: f64, start: f64, sweep: f64) {
    if sweep >= 0.0 {
        cr.arc(cx, cy, radius, start, start + sweep);
    } else {
        cr.arc_negative(cx, cy, radius, start, start + sweep);
    }
}
