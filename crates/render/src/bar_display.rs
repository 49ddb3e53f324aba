//! Bar gauge rendering

use lcd_sens_types::{BarGraphLayer, BarOrientation};

/// Render a bar gauge at its position for `value` (in the layer's units)
pub fn render_bar_graph(
    cr: &cairo::Context,
    layer: &BarGraphLayer,
    value: f64,
) -> Result<(), cairo::Error> {
    let (width, height) = (layer.width, layer.height);
    if width <= 0.0 || height <= 0.0 {
        return Ok(());
    }
    let fraction = layer.fraction(value);

    cr.save()?;
    cr.translate(layer.position.x, layer.position.y);

    // Track
    rounded_rectangle(cr, 0.0, 0.0, width, height, layer.corner_radius);
    layer.background_color.apply_to_cairo(cr);
    cr.fill()?;

    // Fill, clipped to the track shape so the corners stay rounded
    if fraction > 0.0 {
        cr.save()?;
        rounded_rectangle(cr, 0.0, 0.0, width, height, layer.corner_radius);
        cr.clip();
        match layer.orientation {
            BarOrientation::Horizontal => cr.rectangle(0.0, 0.0, width * fraction, height),
            BarOrientation::Vertical => {
                let filled = height * fraction;
                cr.rectangle(0.0, height - filled, width, filled)
            }
        }
        layer.fill_color.apply_to_cairo(cr);
        cr.fill()?;
        cr.restore()?;
    }

    if layer.show_border && layer.border_width > 0.0 {
        let inset = layer.border_width / 2.0;
        rounded_rectangle(
            cr,
            inset,
            inset,
            width - layer.border_width,
            height - layer.border_width,
            layer.corner_radius,
        );
        layer.border_color.apply_to_cairo(cr);
        cr.set_line_width(layer.border_width);
        cr.stroke()?;
    }

    cr.restore()?;
    Ok(())
}

/// Rectangle path with corners of `radius` (clamped to half the short side)
pub(crate) fn rounded_rectangle(
    cr: &cairo::Context,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    radius: f64,
) {
    let radius = radius.min(width / 2.0).min(height / 2.0).max(0.0);
    cr.new_path();
    if radius == 0.0 {
        cr.rectangle(x, y, width, height);
        return;
    }

    use std::f64::consts::{FRAC_PI_2, PI};
    cr.arc(x + radius, y + radius, radius, PI, 3.0 * FRAC_PI_2);
    cr.arc(x + width - radius, y + radius, radius, 3.0 * FRAC_PI_2, 0.0);
    cr.arc(x + width - radius, y + height - radius, radius, 0.0, FRAC_PI_2);
    cr.arc(x + radius, y + height - radius, radius, FRAC_PI_2, PI);
    cr.close_path();
}
