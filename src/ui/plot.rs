use eframe::egui::Ui;
use egui_plot::{Legend, Line, Plot, PlotPoints, Points};

use transport_panda::units::SiLabel;
use transport_panda::Curve2D;

use crate::color::{generate_palette, SINGLE_CURVE};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Sweep plot (central panel)
// ---------------------------------------------------------------------------

/// Curve points rescaled into the axis labels' display units.
fn display_points(curve: &Curve2D, x_label: Option<&SiLabel>, y_label: Option<&SiLabel>) -> Vec<[f64; 2]> {
    let scale = |label: Option<&SiLabel>, v: f64| label.map_or(v, |l| l.to_display(v));
    curve
        .points()
        .map(|[x, y]| [scale(x_label, x), scale(y_label, y)])
        .collect()
}

/// Render the curves of the current view in the central panel.
pub fn sweep_plot(ui: &mut Ui, state: &AppState) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open measurement files to begin  (File → Open…)");
        });
        return;
    }

    let style = &state.style;
    let x_label = style.x_label.as_ref();
    let y_label = style.y_label.as_ref();
    let connect = style.connect_points.unwrap_or(true);
    let radius = style.marker_radius.unwrap_or(2.5);
    let width = style.line_width.unwrap_or(1.5);

    let palette = if state.curves.len() > 1 {
        generate_palette(state.curves.len())
    } else {
        vec![SINGLE_CURVE]
    };

    let mut plot = Plot::new("sweep_plot")
        .x_axis_label(x_label.map(SiLabel::text_label).unwrap_or_default())
        .y_axis_label(y_label.map(SiLabel::text_label).unwrap_or_default())
        .show_grid(style.grid.unwrap_or(true))
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);
    if style.legend.unwrap_or(false) {
        plot = plot.legend(Legend::default());
    }
    if let Some([lo, hi]) = style.x_limits {
        plot = plot.include_x(lo).include_x(hi);
    }
    if let Some([lo, hi]) = style.y_limits {
        plot = plot.include_y(lo).include_y(hi);
    }

    if let Some(title) = &style.title {
        ui.strong(title);
    }

    plot.show(ui, |plot_ui| {
        for (idx, curve) in state.curves.iter().enumerate() {
            let color = palette[idx % palette.len()];
            let name = curve
                .label
                .as_ref()
                .map(|l| l.to_string())
                .unwrap_or_else(|| state.view.title().to_string());
            let points = display_points(curve, x_label, y_label);

            if connect {
                plot_ui.line(
                    Line::new(PlotPoints::from(points.clone()))
                        .name(&name)
                        .color(color)
                        .width(width),
                );
            }
            plot_ui.points(
                Points::new(PlotPoints::from(points))
                    .name(&name)
                    .color(color)
                    .radius(radius),
            );
        }
    });
}
