use std::path::Path;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use transport_panda::config::{ViewKind, CONFIG_FILE_NAME};
use transport_panda::data::extract::Polarity;
use transport_panda::units::SiLabel;
use transport_panda::SweepAxis;

use crate::color::generate_palette;
use crate::state::{AppState, InstrumentKind};

// ---------------------------------------------------------------------------
// Left side panel – sweep, view and selection widgets
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    let mut changed = false;

    ui.heading("Sweep");
    ui.separator();

    ui.strong("Instrument");
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for kind in InstrumentKind::ALL {
            ui.radio_value(&mut state.instrument, kind, kind.label());
        }
    });
    if state.instrument == InstrumentKind::Synktek {
        ui.checkbox(&mut state.config.analysis.invert_voltage, "Invert voltage");
    }
    ui.small("Applies to the next Open…");
    ui.add_space(4.0);

    ui.strong("Axis");
    egui::ComboBox::from_id_salt("sweep_axis")
        .selected_text(state.axis.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for axis in SweepAxis::ALL {
                changed |= ui
                    .selectable_value(&mut state.axis, axis, axis.to_string())
                    .changed();
            }
        });
    if changed {
        state.reset_range();
    }

    let device_count = state.dataset.as_ref().map_or(0, |ds| ds.device_count());
    if device_count > 1 {
        ui.strong("Device");
        changed |= ui
            .add(egui::Slider::new(&mut state.device, 0..=device_count - 1))
            .changed();
    }

    ui.add_space(4.0);
    ui.strong("View");
    egui::ComboBox::from_id_salt("view_kind")
        .selected_text(state.view.title())
        .show_ui(ui, |ui: &mut Ui| {
            for view in ViewKind::ALL {
                changed |= ui
                    .selectable_value(&mut state.view, view, view.title())
                    .changed();
            }
        });

    changed |= view_parameters(ui, state);

    ui.separator();
    changed |= measurement_selection(ui, state);

    if changed {
        state.refresh();
    }
}

/// Parameters of the active view. Returns true if any changed.
fn view_parameters(ui: &mut Ui, state: &mut AppState) -> bool {
    let mut changed = false;
    let analysis = &mut state.config.analysis;

    match state.view {
        ViewKind::CriticalCurrent => {
            changed |= ui
                .checkbox(&mut state.ic_from_didv, "Threshold on dV/dI")
                .changed();
            let threshold = if state.ic_from_didv {
                ui.label("Threshold (Ω)");
                &mut analysis.didv_threshold
            } else {
                ui.label("Threshold (V)");
                &mut analysis.iv_threshold
            };
            changed |= ui
                .add(egui::DragValue::new(threshold).speed(1e-7))
                .changed();

            ui.horizontal(|ui: &mut Ui| {
                for (polarity, text) in [
                    (Polarity::Positive, "+I"),
                    (Polarity::Negative, "−I"),
                    (Polarity::Unfiltered, "All"),
                ] {
                    changed |= ui
                        .radio_value(&mut state.polarity, polarity, text)
                        .changed();
                }
            });
        }
        ViewKind::ConstantBias => {
            ui.label("Bias (A)");
            changed |= ui
                .add(egui::DragValue::new(&mut analysis.constant_bias).speed(1e-7))
                .changed();
        }
        _ => {}
    }
    changed
}

/// Range or per-measurement checkboxes. Returns true if the selection changed.
fn measurement_selection(ui: &mut Ui, state: &mut AppState) -> bool {
    let labels = state.measurement_labels();
    if labels.is_empty() {
        ui.label("No dataset loaded.");
        return false;
    }

    let mut changed = ui
        .checkbox(&mut state.use_range, "Select by range")
        .changed();

    if state.use_range {
        let unit = SiLabel::for_axis(state.axis);
        let factor = unit.scale_factor();
        let (mut lo, mut hi) = (state.range.0 / factor, state.range.1 / factor);
        ui.horizontal(|ui: &mut Ui| {
            changed |= ui.add(egui::DragValue::new(&mut lo).prefix("from ")).changed();
            changed |= ui.add(egui::DragValue::new(&mut hi).prefix("to ")).changed();
            ui.label(unit.text_symbol());
        });
        state.range = (lo * factor, hi * factor);
        return changed;
    }

    let n_selected = state.selected.iter().filter(|&&s| s).count();
    let header = format!("Measurements  ({n_selected}/{})", labels.len());
    ui.strong(header);
    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("All").clicked() {
            state.set_all_selected(true);
        }
        if ui.small_button("None").clicked() {
            state.set_all_selected(false);
        }
    });

    let palette = generate_palette(n_selected);
    let mut color_idx = 0;
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (checked, label) in state.selected.iter_mut().zip(&labels) {
                let mut text = RichText::new(label);
                if *checked {
                    if let Some(&c) = palette.get(color_idx) {
                        text = text.color(c);
                    }
                    color_idx += 1;
                }
                changed |= ui.checkbox(checked, text).changed();
            }
        });
    changed
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state, false);
                ui.close_menu();
            }
            if ui.button("Append…").clicked() {
                open_file_dialog(state, true);
                ui.close_menu();
            }
            if ui.button("Export CSV…").clicked() {
                export_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Save settings").clicked() {
                if let Err(e) = state.save_config(Path::new(CONFIG_FILE_NAME)) {
                    report(state, e);
                }
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} measurements from {} file(s), {} curve(s) shown",
                ds.len(),
                state.files.len(),
                state.curves.len()
            ));
            ui.separator();
            if ui.button("Remove series resistance").clicked() {
                if let Err(e) = state.remove_series_resistance() {
                    report(state, e);
                }
            }
        }

        if let Some(msg) = &state.status_message {
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                Color32::GRAY
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

fn report(state: &mut AppState, e: anyhow::Error) {
    log::error!("{e:#}");
    state.status_message = Some(format!("Error: {e:#}"));
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState, append: bool) {
    let files = rfd::FileDialog::new()
        .set_title("Open transport measurements")
        .add_filter("Measurement text", &["txt", "dat"])
        .add_filter("All files", &["*"])
        .pick_files();

    if let Some(paths) = files {
        let result = if append {
            state.append_files(paths)
        } else {
            state.open_files(paths)
        };
        if let Err(e) = result {
            report(state, e);
        }
    }
}

pub fn export_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export curves")
        .add_filter("CSV", &["csv"])
        .set_file_name(format!("{}.csv", state.view.title().replace(' ', "_")))
        .save_file();

    if let Some(path) = file {
        match state.export_csv(&path) {
            Ok(()) => state.status_message = Some(format!("Exported to {}", path.display())),
            Err(e) => report(state, e),
        }
    }
}
