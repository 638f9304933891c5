//! Viewer-side behaviour of the layer index on interpreted programs
use gcode_toolpath::{LayerView, Pipeline, PipelineConfig};

/// One square perimeter per layer, with a travel up between layers
fn tower(layers: usize) -> String {
    let mut program = String::from("G90\nM83\nG1 F1800\n");
    for layer in 1..=layers {
        let z = layer as f64 * 0.2;
        program.push_str(&format!("G0 Z{z:.1}\n"));
        program.push_str("G1 X10 Y0 E0.5\nG1 X10 Y10 E0.5\nG1 X0 Y10 E0.5\nG1 X0 Y0 E0.5\n");
    }
    program
}

fn pipeline_with(fade_window: usize, layers: usize) -> Pipeline {
    let mut pipeline = Pipeline::new(PipelineConfig {
        fade_window,
        ..Default::default()
    })
    .expect("valid config");
    pipeline.feed_lines(tower(layers).lines());
    pipeline
}

fn zs(view: &[LayerView<'_>]) -> Vec<f64> {
    view.iter().map(|layer| layer.z).collect()
}

#[test]
fn layers_follow_print_order() {
    let pipeline = pipeline_with(6, 5);
    let index = pipeline.layer_index();

    assert_eq!(index.layers(), &[0.2, 0.4, 0.6, 0.8, 1.0]);
    // the Z move between layers is not drawn
    assert_eq!(index.segments_at(0.2).len(), 4);
    assert_eq!(index.segments_at(1.0).len(), 4);
    assert_eq!(index.iter().count(), 5);
}

#[test]
fn cursor_starts_at_first_layer_and_walks() {
    let mut pipeline = pipeline_with(2, 5);
    let index = pipeline.layer_index_mut();

    assert_eq!(index.active_layer(), Some(0.2));
    let view: Vec<_> = index.active_view().collect();
    assert_eq!(zs(&view), vec![0.2]);
    assert_eq!(view[0].intensity, 1.0);

    index.cursor_up();
    index.cursor_up();
    index.cursor_up();
    let view: Vec<_> = index.active_view().collect();
    assert_eq!(zs(&view), vec![0.4, 0.6, 0.8]);
    let intensities: Vec<f64> = view.iter().map(|layer| layer.intensity).collect();
    assert_eq!(intensities, vec![1.0 / 3.0, 2.0 / 3.0, 1.0]);
}

#[test]
fn zero_fade_window_shows_only_active() {
    let mut pipeline = pipeline_with(0, 3);
    let index = pipeline.layer_index_mut();
    assert!(index.set_layer(0.6));

    let view: Vec<_> = index.active_view().collect();
    assert_eq!(zs(&view), vec![0.6]);
    assert_eq!(view[0].segments.len(), 4);
}

#[test]
fn show_all_then_pick_layer() {
    let mut pipeline = pipeline_with(6, 4);
    let index = pipeline.layer_index_mut();

    index.show_all(true);
    let view: Vec<_> = index.active_view().collect();
    assert_eq!(zs(&view), vec![0.2, 0.4, 0.6, 0.8]);
    assert!(view.iter().all(|layer| layer.intensity == 1.0));

    assert!(index.set_layer(0.4));
    let view: Vec<_> = index.active_view().collect();
    assert_eq!(zs(&view), vec![0.2, 0.4]);
}

#[test]
fn clear_empties_the_view() {
    let mut pipeline = pipeline_with(6, 2);
    pipeline.layer_index_mut().clear();

    let index = pipeline.layer_index();
    assert!(index.is_empty());
    assert_eq!(index.segment_count(), 0);
    assert_eq!(index.active_view().count(), 0);

    // new extrusion after a clear starts a fresh index
    pipeline.feed_line("G1 X5 Y5 E1");
    assert_eq!(pipeline.layer_index().layers(), &[0.4]);
}
