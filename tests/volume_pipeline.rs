//! End-to-end volume assembly on synthetic slice data.

use dicom_mip::volume::VOLUME_SIZE;
use dicom_mip::volume_loader::{VolumeLoader, VolumeLoaderError};
use ndarray::Array2;

#[test]
fn flat_series_builds_an_all_zero_volume() {
    // Four identical 64x64 slices: working size 256, degenerate intensity
    // range, so normalization maps everything to zero.
    let slices = vec![Array2::<f32>::from_elem((64, 64), 1000.0); 4];

    let volume = VolumeLoader::build_from_slices(&slices).unwrap();
    assert_eq!(volume.dim(), (VOLUME_SIZE, VOLUME_SIZE, VOLUME_SIZE));
    assert!(volume.data().iter().all(|&v| v == 0.0));
}

#[test]
fn first_slice_is_visible_in_the_first_layer() {
    // With a 256-sized working grid the final resample is an identity copy,
    // so slice placement is directly observable in the output.
    let mut bright = Array2::<f32>::zeros((64, 64));
    bright[[10, 20]] = 100.0;
    let slices = vec![bright, Array2::<f32>::zeros((64, 64))];

    let volume = VolumeLoader::build_from_slices(&slices).unwrap();
    assert_eq!(volume.data()[[0, 10, 20]], 1.0);
    assert_eq!(volume.data()[[1, 10, 20]], 0.0);
}

#[test]
fn output_is_normalized_for_arbitrary_intensity_ranges() {
    let mut ramp = Array2::<f32>::zeros((32, 32));
    for ((y, x), value) in ramp.indexed_iter_mut() {
        *value = -500.0 + (y * 32 + x) as f32;
    }
    let slices = vec![ramp; 3];

    let volume = VolumeLoader::build_from_slices(&slices).unwrap();
    let min = volume.data().iter().cloned().fold(f32::INFINITY, f32::min);
    let max = volume
        .data()
        .iter()
        .cloned()
        .fold(f32::NEG_INFINITY, f32::max);
    assert_eq!(min, 0.0);
    assert_eq!(max, 1.0);
}

#[test]
fn large_slices_force_a_larger_working_grid_but_fixed_output() {
    // 300x200 slices round the working size up to 512; the output is still
    // resampled down to 256 per edge.
    let mut slice = Array2::<f32>::zeros((300, 200));
    slice[[150, 100]] = 10.0;
    let slices = vec![slice; 2];

    let volume = VolumeLoader::build_from_slices(&slices).unwrap();
    assert_eq!(volume.dim(), (VOLUME_SIZE, VOLUME_SIZE, VOLUME_SIZE));
    assert!(volume.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
}

#[test]
fn missing_index_file_fails_before_rendering() {
    let result = VolumeLoader::load_from_index_file("/nonexistent/slices.txt");
    assert!(matches!(result, Err(VolumeLoaderError::Io(_))));
}

#[test]
fn blank_index_lines_do_not_count_as_slices() {
    let dir = std::env::temp_dir().join("dicom-mip-empty-index");
    std::fs::create_dir_all(&dir).unwrap();
    let index = dir.join("slices.txt");
    std::fs::write(&index, "\n   \n\n").unwrap();

    let result = VolumeLoader::load_from_index_file(&index);
    assert!(matches!(result, Err(VolumeLoaderError::EmptySliceList)));
}
