use crate::{
    interpolator::Interpolator,
    volume::{VOLUME_SIZE, Volume},
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use log::{debug, warn};
use ndarray::{Array2, Array3, s};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("slice index contains no entries")]
    EmptySliceList,

    #[error("could not decode pixel data from {0}")]
    UndecodableSlice(String),

    #[error("slice {index} is {height}x{width} and does not fit the {size}^3 grid")]
    SliceOverflow {
        index: usize,
        height: usize,
        width: usize,
        size: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a slice index file
    ///
    /// The index lists one DICOM file path per line; line order defines the
    /// depth order of the stacked slices. Lines are trimmed and blank lines
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is unreadable or empty, a referenced
    /// slice cannot be read or decoded, or a slice does not fit the working
    /// grid.
    pub fn load_from_index_file(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let index = fs::read_to_string(path.as_ref())?;
        let paths: Vec<&str> = index
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        Self::load_from_file_paths(&paths)
    }

    /// Load a volume from DICOM file paths, in stacking order
    pub fn load_from_file_paths(paths: &[impl AsRef<Path>]) -> Result<Volume, VolumeLoaderError> {
        if paths.is_empty() {
            return Err(VolumeLoaderError::EmptySliceList);
        }

        let mut slices = Vec::with_capacity(paths.len());
        let mut series_uid: Option<String> = None;

        for path in paths {
            let path = path.as_ref();
            let object = open_file(path)?;

            // Volumes are assumed to come from a single series; a mixed
            // index is still stacked as given.
            match (series_uid.as_deref(), Self::series_uid(&object)) {
                (None, uid) => series_uid = uid,
                (Some(first), Some(uid)) if first != uid => {
                    warn!(
                        "slice {} belongs to series {uid}, expected {first}",
                        path.display()
                    );
                }
                _ => {}
            }

            let slice = Self::decode_slice(&object)
                .ok_or_else(|| VolumeLoaderError::UndecodableSlice(path.display().to_string()))?;
            slices.push(slice);
        }

        Self::build_from_slices(&slices)
    }

    /// Assemble already-decoded intensity planes into a normalized volume
    ///
    /// The planes are stacked along the depth axis into a zero-padded
    /// power-of-two working grid, normalized globally to `[0, 1]`, and
    /// resampled to [`VOLUME_SIZE`]³.
    ///
    /// # Errors
    ///
    /// Returns an error if `slices` is empty or a plane exceeds the working
    /// grid computed from the first plane and the slice count.
    pub fn build_from_slices(slices: &[Array2<f32>]) -> Result<Volume, VolumeLoaderError> {
        if slices.is_empty() {
            return Err(VolumeLoaderError::EmptySliceList);
        }

        let mut grid = Self::assemble_grid(slices)?;
        Self::normalize(&mut grid);

        Ok(Volume::new(Interpolator::zoom(&grid, VOLUME_SIZE)))
    }

    fn assemble_grid(slices: &[Array2<f32>]) -> Result<Array3<f32>, VolumeLoaderError> {
        let (height, width) = slices[0].dim();
        let size = Self::working_size(height, width, slices.len());
        debug!(
            "assembling {} slices of {height}x{width} into a {size}^3 working grid",
            slices.len()
        );

        let mut grid = Array3::<f32>::zeros((size, size, size));
        for (i, slice) in slices.iter().enumerate() {
            let (slice_height, slice_width) = slice.dim();
            if slice_height > size || slice_width > size {
                return Err(VolumeLoaderError::SliceOverflow {
                    index: i,
                    height: slice_height,
                    width: slice_width,
                    size,
                });
            }
            // Slice i fills depth layer i; the remainder of the layer stays
            // zero-padded.
            grid.slice_mut(s![i, ..slice_height, ..slice_width])
                .assign(slice);
        }

        Ok(grid)
    }

    /// Smallest power of two holding every slice and every layer index,
    /// never below the output resolution.
    fn working_size(height: usize, width: usize, count: usize) -> usize {
        height
            .max(width)
            .max(count)
            .next_power_of_two()
            .max(VOLUME_SIZE)
    }

    fn normalize(grid: &mut Array3<f32>) {
        let (min, max) = grid
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });

        // A flat field has no range to normalize over and maps to zero.
        let range = max - min;
        if range > 0.0 {
            grid.par_mapv_inplace(|v| (v - min) / range);
        } else {
            grid.fill(0.0);
        }
    }

    fn decode_slice(object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn series_uid(object: &FileDicomObject<InMemDicomObject>) -> Option<String> {
        object
            .element(tags::SERIES_INSTANCE_UID)
            .ok()?
            .to_str()
            .ok()
            .map(|uid| uid.trim_end_matches('\0').trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_slice(height: usize, width: usize, value: f32) -> Array2<f32> {
        Array2::from_elem((height, width), value)
    }

    #[test]
    fn working_size_rounds_up_to_power_of_two() {
        assert_eq!(VolumeLoader::working_size(300, 200, 10), 512);
        assert_eq!(VolumeLoader::working_size(100, 100, 5), 256);
        assert_eq!(VolumeLoader::working_size(64, 64, 4), 256);
        assert_eq!(VolumeLoader::working_size(16, 16, 600), 1024);
    }

    #[test]
    fn empty_slice_list_is_rejected() {
        let slices: Vec<Array2<f32>> = Vec::new();
        assert!(matches!(
            VolumeLoader::build_from_slices(&slices),
            Err(VolumeLoaderError::EmptySliceList)
        ));
    }

    #[test]
    fn slice_zero_lands_in_layer_zero() {
        // Pins the stacking origin: the first slice must not be dropped and
        // no layer may be written one step early.
        let mut first = flat_slice(4, 4, 0.0);
        first[[1, 2]] = 7.0;
        let slices = vec![first, flat_slice(4, 4, 1.0), flat_slice(4, 4, 2.0)];

        let grid = VolumeLoader::assemble_grid(&slices).unwrap();
        assert_eq!(grid[[0, 1, 2]], 7.0);
        assert_eq!(grid[[1, 0, 0]], 1.0);
        assert_eq!(grid[[2, 3, 3]], 2.0);
        // Beyond the populated layers the grid stays zero.
        assert_eq!(grid[[3, 0, 0]], 0.0);
    }

    #[test]
    fn layers_are_zero_padded_outside_slice_extent() {
        let slices = vec![flat_slice(4, 8, 3.0)];
        let grid = VolumeLoader::assemble_grid(&slices).unwrap();
        assert_eq!(grid.dim(), (256, 256, 256));
        assert_eq!(grid[[0, 3, 7]], 3.0);
        assert_eq!(grid[[0, 4, 0]], 0.0);
        assert_eq!(grid[[0, 0, 8]], 0.0);
    }

    #[test]
    fn oversized_slice_is_rejected() {
        let slices = vec![flat_slice(16, 16, 1.0), flat_slice(300, 300, 1.0)];
        assert!(matches!(
            VolumeLoader::build_from_slices(&slices),
            Err(VolumeLoaderError::SliceOverflow { index: 1, .. })
        ));
    }

    #[test]
    fn normalization_spans_unit_interval() {
        let mut grid = Array3::<f32>::from_elem((2, 2, 2), 10.0);
        grid[[1, 1, 1]] = 30.0;
        grid[[0, 1, 0]] = 20.0;
        VolumeLoader::normalize(&mut grid);

        assert_eq!(grid[[0, 0, 0]], 0.0);
        assert_eq!(grid[[1, 1, 1]], 1.0);
        assert!((grid[[0, 1, 0]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn flat_field_normalizes_to_zero() {
        let mut grid = Array3::<f32>::from_elem((2, 2, 2), 42.0);
        VolumeLoader::normalize(&mut grid);
        assert!(grid.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn built_volume_is_always_cubic_at_output_size() {
        let slices = vec![flat_slice(31, 17, 5.0), flat_slice(31, 17, 9.0)];
        let volume = VolumeLoader::build_from_slices(&slices).unwrap();
        assert_eq!(volume.dim(), (VOLUME_SIZE, VOLUME_SIZE, VOLUME_SIZE));
        assert!(volume.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
