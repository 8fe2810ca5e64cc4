use ndarray::{Array3, ArrayView3};
use rayon::prelude::*;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Resample a cubic grid to `target` voxels per edge.
    ///
    /// Sample points are half-pixel centered and clamped to the source
    /// extent, so values interpolate within the original intensity range.
    /// Output layers are computed in parallel.
    pub(crate) fn zoom(volume: &Array3<f32>, target: usize) -> Array3<f32> {
        if volume.dim() == (target, target, target) {
            return volume.clone();
        }

        let (depth, height, width) = volume.dim();
        let view = volume.view();

        let data: Vec<f32> = (0..target)
            .into_par_iter()
            .flat_map(|z| {
                let src_z = Self::source_coordinate(z, target, depth);
                let mut layer = Vec::with_capacity(target * target);
                for y in 0..target {
                    let src_y = Self::source_coordinate(y, target, height);
                    for x in 0..target {
                        let src_x = Self::source_coordinate(x, target, width);
                        layer.push(Self::trilinear_interpolate(&view, src_z, src_y, src_x));
                    }
                }
                layer
            })
            .collect();

        Array3::from_shape_vec((target, target, target), data)
            .expect("resampled grid must have target^3 elements")
    }

    #[inline]
    fn source_coordinate(index: usize, target: usize, source: usize) -> f32 {
        // Normalized coordinates with half-pixel offset, clamped to the
        // valid sample range.
        let norm = (index as f32 + 0.5) / target as f32;
        let coord = norm * source as f32 - 0.5;
        coord.max(0.0).min((source - 1) as f32)
    }

    #[inline]
    pub(crate) fn trilinear_interpolate(volume: &ArrayView3<f32>, z: f32, y: f32, x: f32) -> f32 {
        let (depth, height, width) = volume.dim();

        let z0 = z.floor() as usize;
        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let z1 = (z0 + 1).min(depth - 1);
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dz = z - z0 as f32;
        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let front_0 = volume[[z0, y0, x0]].mul_add(one_minus_dx, volume[[z0, y0, x1]] * dx);
        let front_1 = volume[[z0, y1, x0]].mul_add(one_minus_dx, volume[[z0, y1, x1]] * dx);
        let front = front_0.mul_add(one_minus_dy, front_1 * dy);

        let back_0 = volume[[z1, y0, x0]].mul_add(one_minus_dx, volume[[z1, y0, x1]] * dx);
        let back_1 = volume[[z1, y1, x0]].mul_add(one_minus_dx, volume[[z1, y1, x1]] * dx);
        let back = back_0.mul_add(one_minus_dy, back_1 * dy);

        front.mul_add(1.0 - dz, back * dz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_of_matching_size_is_identity() {
        let mut volume = Array3::<f32>::zeros((4, 4, 4));
        volume[[1, 2, 3]] = 0.75;
        let zoomed = Interpolator::zoom(&volume, 4);
        assert_eq!(zoomed, volume);
    }

    #[test]
    fn zoom_preserves_constant_fields() {
        let volume = Array3::<f32>::from_elem((8, 8, 8), 0.5);
        let zoomed = Interpolator::zoom(&volume, 4);
        assert_eq!(zoomed.dim(), (4, 4, 4));
        for &v in zoomed.iter() {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn zoom_stays_within_source_range() {
        let mut volume = Array3::<f32>::zeros((8, 8, 8));
        volume[[4, 4, 4]] = 1.0;
        let zoomed = Interpolator::zoom(&volume, 16);
        for &v in zoomed.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn trilinear_hits_grid_points_exactly() {
        let mut volume = Array3::<f32>::zeros((2, 2, 2));
        volume[[1, 0, 1]] = 0.8;
        let view = volume.view();
        assert_eq!(Interpolator::trilinear_interpolate(&view, 1.0, 0.0, 1.0), 0.8);
        assert_eq!(Interpolator::trilinear_interpolate(&view, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn trilinear_averages_at_cell_center() {
        let mut volume = Array3::<f32>::zeros((2, 2, 2));
        volume[[0, 0, 0]] = 1.0;
        let view = volume.view();
        // One corner of eight contributes 1/8 at the cell midpoint.
        let center = Interpolator::trilinear_interpolate(&view, 0.5, 0.5, 0.5);
        assert!((center - 0.125).abs() < 1e-6);
    }
}
