use half::f16;
use ndarray::Array3;

/// Edge length of every assembled volume, in voxels.
///
/// The loader pads and resamples any input series to this cubic resolution,
/// so the renderer can rely on a fixed texture size and slice count.
pub const VOLUME_SIZE: usize = 256;

/// A cubic scalar field of normalized intensities in `[0, 1]`.
///
/// Built once by [`VolumeLoader`] and immutable afterwards; the axes are
/// ordered `(depth, height, width)` as produced by stacking axial slices.
///
/// [`VolumeLoader`]: crate::volume_loader::VolumeLoader
pub struct Volume {
    data: Array3<f32>,
}

impl Volume {
    pub(crate) fn new(data: Array3<f32>) -> Self {
        debug_assert_eq!(data.dim(), (VOLUME_SIZE, VOLUME_SIZE, VOLUME_SIZE));
        Self { data }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Convert the field to half-float texels for the 3D texture upload.
    ///
    /// Logical order is row-major `(depth, height, width)`, matching a
    /// `wgpu` texel copy with `bytes_per_row = 2 * width` and
    /// `rows_per_image = height`.
    pub(crate) fn as_texels(&self) -> Vec<f16> {
        self.data.iter().map(|&v| f16::from_f32(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_conversion_preserves_order_and_range() {
        let mut data = Array3::<f32>::zeros((VOLUME_SIZE, VOLUME_SIZE, VOLUME_SIZE));
        data[[0, 0, 0]] = 1.0;
        data[[0, 0, 1]] = 0.5;
        data[[1, 0, 0]] = 0.25;
        let volume = Volume::new(data);

        let texels = volume.as_texels();
        assert_eq!(texels.len(), VOLUME_SIZE * VOLUME_SIZE * VOLUME_SIZE);
        assert_eq!(texels[0], f16::from_f32(1.0));
        assert_eq!(texels[1], f16::from_f32(0.5));
        // One full layer of WIDTH * HEIGHT texels before depth index 1.
        assert_eq!(texels[VOLUME_SIZE * VOLUME_SIZE], f16::from_f32(0.25));
    }
}
