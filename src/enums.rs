/// Texture filter applied when sampling the volume texture.
///
/// Cycled with the `f` key. `Trilinear` additionally interpolates between
/// mip levels, a no-op for the single-level volume texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
    Trilinear,
}

impl TextureFilter {
    pub fn next(self) -> Self {
        match self {
            TextureFilter::Linear => TextureFilter::Nearest,
            TextureFilter::Nearest => TextureFilter::Trilinear,
            TextureFilter::Trilinear => TextureFilter::Linear,
        }
    }
}

/// Principal rotation axis of the rendered volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}
