//! # DICOM-MIP viewer library
//!
//! This crate renders a stack of DICOM cross-section images as a single
//! interactive 3D volume.

//!
//! It is part of the dicom-rs ecosystem and leverages its components to
//! assemble the slices of a series into a cubic voxel field. The field is
//! zero-padded to a power-of-two working size (at least 256 per edge),
//! normalized globally to `[0, 1]`, resampled to a fixed 256³ grid, and
//! uploaded once as a 3D texture. Every frame, 512 view-aligned textured
//! quads are composited with a maximum-value blend state, approximating a
//! maximum-intensity projection (MIP) through the volume without ray
//! casting.
//!
//! Slices are listed in a plain-text index file, one DICOM path per line;
//! line order defines the depth order. The viewer binary maps key events to
//! the renderer's mutators: arrow and `j`/`k` keys rotate the volume about
//! its three axes, `f` cycles the texture filter, and `l`, `b`, `d` toggle
//! lighting, blending, and the depth test.
//!
//!   Contributions are highly welcome!
//!
//! # Examples
//!
//! ## Building a volume from a slice index
//!
//! Read the index, assemble and normalize the volume, and inspect its fixed
//! dimensions before handing it to the renderer.
//!
//! ```no_run
//! # use dicom_mip::volume_loader::VolumeLoader;
//! let volume = VolumeLoader::load_from_index_file("slices.txt")
//!     .expect("should have assembled the volume from the index");
//! assert_eq!(volume.dim(), (256, 256, 256));
//! ```

pub mod enums;
mod interpolator;
pub mod render_state;
pub mod renderer;
pub mod volume;
pub mod volume_loader;
