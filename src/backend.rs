//! Backend selection
//!
//! The pipeline runs on the NdArray CPU backend by default. Enabling the
//! `wgpu` cargo feature swaps in the WGPU backend for GPU execution.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(not(feature = "wgpu"))]
pub type DefaultBackend = burn::backend::NdArray<f32>;

#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu;

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device for the selected backend
pub fn default_device() -> <DefaultBackend as Backend>::Device {
    Default::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(not(feature = "wgpu"))]
    {
        "NdArray (CPU)"
    }
    #[cfg(feature = "wgpu")]
    {
        "WGPU (GPU)"
    }
}
