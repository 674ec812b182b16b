//! Backend picked at compile time by cargo feature (cuda > wgpu > ndarray).

#[cfg(feature = "cuda")]
pub type Inference = burn::backend::Cuda<f32, i32>;

#[cfg(all(feature = "wgpu", not(feature = "cuda")))]
pub type Inference = burn::backend::Wgpu<f32, i32>;

#[cfg(all(feature = "ndarray", not(any(feature = "wgpu", feature = "cuda"))))]
pub type Inference = burn::backend::NdArray<f32>;

/// Training backend with autodiff on top of [`Inference`].
pub type Training = burn::backend::Autodiff<Inference>;

pub type Device = <Inference as burn::tensor::backend::Backend>::Device;

/// Human-readable name of the compiled-in backend, for startup logs.
pub fn name() -> &'static str {
    if cfg!(feature = "cuda") {
        "cuda"
    } else if cfg!(feature = "wgpu") {
        "wgpu"
    } else {
        "ndarray"
    }
}
