//! Numeric backend interop.
//! Optional conversion of camera observations into `ndarray` tensors, gated
//! behind the `ndarray` feature so the core crate keeps plain byte buffers.

#[cfg(feature = "ndarray")]
pub mod ndarray_impl {
    use crate::core::{CarsimError, Observation, Result};
    use ndarray::Array3;

    impl Observation {
        /// View the image as a `(height, width, 3)` array.
        pub fn to_ndarray(&self) -> Result<Array3<u8>> {
            Array3::from_shape_vec((self.height as usize, self.width as usize, 3), self.data.clone())
                .map_err(|e| CarsimError::Configuration(format!("observation shape mismatch: {e}")))
        }
    }

}
