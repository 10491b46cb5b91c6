use crate::core::{CarsimError, Observation, Result};

/// Encode an observation to a PNG byte vector.
/// - When the `image` feature is enabled, this will encode using the `image` crate.
/// - Without the feature, returns CarsimError::NotSupported.
pub fn encode_png(frame: &Observation) -> Result<Vec<u8>> {
    if frame.data.len() != frame.expected_len() {
        return Err(CarsimError::Configuration(format!(
            "Pixel data length {} does not match width*height*3 ({}x{})",
            frame.data.len(), frame.width, frame.height
        )));
    }
    encode_pixels_png(frame.width, frame.height, &frame.data)
}

#[cfg(feature = "image")]
fn encode_pixels_png(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};
    use std::io::Cursor;

    let mut buf = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buf);
        let encoder = PngEncoder::new(&mut cursor);
        encoder
            .write_image(data, width, height, ExtendedColorType::Rgb8)
            .map_err(|e| CarsimError::NotSupported(format!("PNG encode error: {}", e)))?;
    }
    Ok(buf)
}

#[cfg(not(feature = "image"))]
fn encode_pixels_png(_width: u32, _height: u32, _data: &[u8]) -> Result<Vec<u8>> {
    Err(CarsimError::NotSupported(
        "PNG encoding requires the `image` feature".into(),
    ))
}

/// Save an observation as a PNG file at the given path.
/// Requires the `image` feature; otherwise returns NotSupported.
pub fn save_png<P: AsRef<std::path::Path>>(path: P, frame: &Observation) -> Result<()> {
    let bytes = encode_png(frame)?;
    let path = path.as_ref();
    std::fs::write(path, bytes).map_err(|source| CarsimError::Io { path: path.to_path_buf(), source })
}

impl Observation {
    /// PNG bytes of this observation (see [`encode_png`]).
    pub fn encode_png(&self) -> Result<Vec<u8>> { encode_png(self) }
}
