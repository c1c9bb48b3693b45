use std::io::Cursor;

use image::ImageReader;
use thiserror::Error;

/// Icons may not exceed this many pixels on either axis.
pub const MAX_ICON_DIM: u32 = 70;

// TODO: the undotted "png" entry never matches the dotted extensions this
// list is compared against, so ".png" uploads are rejected; fixing it needs a
// sweep of the media store for banners that predate the check.
const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", "png", ".gif"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Unsupported file extension")]
    UnsupportedExtension,
    #[error(
        "The max allowed dimension for icons is 70x70 - size you uploaded = ({width}, {height})"
    )]
    IconTooLarge { width: u32, height: u32 },
    #[error("Could not decode image: {0}")]
    UndecodableImage(#[from] image::ImageError),
}

/// Accept only filenames whose extension (everything from the last `.`,
/// lowercased) is in the allow-list.
pub fn validate_image_file_extension(filename: &str) -> Result<(), MediaError> {
    let ext = match filename.rfind('.') {
        Some(idx) => filename[idx..].to_lowercase(),
        None => String::new(),
    };
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(MediaError::UnsupportedExtension)
    }
}

/// Decode the payload's pixel dimensions and accept only images that fit
/// within [`MAX_ICON_DIM`] on both axes.
pub fn validate_icon_dimensions(bytes: &[u8]) -> Result<(), MediaError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_dimensions()?;

    if width > MAX_ICON_DIM || height > MAX_ICON_DIM {
        return Err(MediaError::IconTooLarge { width, height });
    }
    Ok(())
}
