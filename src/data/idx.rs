//! Reader for the IDX format used by the MNIST dataset.
//!
//! Images and labels arrive as two separate big-endian byte streams: the
//! image stream carries a magic number, an item count and the row/column
//! dimensions followed by that many fixed-size unsigned-byte grids; the
//! label stream carries a magic number and a count followed by one unsigned
//! byte per label.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::data::image::LabeledImage;
use crate::error::{Error, Result};

/// Reads a labeled image collection from an image stream and a label stream.
///
/// # Errors
///
/// * `DataFormat` if the declared image and label counts disagree, or if a
///   declared dimension is zero.
/// * `Io` if either stream ends before the declared data.
pub fn load<R: Read, L: Read>(mut images: R, mut labels: L) -> Result<Vec<LabeledImage>> {
    let image_magic = read_u32(&mut images)?;
    let count = read_u32(&mut images)? as usize;
    let rows = read_u32(&mut images)? as usize;
    let cols = read_u32(&mut images)? as usize;

    let label_magic = read_u32(&mut labels)?;
    let label_count = read_u32(&mut labels)? as usize;

    debug!("image header: magic={image_magic:#010x} count={count} dims={rows}x{cols}");
    debug!("label header: magic={label_magic:#010x} count={label_count}");

    if count != label_count {
        return Err(Error::data_format(format!(
            "image count {count} does not match label count {label_count}"
        )));
    }
    if rows == 0 || cols == 0 {
        return Err(Error::data_format(format!(
            "declared image dimensions must be positive, got {rows}x{cols}"
        )));
    }

    let mut data = Vec::with_capacity(count);
    for _ in 0..count {
        let mut label = [0u8; 1];
        labels.read_exact(&mut label)?;

        let mut pixels = vec![0u8; rows * cols];
        images.read_exact(&mut pixels)?;

        data.push(LabeledImage::new(rows, cols, pixels, label[0])?);
    }
    Ok(data)
}

/// Opens the image and label files at the given paths and reads them with
/// [`load`].
pub fn load_files(
    images_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
) -> Result<Vec<LabeledImage>> {
    let images = BufReader::new(File::open(images_path)?);
    let labels = BufReader::new(File::open(labels_path)?);
    load(images, labels)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}
