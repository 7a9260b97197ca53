//! Header-only image dimension probing: reads just enough of the file
//! to learn width/height/MIME type without decoding pixels.

use super::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Probes JPEG, PNG and GIF headers. Anything else is reported as
/// `UnsupportedImage` and the scanner stores the artwork without
/// dimensions rather than failing the whole track.
pub fn probe_dimensions(data: &[u8]) -> Result<(ImageDimensions, &'static str)> {
    if data.len() >= 8 && &data[0..8] == b"\x89PNG\r\n\x1a\n" {
        return probe_png(data).map(|d| (d, "image/png"));
    }
    if data.len() >= 3 && &data[0..3] == b"\xFF\xD8\xFF" {
        return probe_jpeg(data).map(|d| (d, "image/jpeg"));
    }
    if data.len() >= 6 && (&data[0..6] == b"GIF87a" || &data[0..6] == b"GIF89a") {
        return probe_gif(data).map(|d| (d, "image/gif"));
    }
    Err(Error::UnsupportedImage(format!(
        "unrecognized header ({} bytes)",
        data.len()
    )))
}

fn probe_png(data: &[u8]) -> Result<ImageDimensions> {
    if data.len() < 24 {
        return Err(Error::UnsupportedImage("truncated PNG header".into()));
    }
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Ok(ImageDimensions { width, height })
}

fn probe_gif(data: &[u8]) -> Result<ImageDimensions> {
    if data.len() < 10 {
        return Err(Error::UnsupportedImage("truncated GIF header".into()));
    }
    let width = u16::from_le_bytes([data[6], data[7]]) as u32;
    let height = u16::from_le_bytes([data[8], data[9]]) as u32;
    Ok(ImageDimensions { width, height })
}

fn probe_jpeg(data: &[u8]) -> Result<ImageDimensions> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        // SOF0..SOF3, SOF5..SOF7, SOF9..SOF11, SOF13..SOF15 carry frame dimensions.
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        let segment_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if is_sof {
            if pos + 9 > data.len() {
                break;
            }
            let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]) as u32;
            return Ok(ImageDimensions { width, height });
        }
        if marker == 0xD8 || marker == 0xD9 {
            pos += 2;
            continue;
        }
        pos += 2 + segment_len;
    }
    Err(Error::UnsupportedImage("no SOF segment found in JPEG".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_header_reports_dimensions() {
        let mut data = vec![0u8; 24];
        data[0..8].copy_from_slice(b"\x89PNG\r\n\x1a\n");
        data[16..20].copy_from_slice(&100u32.to_be_bytes());
        data[20..24].copy_from_slice(&200u32.to_be_bytes());
        let (dims, mime) = probe_dimensions(&data).unwrap();
        assert_eq!(dims, ImageDimensions { width: 100, height: 200 });
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn unrecognized_header_is_rejected() {
        assert!(probe_dimensions(b"not an image").is_err());
    }
}
