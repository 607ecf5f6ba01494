use std::{fmt, str::FromStr};

use image::ImageBuffer;
use zune_jpeg::{
    zune_core::{colorspace::ColorSpace, options::DecoderOptions},
    JpegDecoder,
};

use super::Image;

/// Selects the library used to decode JPEG and MJPEG data.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum JpegBackend {
    /// Uses the `zune-jpeg` crate, a fast pure-Rust decoder.
    #[default]
    ZuneJpeg,
    /// Uses the `jpeg-decoder` crate (through `image`), a robust but slower pure-Rust decoder.
    JpegDecoder,
}

impl JpegBackend {
    fn name(&self) -> &'static str {
        match self {
            JpegBackend::ZuneJpeg => "zune-jpeg",
            JpegBackend::JpegDecoder => "jpeg-decoder",
        }
    }
}

impl FromStr for JpegBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zune-jpeg" => Ok(Self::ZuneJpeg),
            "jpeg-decoder" => Ok(Self::JpegDecoder),
            _ => anyhow::bail!(
                "unknown JPEG backend '{s}' (expected 'zune-jpeg' or 'jpeg-decoder')"
            ),
        }
    }
}

impl fmt::Debug for JpegBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for JpegBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(super) fn decode(data: &[u8], backend: JpegBackend) -> anyhow::Result<Image> {
    let buf = match backend {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::ZuneJpeg => {
            let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
            let mut decoder = JpegDecoder::new_with_options(options, data);
            let pixels = decoder
                .decode()
                .map_err(|e| anyhow::anyhow!("failed to decode JPEG: {e:?}"))?;
            let (width, height) = decoder
                .dimensions()
                .ok_or_else(|| anyhow::anyhow!("JPEG decoder did not report image dimensions"))?;
            ImageBuffer::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
                anyhow::anyhow!("decoded JPEG data does not match its {width}x{height} size")
            })?
        }
    };

    Ok(Image { buf })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_backend() {
        assert_eq!(
            "zune-jpeg".parse::<JpegBackend>().unwrap(),
            JpegBackend::ZuneJpeg
        );
        assert_eq!(
            "jpeg-decoder".parse::<JpegBackend>().unwrap(),
            JpegBackend::JpegDecoder
        );
        assert!("mozjpeg".parse::<JpegBackend>().is_err());
        assert_eq!(JpegBackend::default(), JpegBackend::ZuneJpeg);
    }

    #[test]
    fn garbage_is_rejected() {
        let data = [0u8, 1, 2, 3, 4, 5];
        assert!(decode(&data, JpegBackend::ZuneJpeg).is_err());
        assert!(decode(&data, JpegBackend::JpegDecoder).is_err());
    }
}
