// crates/vidtex-media/src/convert.rs
//
// Colorspace stage: turns decoder output into a CanonicalPicture.
//
// The converter only exists when the decoder's native format is not BGR24;
// it is built once per play session. Whatever comes out, converted or not,
// must be BGR24, otherwise the picture is rejected.

use vidtex_core::{CanonicalPicture, PlaybackError};

use crate::backend::{Converter, Decoder, MediaBackend, MediaPicture};

pub struct ColorStage<C> {
    converter: Option<C>,
}

impl<C: Converter> ColorStage<C> {
    pub fn prepare<B>(backend: &mut B, decoder: &B::Decoder) -> Result<Self, PlaybackError>
    where
        B: MediaBackend<Converter = C>,
    {
        let native = decoder.pixel_format();
        if native.is_canonical() {
            return Ok(Self { converter: None });
        }
        let converter = backend
            .open_converter(decoder)
            .map_err(|source| PlaybackError::ResamplerInitFailed { from: native.clone(), source })?;
        log::debug!("colorspace: {native} -> bgr24 at {}x{}", decoder.width(), decoder.height());
        Ok(Self { converter: Some(converter) })
    }

    #[cfg(test)]
    fn passthrough() -> Self {
        Self { converter: None }
    }

    pub fn is_converting(&self) -> bool {
        self.converter.is_some()
    }

    pub fn canonicalize(&mut self, picture: &C::Picture) -> Result<CanonicalPicture, PlaybackError> {
        match self.converter.as_mut() {
            Some(converter) => {
                let converted = converter.convert(picture).map_err(|source| {
                    PlaybackError::ResampleFailed { timestamp_us: picture.timestamp_us(), source }
                })?;
                converted.to_canonical()
            }
            None => picture.to_canonical(),
        }
    }
}
