// crates/vidtex-media/src/exchange.rs
//
// Frame buffer exchange: CanonicalPicture → bitmap blob → host texture.
//
// The core never uploads pixels itself. Each published picture is serialized
// into a well-known uncompressed (BMP) or lossless (PNG) image and handed to
// the host's image-decoding path, which owns the GPU transfer. The previous
// texture is released through the host before the new one is stored.

use std::io::Cursor;

use vidtex_core::{BitmapFormat, BoxError, CanonicalPicture, PlaybackError};

use crate::helpers::bgr::swap_red_blue;

/// The host side of the exchange (outward interface).
pub trait TextureHost {
    type Texture;

    /// Decode an encoded image blob into something the renderer can draw.
    fn texture_from_image(&mut self, encoded: &[u8]) -> Result<Self::Texture, BoxError>;

    /// Free a texture the core no longer publishes.
    fn release(&mut self, texture: Self::Texture) {
        drop(texture);
    }
}

/// Serialize `picture` for the host. Both formats are lossless, so the host
/// sees identical pixels either way.
pub fn encode_bitmap(picture: &CanonicalPicture, format: BitmapFormat) -> Result<Vec<u8>, PlaybackError> {
    let (w, h) = (picture.width(), picture.height());
    // BMP stores BGR on disk, but both encoders take RGB input.
    let rgb = swap_red_blue(picture.data());

    match format {
        BitmapFormat::Bmp => {
            let img = image::RgbImage::from_raw(w, h, rgb).ok_or_else(|| PlaybackError::ImageEncode {
                source: format!("{w}x{h} buffer does not match picture size").into(),
            })?;
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, image::ImageFormat::Bmp)
                .map_err(|e| PlaybackError::ImageEncode { source: Box::new(e) })?;
            Ok(out.into_inner())
        }
        BitmapFormat::Png => {
            let mut out = Vec::new();
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let encode_err = |e: png::EncodingError| PlaybackError::ImageEncode { source: Box::new(e) };
            let mut writer = encoder.write_header().map_err(encode_err)?;
            writer.write_image_data(&rgb).map_err(encode_err)?;
            writer.finish().map_err(encode_err)?;
            Ok(out)
        }
    }
}

// ── FrameExchange ─────────────────────────────────────────────────────────────

pub struct FrameExchange<H: TextureHost> {
    host:                H,
    format:              BitmapFormat,
    current:             Option<H::Texture>,
    showing_placeholder: bool,
    published:           u64,
}

impl<H: TextureHost> FrameExchange<H> {
    pub fn new(host: H, format: BitmapFormat) -> Self {
        Self { host, format, current: None, showing_placeholder: false, published: 0 }
    }

    pub fn current(&self) -> Option<&H::Texture> {
        self.current.as_ref()
    }

    pub fn is_showing_placeholder(&self) -> bool {
        self.current.is_some() && self.showing_placeholder
    }

    /// Decoded frames published so far (placeholders not counted).
    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn publish(&mut self, picture: &CanonicalPicture) -> Result<(), PlaybackError> {
        let encoded = encode_bitmap(picture, self.format)?;
        self.install(&encoded)?;
        self.showing_placeholder = false;
        self.published += 1;
        Ok(())
    }

    /// Show the stopped-state frame. A no-op when it is already showing.
    pub fn publish_placeholder(&mut self, encoded: &[u8]) -> Result<(), PlaybackError> {
        if self.is_showing_placeholder() {
            return Ok(());
        }
        self.install(encoded)?;
        self.showing_placeholder = true;
        Ok(())
    }

    /// Release the current texture, leaving nothing published.
    pub fn clear(&mut self) {
        if let Some(old) = self.current.take() {
            self.host.release(old);
        }
        self.showing_placeholder = false;
    }

    fn install(&mut self, encoded: &[u8]) -> Result<(), PlaybackError> {
        let texture = self
            .host
            .texture_from_image(encoded)
            .map_err(|source| PlaybackError::TextureHost { source })?;
        if let Some(old) = self.current.take() {
            self.host.release(old);
        }
        self.current = Some(texture);
        Ok(())
    }
}

// ── ImageTextureHost ──────────────────────────────────────────────────────────

/// Default host: decodes blobs with the `image` crate into RGBA8 CPU textures
/// ready for upload, and keeps allocation counts for diagnostics.
#[derive(Debug, Default)]
pub struct ImageTextureHost {
    allocated: u64,
    released:  u64,
}

impl ImageTextureHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    pub fn released(&self) -> u64 {
        self.released
    }

    /// Textures currently alive (allocated and not yet released).
    pub fn live(&self) -> u64 {
        self.allocated - self.released
    }
}

impl TextureHost for ImageTextureHost {
    type Texture = image::RgbaImage;

    fn texture_from_image(&mut self, encoded: &[u8]) -> Result<image::RgbaImage, BoxError> {
        let img = image::load_from_memory(encoded)?;
        self.allocated += 1;
        Ok(img.to_rgba8())
    }

    fn release(&mut self, texture: image::RgbaImage) {
        self.released += 1;
        drop(texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> CanonicalPicture {
        let data: Vec<u8> = (0..w * h)
            .flat_map(|i| [(i * 3) as u8, (i * 5) as u8, (i * 7) as u8])
            .collect();
        CanonicalPicture::new(w, h, 0, data).unwrap()
    }

    fn assert_same_pixels(tex: &image::RgbaImage, pic: &CanonicalPicture) {
        assert_eq!((tex.width(), tex.height()), (pic.width(), pic.height()));
        for y in 0..pic.height() {
            for x in 0..pic.width() {
                let [b, g, r] = pic.pixel(x, y).unwrap();
                assert_eq!(tex.get_pixel(x, y).0, [r, g, b, 255], "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn bmp_and_png_decode_to_identical_textures() {
        let pic = gradient(5, 3);
        let mut host = ImageTextureHost::new();
        for format in [BitmapFormat::Bmp, BitmapFormat::Png] {
            let blob = encode_bitmap(&pic, format).unwrap();
            let tex = host.texture_from_image(&blob).unwrap();
            assert_same_pixels(&tex, &pic);
        }
    }

    #[test]
    fn bmp_blob_has_bitmap_magic() {
        let blob = encode_bitmap(&CanonicalPicture::black(1, 1), BitmapFormat::Bmp).unwrap();
        assert_eq!(&blob[..2], b"BM");
    }

    #[test]
    fn publish_releases_previous_texture() {
        let mut ex = FrameExchange::new(ImageTextureHost::new(), BitmapFormat::Bmp);
        ex.publish(&gradient(2, 2)).unwrap();
        ex.publish(&gradient(2, 2)).unwrap();
        assert_eq!(ex.host().allocated(), 2);
        assert_eq!(ex.host().released(), 1);
        assert_eq!(ex.host().live(), 1);
        assert_eq!(ex.published(), 2);
    }

    #[test]
    fn placeholder_is_not_republished() {
        let blob = encode_bitmap(&CanonicalPicture::black(1, 1), BitmapFormat::Bmp).unwrap();
        let mut ex = FrameExchange::new(ImageTextureHost::new(), BitmapFormat::Bmp);
        ex.publish_placeholder(&blob).unwrap();
        ex.publish_placeholder(&blob).unwrap();
        assert_eq!(ex.host().allocated(), 1);
        assert!(ex.is_showing_placeholder());

        ex.publish(&gradient(1, 1)).unwrap();
        assert!(!ex.is_showing_placeholder());
        ex.publish_placeholder(&blob).unwrap();
        assert_eq!(ex.host().allocated(), 3);
        assert_eq!(ex.published(), 1);
    }

    #[test]
    fn host_rejection_keeps_previous_texture() {
        let mut ex = FrameExchange::new(ImageTextureHost::new(), BitmapFormat::Bmp);
        ex.publish(&gradient(1, 1)).unwrap();
        let err = ex.publish_placeholder(b"not an image").unwrap_err();
        assert!(matches!(err, PlaybackError::TextureHost { .. }));
        assert!(ex.current().is_some());
        assert_eq!(ex.host().released(), 0);
    }

    #[test]
    fn clear_releases_everything() {
        let mut ex = FrameExchange::new(ImageTextureHost::new(), BitmapFormat::Png);
        ex.publish(&gradient(1, 1)).unwrap();
        ex.clear();
        ex.clear();
        assert!(ex.current().is_none());
        assert_eq!(ex.host().live(), 0);
    }
}
