//! Frames, views into frames, and drawing onto them.
//!
//! Webcam frames are decoded into an [`Image`]. The networks look at (possibly rotated) regions
//! of a frame through an [`ImageView`], and the visualization draws through an [`ImageViewMut`].
//! Code that does not care which of these it gets should take [`AsImageView`] or
//! [`AsImageViewMut`].

pub mod draw;
mod jpeg;
mod rect;
mod resolution;

#[cfg(test)]
mod tests;

use std::fmt;

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{ImageBuffer, Rgba, RgbaImage};

pub use jpeg::JpegBackend;
pub use rect::{Rect, RotatedRect};
pub use resolution::{AspectRatio, Resolution};

/// An RGBA8 image in sRGB color space.
///
/// The pixel layout matches the texture format used by the GUI, so frames can be uploaded as-is.
#[derive(Clone)]
pub struct Image {
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Creates a `width`x`height` image with every pixel set to [`Color::NULL`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Wraps raw RGBA8 data of an image of size `res`.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> anyhow::Result<Self> {
        let expected = res.num_pixels() as usize * 4;
        anyhow::ensure!(
            buf.len() == expected,
            "{res} image needs {expected} bytes of RGBA data, got {}",
            buf.len(),
        );

        let buf = ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
            .ok_or_else(|| anyhow::anyhow!("cannot create {res} image from RGBA data"))?;
        Ok(Self { buf })
    }

    /// Decodes a JPEG image (or a single Motion JPEG frame) with the given decoder.
    pub fn decode_jpeg(data: &[u8], backend: JpegBackend) -> anyhow::Result<Self> {
        jpeg::decode(data, backend)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the rectangle covering the whole image, with its top left corner at `(0, 0)`.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Returns the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside of the image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside of the image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Borrows the part of the image covered by `rect`.
    ///
    /// The view has the size of `rect`, even if `rect` extends past the image. Pixels outside of
    /// the image read as [`Color::NULL`].
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'_> {
        ImageView {
            image: self,
            region: Region::of(self).sub(rect.into()),
        }
    }

    /// Mutably borrows the part of the image covered by `rect`.
    ///
    /// Writes to pixels outside of the image are discarded.
    pub fn view_mut(&mut self, rect: impl Into<RotatedRect>) -> ImageViewMut<'_> {
        ImageViewMut {
            region: Region::of(self).sub(rect.into()),
            image: self,
        }
    }

    /// Mirrors the image left to right.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Returns the RGBA8 pixel data in row-major order.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

/// The area of the root [`Image`] a view covers.
#[derive(Debug, Clone, Copy)]
struct Region {
    rect: RotatedRect,
}

impl Region {
    fn of(image: &Image) -> Self {
        Self {
            rect: image.rect().into(),
        }
    }

    /// Returns the region covered by `rect`, which is given relative to `self`.
    fn sub(&self, rect: RotatedRect) -> Self {
        let inner = rect.rect();
        let (cx, cy) = inner.center();
        let [cx, cy] = self.rect.transform_out(cx, cy);
        let moved = inner.move_to(cx - inner.width() / 2.0, cy - inner.height() / 2.0);

        Self {
            rect: RotatedRect::new(
                moved,
                self.rect.rotation_radians() + rect.rotation_radians(),
            ),
        }
    }

    fn width(&self) -> f32 {
        self.rect.rect().width()
    }

    fn height(&self) -> f32 {
        self.rect.rect().height()
    }

    fn local_rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width(), self.height())
    }

    /// Maps the view pixel `(x, y)` to the nearest pixel of `image`, if there is one.
    fn pixel_in(&self, image: &Image, x: u32, y: u32) -> Option<(u32, u32)> {
        let [ix, iy] = self.rect.transform_out(x as f32 + 0.5, y as f32 + 0.5);
        let (ix, iy) = ((ix - 0.5).round(), (iy - 0.5).round());

        let inside = ix >= 0.0 && iy >= 0.0 && ix < image.width() as f32 && iy < image.height() as f32;
        inside.then_some((ix as u32, iy as u32))
    }

    fn get(&self, image: &Image, x: u32, y: u32) -> Color {
        self.pixel_in(image, x, y)
            .map_or(Color::NULL, |(x, y)| image.get(x, y))
    }
}

/// A borrowed, possibly rotated, rectangular part of an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    region: Region,
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.region.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.region.height() as u32
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the view's own rectangle, with its top left corner at `(0, 0)`.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.region.local_rect()
    }

    /// Returns the color at `(x, y)`, or [`Color::NULL`] where the view leaves the image.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.region.get(self.image, x, y)
    }

    /// Creates a view of `rect`, given in the coordinates of this view.
    ///
    /// The new view is not clipped to `self`: it can see any pixel of the underlying image.
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'a> {
        ImageView {
            image: self.image,
            region: self.region.sub(rect.into()),
        }
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageView({})", self.resolution())
    }
}

/// A mutably borrowed, possibly rotated, rectangular part of an [`Image`].
pub struct ImageViewMut<'a> {
    image: &'a mut Image,
    region: Region,
}

impl<'a> ImageViewMut<'a> {
    pub fn width(&self) -> u32 {
        self.region.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.region.height() as u32
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.region.local_rect()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.region.get(self.image, x, y)
    }

    /// Sets the color at `(x, y)`. Pixels outside of the underlying image are left alone.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        if let Some((x, y)) = self.region.pixel_in(self.image, x, y) {
            self.image.set(x, y, color);
        }
    }

    /// Reborrows this view for a shorter lifetime.
    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            region: self.region,
        }
    }

    /// Creates a mutable view of `rect`, given in the coordinates of this view.
    pub fn view_mut(&mut self, rect: impl Into<RotatedRect>) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            region: self.region.sub(rect.into()),
        }
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageViewMut({})", self.resolution())
    }
}

/// An sRGB color with non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Transparent black, which is what pixels outside of an image read as.
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self::from_rgb8(0, 0, 0);
    pub const WHITE: Self = Self::from_rgb8(255, 255, 255);
    pub const RED: Self = Self::from_rgb8(255, 0, 0);
    pub const GREEN: Self = Self::from_rgb8(0, 255, 0);
    pub const BLUE: Self = Self::from_rgb8(0, 0, 255);

    /// Creates an opaque color.
    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Image data that can be read through an [`ImageView`].
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

/// Image data that can be written through an [`ImageViewMut`].
pub trait AsImageViewMut: AsImageView {
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        let rect = self.rect();
        self.view_mut(rect)
    }
}

impl AsImageView for ImageView<'_> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl AsImageView for ImageViewMut<'_> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            image: self.image,
            region: self.region,
        }
    }
}

impl AsImageViewMut for ImageViewMut<'_> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<V: AsImageView> AsImageView for &V {
    fn as_view(&self) -> ImageView<'_> {
        (*self).as_view()
    }
}

impl<V: AsImageView> AsImageView for &mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageViewMut> AsImageViewMut for &mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (*self).as_view_mut()
    }
}
