//! Drawing of landmarks, skeleton lines and gesture labels.
//!
//! Each function returns a builder that does the actual drawing when it is dropped, so callers
//! can adjust color and style in the same statement.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii, MonoFont, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use itertools::Itertools;

use crate::image::{AsImageViewMut, Color, ImageViewMut};

/// Markers are X shapes spanning `2 * MARKER_RADIUS + 1` pixels in both directions.
const MARKER_RADIUS: i32 = 2;

/// Builder returned by [`line`][line()].
pub struct DrawLine<'a> {
    image: ImageViewMut<'a>,
    start: Point,
    end: Point,
    color: Color,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        let line = Line::new(self.start, self.end)
            .into_styled(PrimitiveStyle::with_stroke(self.color, 1));
        render(&mut self.image, &line);
    }
}

/// Builder returned by [`marker`].
pub struct DrawMarker<'a> {
    image: ImageViewMut<'a>,
    center: Point,
    color: Color,
}

impl DrawMarker<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let r = MARKER_RADIUS;
        let pixels = (-r..=r)
            .flat_map(|d| [Point::new(d, d), Point::new(d, -d)])
            .map(|offset| Pixel(self.center + offset, self.color))
            .collect::<Vec<_>>();
        match Target(self.image.reborrow()).draw_iter(pixels) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }
}

/// Builder returned by [`text`].
pub struct DrawText<'a> {
    image: ImageViewMut<'a>,
    position: Point,
    text: &'a str,
    color: Color,
    font: &'static MonoFont<'static>,
    weight: u32,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Switches from the default 6x10 font to a 10x20 one.
    pub fn large(&mut self) -> &mut Self {
        self.font = &ascii::FONT_10X20;
        self
    }

    /// Makes the glyphs `width` pixels thick by drawing the text `width`² times, offset by up to
    /// `width - 1` pixels to the right and down.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        assert_ne!(width, 0, "text stroke width must be at least 1");
        self.weight = width;
        self
    }

    /// Puts the text above the anchor point instead of centering it vertically.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Starts the text at the anchor point instead of centering it horizontally.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(self.font, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        let weight = self.weight as i32;
        for (dx, dy) in (0..weight).cartesian_product(0..weight) {
            let text = Text::with_text_style(
                self.text,
                self.position + Point::new(dx, dy),
                character_style,
                text_style,
            );
            render(&mut self.image, &text);
        }
    }
}

/// Draws a blue line from `(start_x, start_y)` to `(end_x, end_y)`.
pub fn line<I: AsImageViewMut>(
    image: &mut I,
    start_x: f32,
    start_y: f32,
    end_x: f32,
    end_y: f32,
) -> DrawLine<'_> {
    DrawLine {
        image: image.as_view_mut(),
        start: to_point(start_x, start_y),
        end: to_point(end_x, end_y),
        color: Color::BLUE,
    }
}

/// Draws a small red X, 5 pixels wide, centered on `(x, y)`.
pub fn marker<I: AsImageViewMut>(image: &mut I, x: f32, y: f32) -> DrawMarker<'_> {
    DrawMarker {
        image: image.as_view_mut(),
        center: to_point(x, y),
        color: Color::RED,
    }
}

/// Draws `text` in red, centered on `(x, y)`.
pub fn text<'a, I: AsImageViewMut>(
    image: &'a mut I,
    x: f32,
    y: f32,
    text: &'a str,
) -> DrawText<'a> {
    DrawText {
        image: image.as_view_mut(),
        position: to_point(x, y),
        text,
        color: Color::RED,
        font: &ascii::FONT_6X10,
        weight: 1,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

fn to_point(x: f32, y: f32) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

fn render<D>(image: &mut ImageViewMut<'_>, drawable: &D)
where
    D: Drawable<Color = Color>,
{
    match drawable.draw(&mut Target(image.reborrow())) {
        Ok(_) => {}
        Err(never) => match never {},
    }
}

/// Adapts an [`ImageViewMut`] to `embedded-graphics`, clipping everything outside of the view.
struct Target<'a>(ImageViewMut<'a>);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.0.width(), self.0.height()))
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
    where
        I: IntoIterator<Item = Pixel<Color>>,
    {
        let (width, height) = (self.0.width(), self.0.height());
        for Pixel(Point { x, y }, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
                if x < width && y < height {
                    self.0.set(x, y, color);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Image;

    use super::*;

    fn pixels_of(image: &Image, color: Color) -> Vec<(u32, u32)> {
        (0..image.height())
            .flat_map(|y| (0..image.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| image.get(x, y) == color)
            .collect()
    }

    #[test]
    fn line_is_drawn_on_drop() {
        let mut image = Image::new(10, 10);
        {
            let mut builder = line(&mut image, 0.0, 5.0, 9.0, 5.0);
            builder.color(Color::GREEN);
        }
        let drawn = pixels_of(&image, Color::GREEN);
        assert_eq!(drawn, (0..10).map(|x| (x, 5)).collect::<Vec<_>>());
    }

    #[test]
    fn marker_is_an_x() {
        let mut image = Image::new(9, 9);
        marker(&mut image, 4.0, 4.0).color(Color::WHITE);
        let drawn = pixels_of(&image, Color::WHITE);
        assert_eq!(drawn.len(), 9);
        for (x, y) in [(2, 2), (6, 2), (4, 4), (2, 6), (6, 6)] {
            assert!(drawn.contains(&(x, y)), "({x}, {y}) missing in {drawn:?}");
        }
        assert!(!drawn.contains(&(4, 2)));
    }

    #[test]
    fn marker_is_clipped_at_image_border() {
        let mut image = Image::new(4, 4);
        marker(&mut image, 0.0, 0.0).color(Color::WHITE);
        assert_eq!(image.get(0, 0), Color::WHITE);
        assert_eq!(image.get(2, 2), Color::WHITE);
        assert_eq!(image.get(3, 3), Color::NULL);
    }

    #[test]
    fn heavier_text_has_more_pixels() {
        let mut thin = Image::new(120, 40);
        text(&mut thin, 10.0, 30.0, "Fist")
            .large()
            .align_left()
            .color(Color::GREEN);

        let mut bold = Image::new(120, 40);
        text(&mut bold, 10.0, 30.0, "Fist")
            .large()
            .align_left()
            .stroke_width(2)
            .color(Color::GREEN);

        let thin_px = pixels_of(&thin, Color::GREEN).len();
        assert!(thin_px > 0);
        assert!(pixels_of(&bold, Color::GREEN).len() > thin_px);
    }

    #[test]
    fn bottom_aligned_text_stays_above_anchor() {
        let mut image = Image::new(120, 60);
        text(&mut image, 10.0, 30.0, "OK Sign")
            .large()
            .align_left()
            .align_bottom()
            .color(Color::GREEN);
        let drawn = pixels_of(&image, Color::GREEN);
        assert!(!drawn.is_empty());
        assert!(drawn.iter().all(|&(x, y)| x >= 10 && y <= 30), "{drawn:?}");
    }
}
