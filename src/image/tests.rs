use std::f32::consts::{FRAC_PI_2, PI};

use super::*;
use Color as C;

fn image_from_rows<const W: usize, const H: usize>(rows: [[Color; W]; H]) -> Image {
    let data = rows
        .iter()
        .flatten()
        .flat_map(|color| color.0)
        .collect::<Vec<_>>();
    Image::from_rgba8(Resolution::new(W as u32, H as u32), &data).unwrap()
}

#[test]
fn nested_regions() {
    let image = image_from_rows([
        [C::BLUE, C::WHITE, C::WHITE],
        [C::WHITE, C::RED, C::WHITE],
        [C::WHITE, C::WHITE, C::WHITE],
    ]);

    let full = Region::of(&image);
    assert_eq!(full.local_rect(), Rect::from_top_left(0.0, 0.0, 3.0, 3.0));

    let center = full.sub(Rect::from_top_left(1.0, 1.0, 1.0, 1.0).into());
    assert_eq!(center.local_rect(), Rect::from_top_left(0.0, 0.0, 1.0, 1.0));
    assert_eq!(center.rect, Rect::from_top_left(1.0, 1.0, 1.0, 1.0).into());
    assert_eq!(center.get(&image, 0, 0), C::RED);

    // Subregions may extend past their parent region.
    let top_left = center.sub(Rect::from_top_left(-1.0, -1.0, 2.0, 2.0).into());
    assert_eq!(top_left.rect, Rect::from_top_left(0.0, 0.0, 2.0, 2.0).into());
    assert_eq!(top_left.get(&image, 0, 0), C::BLUE);

    let corner = full
        .sub(Rect::from_top_left(1.0, 1.0, 2.0, 2.0).into())
        .sub(Rect::from_top_left(1.0, 1.0, 2.0, 2.0).into());
    assert_eq!(corner.rect, Rect::from_top_left(2.0, 2.0, 2.0, 2.0).into());
    assert_eq!(corner.get(&image, 0, 0), C::WHITE);
    assert_eq!(corner.get(&image, 1, 1), C::NULL);
}

#[test]
fn rotated_views() {
    let image = image_from_rows([[C::BLUE, C::WHITE], [C::GREEN, C::RED]]);
    let square = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);

    let upright = image.view(RotatedRect::new(square, 0.0));
    assert_eq!(upright.get(0, 0), C::BLUE);
    assert_eq!(upright.get(1, 0), C::WHITE);
    assert_eq!(upright.get(0, 1), C::GREEN);
    assert_eq!(upright.get(1, 1), C::RED);

    let upside_down = image.view(RotatedRect::new(square, PI));
    assert_eq!(upside_down.get(0, 0), C::RED);
    assert_eq!(upside_down.get(1, 1), C::BLUE);

    let quarter = image.view(RotatedRect::new(square, FRAC_PI_2));
    assert_eq!(quarter.get(0, 0), C::WHITE);
    assert_eq!(quarter.get(1, 0), C::RED);
    assert_eq!(quarter.get(0, 1), C::BLUE);
    assert_eq!(quarter.get(1, 1), C::GREEN);

    // Rotations of nested views add up.
    let half = quarter.view(RotatedRect::new(square, FRAC_PI_2));
    assert_eq!(half.get(0, 0), C::RED);
    assert_eq!(half.get(1, 1), C::BLUE);

    let shifted = quarter.view(RotatedRect::new(Rect::from_top_left(-1.0, 1.0, 2.0, 2.0), 0.0));
    assert_eq!(shifted.get(0, 0), C::NULL);
    assert_eq!(shifted.get(1, 0), C::BLUE);
}

#[test]
fn views_past_the_edge() {
    let image = image_from_rows([[C::RED, C::GREEN]]);

    let view = image.view(Rect::from_top_left(1.0, 0.0, 1.0, 1.0));
    assert_eq!(view.resolution(), Resolution::new(1, 1));
    assert_eq!(view.get(0, 0), C::GREEN);

    let view = image.view(Rect::from_top_left(1.0, 0.0, 99.0, 100.0));
    assert_eq!(view.resolution(), Resolution::new(99, 100));
    assert_eq!(view.get(0, 0), C::GREEN);
    assert_eq!(view.get(0, 1), C::NULL);
    assert_eq!(view.get(1, 0), C::NULL);
}

#[test]
fn writes_past_the_edge_are_discarded() {
    let mut image = image_from_rows([[C::RED, C::GREEN]]);

    let mut view = image.view_mut(Rect::from_top_left(1.0, 0.0, 2.0, 2.0));
    view.set(0, 0, C::BLUE);
    view.set(1, 0, C::BLUE);
    view.set(1, 1, C::BLUE);

    assert_eq!(image.get(0, 0), C::RED);
    assert_eq!(image.get(1, 0), C::BLUE);
}

#[test]
fn mirror() {
    let mut image = image_from_rows([[C::RED, C::GREEN, C::BLUE], [C::WHITE, C::BLACK, C::NULL]]);
    image.flip_horizontal_in_place();
    assert_eq!(image.get(0, 0), C::BLUE);
    assert_eq!(image.get(1, 0), C::GREEN);
    assert_eq!(image.get(2, 0), C::RED);
    assert_eq!(image.get(0, 1), C::NULL);
    assert_eq!(image.get(2, 1), C::WHITE);
}

#[test]
fn rgba_data_size_is_checked() {
    assert!(Image::from_rgba8(Resolution::new(2, 2), &[0; 15]).is_err());
    let image = Image::from_rgba8(Resolution::new(2, 2), &[7; 16]).unwrap();
    assert_eq!(image.data(), &[7; 16]);
    assert_eq!(Image::new(3, 2).get(2, 1), C::NULL);
}
