use handsign::{
    config::Settings,
    gesture::{self, Gesture},
    gui,
    hand::{
        detection::{PalmDetectionNetwork, PalmDetector},
        landmark::{LandmarkNetwork, Landmarker},
        tracking::HandTracker,
        HandLandmarks,
    },
    image::{draw, AsImageViewMut, Color},
    timer::FpsCounter,
    webcam::Webcam,
};

const WINDOW_TITLE: &str = "Gesture Recognition";

/// Position of the first hand's gesture label.
const LABEL_ORIGIN: (f32, f32) = (10.0, 30.0);

/// Vertical distance between the labels of consecutive hands.
const LABEL_LINE_HEIGHT: f32 = 30.0;

const LABEL_COLOR: Color = Color::from_rgb8(0, 255, 0);

fn main() {
    handsign::init_logger!();
    handsign::run(app)
}

fn app() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    log::debug!("{settings:?}");

    let mut tracker = load_tracker(&settings)?;
    let mut webcam = Webcam::open(settings.webcam_options())?;
    let mut fps = FpsCounter::new("gesture recognition");

    loop {
        let mut image = match webcam.read() {
            Ok(image) => image,
            Err(e) => {
                log::error!("failed to read webcam frame: {e:#}");
                break;
            }
        };
        image.flip_horizontal_in_place();

        tracker.track(&image)?;

        let resolution = image.resolution();
        let mut gestures = Vec::with_capacity(tracker.hand_count());
        for hand in tracker.hands() {
            let result = hand.landmark_result();
            result.draw(&mut image);

            let landmarks = HandLandmarks::from_pixels(result.landmarks(), resolution)?;
            gestures.push(gesture::classify(&landmarks));
        }
        draw_labels(&mut image, &gestures);

        gui::show_image(WINDOW_TITLE, &image);
        fps.tick_with(webcam.timers().chain(tracker.timers()));

        if gui::quit_requested() {
            log::info!("quitting");
            break;
        }
    }

    Ok(())
}

fn load_tracker(settings: &Settings) -> anyhow::Result<HandTracker> {
    let dir = settings.model_dir();
    let (palm, landmarks) = if settings.lite_models() {
        (PalmDetectionNetwork::lite(dir)?, LandmarkNetwork::lite(dir)?)
    } else {
        (PalmDetectionNetwork::full(dir)?, LandmarkNetwork::full(dir)?)
    };

    Ok(HandTracker::new(
        PalmDetector::new(palm),
        Landmarker::new(landmarks),
    ))
}

/// Draws the label of every recognized gesture, one line per hand.
///
/// Hands without a recognized gesture get no text, but still occupy their line.
fn draw_labels<I: AsImageViewMut>(image: &mut I, gestures: &[Option<Gesture>]) {
    let (x, y) = LABEL_ORIGIN;
    for (line, gesture) in gestures.iter().enumerate() {
        let Some(gesture) = gesture else { continue };
        draw::text(
            image,
            x,
            y + line as f32 * LABEL_LINE_HEIGHT,
            gesture.label(),
        )
        .large()
        .stroke_width(2)
        .align_left()
        .align_bottom()
        .color(LABEL_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use handsign::image::Image;

    use super::*;

    fn green_rows(image: &Image) -> Vec<u32> {
        (0..image.height())
            .filter(|&y| (0..image.width()).any(|x| image.get(x, y) == LABEL_COLOR))
            .collect()
    }

    #[test]
    fn no_label_without_gesture() {
        let mut image = Image::new(320, 120);
        draw_labels(&mut image, &[None, None]);
        assert!(green_rows(&image).is_empty());
    }

    #[test]
    fn one_line_per_hand() {
        let mut image = Image::new(320, 120);
        draw_labels(&mut image, &[Some(Gesture::Fist)]);
        let rows = green_rows(&image);
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|&y| y <= 32), "{rows:?}");

        let mut image = Image::new(320, 120);
        draw_labels(&mut image, &[None, Some(Gesture::OpenPalm)]);
        let rows = green_rows(&image);
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|&y| y > 32 && y <= 62), "{rows:?}");
    }
}
