use std::fmt;

/// Size of an image, view, window or camera frame, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns the aspect ratio, or [`None`] if either dimension is zero.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A width-to-height ratio in lowest terms.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Both nonzero and coprime.
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// The 1:1 ratio of the palm detection and hand landmark network inputs.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Returns the ratio `width:height` in lowest terms, or [`None`] if either is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let divisor = gcd(width, height);
        Some(Self {
            width: width / divisor,
            height: height / divisor,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_reduced() {
        assert_eq!(gcd(6, 9), 3);
        assert_eq!(gcd(7, 0), 7);

        let hd = AspectRatio::new(1920, 1080).unwrap();
        assert_eq!(hd, AspectRatio::new(1280, 720).unwrap());
        assert_eq!(hd.to_string(), "16:9");
        assert_eq!(Resolution::new(192, 192).aspect_ratio(), Some(AspectRatio::SQUARE));
        assert_eq!(Resolution::new(0, 224).aspect_ratio(), None);
    }

    #[test]
    fn display() {
        let res = Resolution::new(640, 480);
        assert_eq!(res.to_string(), "640x480");
        assert_eq!(format!("{res:?}"), "640x480");
        assert_eq!(res.num_pixels(), 307_200);
    }
}
