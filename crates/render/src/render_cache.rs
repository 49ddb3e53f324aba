//! Decoded image cache
//!
//! Images are decoded once per path and kept as premultiplied BGRA bytes
//! (Cairo's ARGB32 layout on little-endian hosts). A Cairo surface is built
//! from the cached bytes on each use, since surfaces cannot leave the
//! thread that renders the frame.
//!
//! A path may also name an animated GIF or a directory of images; both
//! decode into a multi-frame [`ImageSequence`].

use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// GIF frames without a delay are shown this long
const DEFAULT_GIF_DELAY_MS: u64 = 100;
/// Shortest GIF frame delay honoured (about 15 fps)
const MIN_GIF_DELAY_MS: u64 = 67;
/// Extensions picked up from image directories
const COLLECTION_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Decoded image in Cairo ARGB32 layout
#[derive(Debug)]
pub struct DecodedImage {
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub data: Vec<u8>,
}

impl DecodedImage {
    /// Convert straight RGBA8 pixels into premultiplied native-endian ARGB32
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Option<Self> {
        let stride = cairo::Format::ARgb32.stride_for_width(width).ok()?;
        let (w, h) = (i32::try_from(width).ok()?, i32::try_from(height).ok()?);
        let mut data = vec![0u8; stride as usize * height as usize];

        for (y, row) in rgba.chunks_exact(width as usize * 4).enumerate() {
            let out_row = &mut data[y * stride as usize..];
            for (x, px) in row.chunks_exact(4).enumerate() {
                let [r, g, b, a] = [px[0], px[1], px[2], px[3]];
                let premul = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u32;
                let argb = (a as u32) << 24 | premul(r) << 16 | premul(g) << 8 | premul(b);
                out_row[x * 4..x * 4 + 4].copy_from_slice(&argb.to_ne_bytes());
            }
        }

        Some(Self {
            width: w,
            height: h,
            stride,
            data,
        })
    }

    fn from_rgba_image(rgba: &image::RgbaImage) -> Result<Self, String> {
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.as_raw())
            .ok_or_else(|| format!("unsupported image size {}x{}", width, height))
    }

    /// Fresh Cairo surface holding a copy of the pixels
    pub fn to_surface(&self) -> Result<cairo::ImageSurface, cairo::Error> {
        cairo::ImageSurface::create_for_data(
            self.data.clone(),
            cairo::Format::ARgb32,
            self.width,
            self.height,
            self.stride,
        )
    }
}

#[derive(Debug)]
struct SequenceFrame {
    image: DecodedImage,
    /// Own display time (GIF); `None` uses the caller's frame duration
    delay: Option<Duration>,
}

/// One or more decoded frames; never empty
#[derive(Debug)]
pub struct ImageSequence {
    frames: Vec<SequenceFrame>,
}

impl ImageSequence {
    fn still(image: DecodedImage) -> Self {
        Self {
            frames: vec![SequenceFrame { image, delay: None }],
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Frame shown at `clock_ms` on a timeline that loops over the whole
    /// sequence, plus the time left until the next frame (`None` for stills)
    pub fn frame_at(
        &self,
        clock_ms: u64,
        fallback: Duration,
    ) -> Option<(&DecodedImage, Option<Duration>)> {
        if !self.is_animated() {
            return self.frames.first().map(|f| (&f.image, None));
        }

        let delay_ms = |f: &SequenceFrame| (f.delay.unwrap_or(fallback).as_millis() as u64).max(1);
        let total: u64 = self.frames.iter().map(delay_ms).sum();
        let mut position = clock_ms % total;
        for frame in &self.frames {
            let delay = delay_ms(frame);
            if position < delay {
                return Some((&frame.image, Some(Duration::from_millis(delay - position))));
            }
            position -= delay;
        }
        self.frames.last().map(|f| (&f.image, None))
    }
}

/// Picks animation frames for one render and remembers when the earliest
/// visible animation changes next
#[derive(Debug, Clone, Copy)]
pub struct Playback {
    clock_ms: u64,
    next_change: Option<Duration>,
}

impl Playback {
    pub fn new(clock_ms: u64) -> Self {
        Self {
            clock_ms,
            next_change: None,
        }
    }

    pub fn pick<'a>(
        &mut self,
        sequence: &'a ImageSequence,
        fallback: Duration,
    ) -> Option<&'a DecodedImage> {
        let (image, remaining) = sequence.frame_at(self.clock_ms, fallback)?;
        if let Some(remaining) = remaining {
            self.next_change = Some(self.next_change.map_or(remaining, |d| d.min(remaining)));
        }
        Some(image)
    }

    pub fn next_change(&self) -> Option<Duration> {
        self.next_change
    }
}

/// Cache for decoded images keyed by file path
#[derive(Default)]
pub struct ImageCache {
    images: HashMap<PathBuf, Arc<ImageSequence>>,
    /// Paths that failed to load; logged once, retried after `clear`
    failed: HashSet<PathBuf>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or decode the image, GIF or image directory at `path`
    pub fn get(&mut self, path: &Path) -> Option<Arc<ImageSequence>> {
        if let Some(images) = self.images.get(path) {
            return Some(Arc::clone(images));
        }
        if self.failed.contains(path) {
            return None;
        }

        match Self::decode(path) {
            Ok(images) => {
                log::debug!("Decoded {} ({} frames)", path.display(), images.len());
                let images = Arc::new(images);
                self.images.insert(path.to_path_buf(), Arc::clone(&images));
                Some(images)
            }
            Err(e) => {
                log::warn!("Failed to load image {}: {}", path.display(), e);
                self.failed.insert(path.to_path_buf());
                None
            }
        }
    }

    fn decode(path: &Path) -> Result<ImageSequence, String> {
        if path.is_dir() {
            return Self::decode_directory(path);
        }
        let is_gif = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));
        if is_gif {
            return Self::decode_gif(path);
        }
        Self::decode_still(path).map(ImageSequence::still)
    }

    fn decode_still(path: &Path) -> Result<DecodedImage, String> {
        let img = image::open(path).map_err(|e| e.to_string())?;
        DecodedImage::from_rgba_image(&img.to_rgba8())
    }

    fn decode_gif(path: &Path) -> Result<ImageSequence, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| e.to_string())?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| e.to_string())?;

        let mut decoded = Vec::with_capacity(frames.len());
        for frame in frames {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay_ms = match (numer as u64).checked_div(denom.max(1) as u64) {
                Some(0) | None => DEFAULT_GIF_DELAY_MS,
                Some(ms) => ms.max(MIN_GIF_DELAY_MS),
            };
            decoded.push(SequenceFrame {
                image: DecodedImage::from_rgba_image(frame.buffer())?,
                delay: Some(Duration::from_millis(delay_ms)),
            });
        }
        if decoded.is_empty() {
            return Err("GIF has no frames".to_string());
        }
        if decoded.len() == 1 {
            decoded[0].delay = None;
        }
        Ok(ImageSequence { frames: decoded })
    }

    fn decode_directory(dir: &Path) -> Result<ImageSequence, String> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| e.to_string())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        COLLECTION_EXTENSIONS
                            .iter()
                            .any(|known| ext.eq_ignore_ascii_case(known))
                    })
            })
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            match Self::decode_still(path) {
                Ok(image) => frames.push(SequenceFrame { image, delay: None }),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        if frames.is_empty() {
            return Err("no images in directory".to_string());
        }
        Ok(ImageSequence { frames })
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.failed.clear();
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Rgba, RgbaImage};

    fn first_pixel(image: &DecodedImage) -> u32 {
        u32::from_ne_bytes(image.data[0..4].try_into().unwrap())
    }

    #[test]
    fn test_premultiplies_alpha() {
        let image = DecodedImage::from_rgba(2, 1, &[255, 0, 0, 255, 255, 255, 255, 128]).unwrap();
        let px = |i: usize| u32::from_ne_bytes(image.data[i * 4..i * 4 + 4].try_into().unwrap());
        assert_eq!(px(0), 0xFFFF0000);
        assert_eq!(px(1), 0x80808080);
    }

    #[test]
    fn test_missing_file_is_remembered() {
        let mut cache = ImageCache::new();
        let path = Path::new("/nonexistent/lcd-sens/background.png");
        assert!(cache.get(path).is_none());
        assert!(cache.failed.contains(path));
        assert!(cache.get(path).is_none());
        assert!(cache.is_empty());

        cache.clear();
        assert!(cache.failed.is_empty());
    }

    #[test]
    fn test_gif_frames_follow_their_delays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spin.gif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = GifEncoder::new(file);
            let red = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
            let blue = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
            encoder
                .encode_frames(vec![
                    image::Frame::from_parts(red, 0, 0, Delay::from_numer_denom_ms(100, 1)),
                    image::Frame::from_parts(blue, 0, 0, Delay::from_numer_denom_ms(200, 1)),
                ])
                .unwrap();
        }

        let mut cache = ImageCache::new();
        let gif = cache.get(&path).unwrap();
        assert_eq!(gif.len(), 2);
        assert!(gif.is_animated());

        let fallback = Duration::from_secs(1);
        let (image, remaining) = gif.frame_at(40, fallback).unwrap();
        assert_eq!(first_pixel(image) & 0x00FF_FFFF, 0xFF0000);
        assert_eq!(remaining, Some(Duration::from_millis(60)));

        let (image, remaining) = gif.frame_at(150, fallback).unwrap();
        assert_eq!(first_pixel(image) & 0x00FF_FFFF, 0x0000FF);
        assert_eq!(remaining, Some(Duration::from_millis(150)));

        // Loops after 300 ms
        let (image, _) = gif.frame_at(310, fallback).unwrap();
        assert_eq!(first_pixel(image) & 0x00FF_FFFF, 0xFF0000);
    }

    #[test]
    fn test_directory_is_shown_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut cache = ImageCache::new();
        let frames = cache.get(dir.path()).unwrap();
        assert_eq!(frames.len(), 2);

        let mut playback = Playback::new(1500);
        let image = playback.pick(&frames, Duration::from_secs(1)).unwrap();
        assert_eq!(first_pixel(image), 0xFF00FF00);
        assert_eq!(playback.next_change(), Some(Duration::from_millis(500)));

        let (image, _) = frames.frame_at(0, Duration::from_secs(1)).unwrap();
        assert_eq!(first_pixel(image), 0xFFFF0000);
    }

    #[test]
    fn test_still_image_never_schedules_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        RgbaImage::from_pixel(3, 1, Rgba([1, 2, 3, 255])).save(&path).unwrap();

        let mut cache = ImageCache::new();
        let still = cache.get(&path).unwrap();
        let mut playback = Playback::new(123_456);
        assert!(playback.pick(&still, Duration::from_millis(10)).is_some());
        assert_eq!(playback.next_change(), None);
        assert_eq!(cache.len(), 1);
    }
}
