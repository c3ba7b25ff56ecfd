// ============================================================================
// IMAGE LOADER — decode the source image off the tick thread
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use image::RgbaImage;

use crate::error::EffectError;

/// Result delivered back to the tick thread.
pub enum LoadResult {
    Loaded { image: RgbaImage, path: PathBuf },
    Failed(EffectError),
}

/// A single in-flight image load.  Dropping it disconnects the channel, so a
/// decode that finishes after teardown is discarded by the worker.
pub struct ImageLoader {
    receiver: mpsc::Receiver<LoadResult>,
}

impl ImageLoader {
    /// Start decoding `path` on a worker thread.
    pub fn spawn(path: &Path) -> Self {
        let (sender, receiver) = mpsc::channel();
        let path = path.to_path_buf();
        thread::spawn(move || {
            let result = match load_image_sync(&path) {
                Ok(image) => LoadResult::Loaded { image, path },
                Err(e) => LoadResult::Failed(e),
            };
            // Receiver gone means the effect was torn down.
            let _ = sender.send(result);
        });
        Self { receiver }
    }

    /// Non-blocking check, called once per tick.
    pub fn poll(&self) -> Option<LoadResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(LoadResult::Failed(
                EffectError::AssetLoad("loader thread exited without a result".into()),
            )),
        }
    }

    /// Block until the worker reports.  Used by the headless host.
    pub fn wait(self) -> LoadResult {
        self.receiver.recv().unwrap_or_else(|_| {
            LoadResult::Failed(EffectError::AssetLoad(
                "loader thread exited without a result".into(),
            ))
        })
    }
}

/// Open and decode an image file into RGBA8.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, EffectError> {
    let img = image::open(path)
        .map_err(|e| EffectError::AssetLoad(format!("{}: {}", path.display(), e)))?;
    let rgba = img.into_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(EffectError::AssetLoad(format!(
            "{}: image has no pixels",
            path.display()
        )));
    }
    Ok(rgba)
}

/// Width / height of a decoded image.
pub fn aspect_of(image: &RgbaImage) -> f32 {
    image.width() as f32 / image.height().max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn temp_png(name: &str, w: u32, h: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!("gridwarp_{}_{}.png", name, std::process::id()));
        let img = RgbaImage::from_pixel(w, h, image::Rgba([200, 10, 10, 255]));
        img.save(&path).expect("write temp png");
        path
    }

    fn poll_until_done(loader: &ImageLoader) -> LoadResult {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(r) = loader.poll() {
                return r;
            }
            assert!(Instant::now() < deadline, "loader never reported");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loads_png_in_background() {
        let path = temp_png("bg", 8, 4);
        let loader = ImageLoader::spawn(&path);
        match poll_until_done(&loader) {
            LoadResult::Loaded { image, .. } => {
                assert_eq!(image.dimensions(), (8, 4));
                assert_eq!(aspect_of(&image), 2.0);
            }
            LoadResult::Failed(e) => panic!("unexpected failure: {}", e),
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_asset_failure() {
        let loader = ImageLoader::spawn(Path::new("/definitely/not/here.png"));
        match loader.wait() {
            LoadResult::Failed(EffectError::AssetLoad(_)) => {}
            LoadResult::Failed(e) => panic!("wrong error kind: {}", e),
            LoadResult::Loaded { .. } => panic!("loaded a missing file"),
        }
    }

    #[test]
    fn sync_load_reports_path() {
        let err = load_image_sync(Path::new("nowhere.png")).unwrap_err();
        assert!(err.to_string().contains("nowhere.png"));
    }
}
