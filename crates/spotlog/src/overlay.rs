//! Ghost overlay for aligning a new photo with the previous one.
//!
//! The ghost is the most recent photo of a spot, drawn over the live frame at
//! a fixed opacity. It is advisory: any failure to find or read it yields no
//! ghost and never blocks capture.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::image_store::ImageStore;
use crate::model::{latest_entry, LogEntry, Spot};

/// Opacity the ghost is drawn at. Not configurable.
pub const GHOST_OPACITY: f32 = 0.4;

/// Anything that can list a spot's entries.
pub trait EntrySource {
    /// All entries recorded for the spot, in any order.
    ///
    /// # Errors
    ///
    /// Returns an error if the entries cannot be read.
    fn entries_for_spot(&self, spot_id: &Uuid) -> Result<Vec<LogEntry>>;
}

impl EntrySource for [LogEntry] {
    fn entries_for_spot(&self, spot_id: &Uuid) -> Result<Vec<LogEntry>> {
        Ok(self
            .iter()
            .filter(|entry| entry.spot_id == *spot_id)
            .cloned()
            .collect())
    }
}

impl EntrySource for Vec<LogEntry> {
    fn entries_for_spot(&self, spot_id: &Uuid) -> Result<Vec<LogEntry>> {
        self.as_slice().entries_for_spot(spot_id)
    }
}

/// A loaded guide image.
#[derive(Debug, Clone)]
pub struct Ghost {
    /// Entry the photo belongs to.
    pub entry_id: Uuid,
    /// Photo filename in the store.
    pub filename: String,
    /// Decoded photo.
    pub image: DynamicImage,
}

/// Load the ghost for `spot`, or `None` when there is nothing usable.
pub async fn load_ghost<S>(source: &S, store: &ImageStore, spot: &Spot) -> Option<Ghost>
where
    S: EntrySource + ?Sized,
{
    let entries = match source.entries_for_spot(&spot.id) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list entries for spot {}: {}", spot.id, e);
            return None;
        }
    };
    ghost_from_entries(store, &entries).await
}

/// Load the ghost from an already fetched list of entries.
pub async fn ghost_from_entries(store: &ImageStore, entries: &[LogEntry]) -> Option<Ghost> {
    let latest = latest_entry(entries)?;
    if !latest.has_photo() {
        debug!("Latest entry {} has no photo", latest.id);
        return None;
    }

    match store.load_image(&latest.image_filename).await {
        Ok(image) => Some(Ghost {
            entry_id: latest.id,
            filename: latest.image_filename.clone(),
            image,
        }),
        Err(e) => {
            warn!("Ghost photo {} unavailable: {}", latest.image_filename, e);
            None
        }
    }
}

/// Blend `ghost` over `live` at [`GHOST_OPACITY`].
///
/// The ghost is resized to the live frame. The live frame's alpha channel is
/// kept so the result can stand in for it in the preview.
#[must_use]
pub fn composite(live: &RgbaImage, ghost: &DynamicImage) -> RgbaImage {
    let (width, height) = live.dimensions();
    let ghost = if ghost.width() == width && ghost.height() == height {
        ghost.to_rgba8()
    } else {
        imageops::resize(&ghost.to_rgba8(), width, height, FilterType::Triangle)
    };

    let mut out = live.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let Rgba([gr, gg, gb, _]) = *ghost.get_pixel(x, y);
        let Rgba([lr, lg, lb, la]) = *pixel;
        *pixel = Rgba([blend(lr, gr), blend(lg, gg), blend(lb, gb), la]);
    }
    out
}

// Clamped to 0..=255 before the cast.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(live: u8, ghost: u8) -> u8 {
    let mixed = f32::from(live).mul_add(1.0 - GHOST_OPACITY, f32::from(ghost) * GHOST_OPACITY);
    mixed.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_store::tests::png_bytes;
    use crate::model::{EntryForm, UserProfile};
    use chrono::{Duration, Utc};
    use image::GenericImageView;
    use tempfile::TempDir;

    fn spot() -> Spot {
        Spot::new(&UserProfile::new("Alex", "Me"), "Left Arm Mole", "Left arm")
    }

    fn create_test_store() -> (TempDir, ImageStore) {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_no_entries_no_ghost() {
        let (_dir, store) = create_test_store();
        let entries: Vec<LogEntry> = Vec::new();
        assert!(load_ghost(&entries, &store, &spot()).await.is_none());
    }

    #[tokio::test]
    async fn test_only_entry_without_photo_no_ghost() {
        let (_dir, store) = create_test_store();
        let spot = spot();
        let entries = vec![LogEntry::new(&spot, "", EntryForm::default())];
        assert!(load_ghost(&entries, &store, &spot).await.is_none());
    }

    #[tokio::test]
    async fn test_newest_photo_wins() {
        let (_dir, store) = create_test_store();
        let spot = spot();
        store.save(&png_bytes(10, 10), "t1.png").await.unwrap();
        store.save(&png_bytes(20, 12), "t2.png").await.unwrap();

        let t2 = Utc::now();
        let t1 = t2 - Duration::days(7);
        let newer = LogEntry::at(&spot, "t2.png", EntryForm::default(), t2);
        let entries = vec![
            newer.clone(),
            LogEntry::at(&spot, "t1.png", EntryForm::default(), t1),
        ];

        let ghost = load_ghost(&entries, &store, &spot).await.unwrap();
        assert_eq!(ghost.entry_id, newer.id);
        assert_eq!(ghost.filename, "t2.png");
        assert_eq!(ghost.image.dimensions(), (20, 12));
    }

    #[tokio::test]
    async fn test_newest_without_photo_hides_older_photo() {
        let (_dir, store) = create_test_store();
        let spot = spot();
        store.save(&png_bytes(10, 10), "old.png").await.unwrap();

        let t2 = Utc::now();
        let entries = vec![
            LogEntry::at(&spot, "old.png", EntryForm::default(), t2 - Duration::hours(1)),
            LogEntry::at(&spot, "", EntryForm::default(), t2),
        ];
        assert!(load_ghost(&entries, &store, &spot).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_tolerated() {
        let (_dir, store) = create_test_store();
        let spot = spot();
        let entries = vec![LogEntry::new(&spot, "gone.png", EntryForm::default())];
        assert!(load_ghost(&entries, &store, &spot).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupted_file_tolerated() {
        let (dir, store) = create_test_store();
        let spot = spot();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let entries = vec![LogEntry::new(&spot, "bad.png", EntryForm::default())];
        assert!(load_ghost(&entries, &store, &spot).await.is_none());
    }

    #[tokio::test]
    async fn test_other_spots_ignored() {
        let (_dir, store) = create_test_store();
        let spot = spot();
        let other = Spot::new(&UserProfile::new("Sam", "Son"), "Rash", "Neck");
        store.save(&png_bytes(4, 4), "other.png").await.unwrap();
        let entries = vec![LogEntry::new(&other, "other.png", EntryForm::default())];
        assert!(load_ghost(&entries, &store, &spot).await.is_none());
    }

    #[test]
    fn test_composite_blends_at_fixed_opacity() {
        let live = RgbaImage::from_pixel(4, 4, Rgba([100, 0, 200, 255]));
        let ghost = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 250, 0, 255])));
        let out = composite(&live, &ghost);
        // 100*0.6 + 200*0.4 = 140; 0*0.6 + 250*0.4 = 100; 200*0.6 + 0 = 120
        assert_eq!(*out.get_pixel(0, 0), Rgba([140, 100, 120, 255]));
    }

    #[test]
    fn test_composite_resizes_ghost_and_keeps_live_alpha() {
        let live = RgbaImage::from_pixel(8, 6, Rgba([0, 0, 0, 77]));
        let ghost = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 255])));
        let out = composite(&live, &ghost);
        assert_eq!(out.dimensions(), (8, 6));
        assert!(out.pixels().all(|p| p.0[3] == 77));
        assert_eq!(out.get_pixel(4, 3).0[0], 102);
    }

    #[test]
    fn test_composite_does_not_modify_live() {
        let live = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let ghost = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([250, 250, 250, 255])));
        let _ = composite(&live, &ghost);
        assert_eq!(*live.get_pixel(1, 1), Rgba([10, 20, 30, 255]));
    }
}
