// Result persistence: session-keyed results, display images, flashes and their expiry

pub mod cleanup;
pub mod clock;
pub mod flash;
pub mod image_store;
pub mod result_images;
pub mod result_store;

pub use cleanup::{CleanupTask, RetentionSweeper, SweepReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use flash::FlashStore;
pub use image_store::{DiskImageStorage, ImageStorage, MemoryImageStorage, StoredImage};
pub use result_images::ResultImages;
pub use result_store::{MemoryResultStore, ResultStore};
