pub mod rng;
pub mod render;
pub mod render2d;

pub use rng::{RngStream, SeedSequence, map_rng, rng_from_seed, run_id_base, RUN_IDS_PER_INSTANCE};
pub use render::{encode_png, save_png};
pub use render2d::{Canvas, Color, BLACK, BLUE, FLOOR, GRAY, GREEN, RED, WHITE, YELLOW};
