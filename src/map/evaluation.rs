//! Evaluation sequencing over map types and runs.
//!
//! The cursor is a plain value owned by the evaluation driver, so several
//! arenas can be evaluated side by side without sharing any counter.

use crate::config::SpawnOrientation;
use crate::map::types::{CONCRETE_MAP_TYPES, Difficulty, MapType};

/// Position inside an [`EvaluationSequence`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationCursor {
    pub map_index: usize,
    pub run: u32,
}

/// What the driver should do at a cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluationStep {
    Run { map_type: MapType, run_id: u32 },
    /// Every run of every map has been played.
    Finished,
}

/// A fixed ordering of map types, each played `runs_per_map` times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluationSequence {
    maps: Vec<MapType>,
    runs_per_map: u32,
}

impl EvaluationSequence {
    pub fn new(maps: Vec<MapType>, runs_per_map: u32) -> Self { Self { maps, runs_per_map } }

    /// All concrete layouts, easy to hard.
    pub fn standard(runs_per_map: u32) -> Self { Self::new(CONCRETE_MAP_TYPES.to_vec(), runs_per_map) }

    pub fn maps(&self) -> &[MapType] { &self.maps }

    pub fn runs_per_map(&self) -> u32 { self.runs_per_map }

    pub fn total_runs(&self) -> usize { self.maps.len() * self.runs_per_map as usize }

    pub fn start(&self) -> EvaluationCursor { EvaluationCursor::default() }

    pub fn current(&self, cursor: EvaluationCursor) -> EvaluationStep {
        match self.maps.get(cursor.map_index) {
            Some(&map_type) if cursor.run < self.runs_per_map => EvaluationStep::Run { map_type, run_id: cursor.run },
            _ => EvaluationStep::Finished,
        }
    }

    /// The cursor after the current run. Saturates at the end.
    pub fn advance(&self, cursor: EvaluationCursor) -> EvaluationCursor {
        if self.current(cursor) == EvaluationStep::Finished {
            return cursor;
        }
        if cursor.run + 1 < self.runs_per_map {
            EvaluationCursor { map_index: cursor.map_index, run: cursor.run + 1 }
        } else {
            EvaluationCursor { map_index: cursor.map_index + 1, run: 0 }
        }
    }

    /// Every run in order.
    pub fn runs(&self) -> impl Iterator<Item = (MapType, u32)> + '_ {
        let mut cursor = self.start();
        std::iter::from_fn(move || match self.current(cursor) {
            EvaluationStep::Run { map_type, run_id } => {
                cursor = self.advance(cursor);
                Some((map_type, run_id))
            }
            EvaluationStep::Finished => None,
        })
    }
}

/// Map types and spawn rotations (degrees) for `n_episodes` evaluation episodes.
///
/// Map types of the difficulty are cycled in id order; rotations are spread
/// evenly over the policy's range and truncated to whole degrees.
pub fn evaluation_schedule(
    difficulty: Difficulty,
    n_episodes: usize,
    orientation: SpawnOrientation,
) -> Vec<(MapType, f32)> {
    let tracks = MapType::all_of_difficulty(difficulty);
    let (min, max) = orientation.range_degrees();
    let width = max - min;
    (0..n_episodes)
        .map(|i| {
            let rotation = if n_episodes == 1 {
                min + width / 2.0
            } else {
                min + i as f32 * width / (n_episodes - 1) as f32
            };
            (tracks[i % tracks.len()], rotation.trunc())
        })
        .collect()
}
