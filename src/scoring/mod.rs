pub mod scorer;

pub use scorer::{compute_proximity, MatchKind, ProximityResult, ScoreSignals};
