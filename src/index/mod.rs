pub mod geo;
pub mod inverted;
pub mod numeric;
pub mod posting;
pub mod typo_dict;

pub use geo::{haversine_km, GeoPointIndex, GeoPolygonIndex};
pub use inverted::{InvertedIndex, Term};
pub use numeric::NumericIndex;
pub use posting::{Posting, PostingList};
pub use typo_dict::{InfixMode, TypoDictionary};
