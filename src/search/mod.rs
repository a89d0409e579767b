pub mod executor;
pub mod fuzzy;
pub mod results;

pub use executor::{
    execute, FieldSpec, ScoreExplanation, SearchHit, SearchRequest, SearchResponse, SortDirection, SortField,
};
