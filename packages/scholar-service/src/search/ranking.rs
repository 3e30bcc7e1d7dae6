pub mod diversity;
pub mod hybrid;
pub mod retrieval;

pub use diversity::{DiversityDecision, DiversityPolicy, select_diverse};
pub use hybrid::{keyword_score, score_candidates};
pub use retrieval::{cmp_f32_desc, rank_normalize, vector_relevance};
