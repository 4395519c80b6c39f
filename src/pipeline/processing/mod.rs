// Row processing: value normalization, slot pivoting, and row building

pub mod normalize;
pub mod pivot;
pub mod row_builder;
