pub mod frequency_map;
pub mod max_row;
pub mod trimmed_average;
