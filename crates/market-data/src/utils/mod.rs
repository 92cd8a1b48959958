pub mod duration_serde;
