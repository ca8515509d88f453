pub mod api;
pub mod db;
pub mod error;
pub mod infer;
pub mod model;
pub mod ops;
pub mod output;
pub mod skills;
pub mod tree;
pub mod validate;
