pub mod activation;
pub mod backend;
pub mod config;
pub mod data;
pub mod dtype;
pub mod error;
pub mod evaluate;
pub mod loss;
pub mod model;
pub mod net;
pub mod optimizer;
pub mod predictor;
pub mod preprocess;
pub mod record;
pub mod scoring;
pub mod store;
pub mod tensor;
pub mod train;
pub mod util;

pub use error::{Error, Result};

extern crate matrixmultiply;
extern crate num_traits;
extern crate rand;
extern crate rand_distr;
extern crate serde;
extern crate serde_json;
