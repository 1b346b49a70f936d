pub use matrix::{
    MatrixData, MatrixMetric, MatrixResponse, MatrixResult, PromSample,
};

mod matrix;
