pub mod config;
pub mod logging;

pub mod auth;
pub mod batch;
pub mod control;
pub mod error;
pub mod fetcher;
pub mod postproc;
pub mod probe;
pub mod resolver;
pub mod retry;
pub mod segmenter;
pub mod sink;
pub mod storage;
pub mod tool;
