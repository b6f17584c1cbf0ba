//! notebook-autostop - stops an idle SageMaker notebook instance.
//!
//! Polls the local Jupyter server for kernel and terminal activity, falls back
//! to the instance's last-modified time when no kernels exist, and stops the
//! instance once everything has been idle longer than the configured threshold.

pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod jupyter;
pub mod metadata;
pub mod policy;
pub mod runner;
pub mod sagemaker;
pub mod timestamp;
