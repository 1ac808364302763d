//! Store engine
//!
//! - [`validation`] - filesystem escaping of folder segments and file names
//! - [`element`] - the named-field tree records are stored as, and its codec
//! - [`folder`] / [`manifest`] - one folder in memory and on disk
//! - [`cache`] - the write-back [`DiskCache`](cache::DiskCache)
//! - [`hierarchy`] - folder keys and tree listing
//! - [`accessor`] - cursor over a folder's records
//! - [`record`] - catalog stars, magnitude records, image information
//! - [`manager`] - per-domain managers
//! - [`batch`], [`observer`] - run state, cancellation, progress reports
//! - [`reader`], [`identify`] - cross-catalog identification

pub mod accessor;
pub mod batch;
pub mod cache;
pub mod element;
pub mod folder;
pub mod geom;
pub mod hierarchy;
pub mod identify;
pub mod manager;
pub mod manifest;
pub mod observer;
pub mod reader;
pub mod record;
pub mod validation;
