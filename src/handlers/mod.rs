//! HTTP 处理器

pub mod cluster;
pub mod group;
pub mod health;
pub mod permission;
