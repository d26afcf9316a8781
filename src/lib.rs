//! xpanel：代理面板的流量统计与客户端生命周期核心

pub mod api;
pub mod broadcast;
pub mod config;
pub mod config_manager;
pub mod engine_client;
pub mod entity;
pub mod error;
pub mod job;
pub mod migration;
pub mod notifier;
pub mod online;
pub mod reset_schedule;
pub mod store;

#[cfg(test)]
mod testing;
