//! 面板与代理引擎之间共享的类型
//!
//! `protocol` 模块定义了流量增量、快照以及引擎控制接口，
//! 面板端（xpanel）和引擎侧代理都依赖这些定义。

pub mod protocol;

pub use protocol::engine::ProxyEngine;
pub use protocol::traffic::{ClientTraffic, InboundTraffic, TrafficSnapshot};
