//! 内部通信协议类型定义
//!
//! 此模块定义了面板和代理引擎之间通信的共享类型，
//! 包括 ProxyEngine trait 以及流量增量结构体。

pub mod engine;
pub mod traffic;
