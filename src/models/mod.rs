//! 数据模型模块
//! 用户与认证、联系表单与服务咨询、静态服务目录

pub mod auth;
pub mod catalog;
pub mod lead;
pub mod user;
