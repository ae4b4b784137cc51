// ドメイン層
// 外部I/Oに依存しないモデルとビジネスルール

pub mod error;
pub mod event;
pub mod model;
pub mod port;
pub mod service;
