//! Twitter ステータスストリームを取り込み、Kafka トピックへ発行するサービス。

pub mod adapter;
pub mod domain;
pub mod infrastructure;
pub mod usecase;
