pub mod alert;
pub mod counterparty;
pub mod dispatch;
pub mod history;
pub mod job;
pub mod ops_alert;
pub mod run;
pub mod score;
pub mod shared;
