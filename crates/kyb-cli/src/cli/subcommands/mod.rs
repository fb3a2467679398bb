mod alert;
mod ops_alert;

pub use alert::AlertCommands;
pub use ops_alert::OpsAlertCommands;
