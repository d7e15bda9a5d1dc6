pub mod channel;
pub mod dispatcher;
pub mod notification_store;
pub mod preferences;
pub mod templates;
pub mod worker;

pub use channel::{ChannelSender, LoggingChannelSender};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use notification_store::{InMemoryNotificationStore, NotificationStore};
pub use preferences::{InMemoryPreferenceStore, PreferenceStore};
pub use templates::{map_event, Mapped};
pub use worker::{Disposition, NotificationWorker};
