pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod message_id;
pub mod store;
pub mod sweeper;
pub mod topic;
pub mod user_channel;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use store::{MessageStore, StoreError, Subscription, UserDirectory};
pub use sweeper::Sweeper;
