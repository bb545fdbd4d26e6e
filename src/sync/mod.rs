//! Client-side real-time synchronization core
//!
//! Three cooperating pieces: [`session::SessionWatcher`] observes the auth
//! collaborator's session state, [`view::LiveCollectionView`] keeps a
//! locally materialized copy of a live query current, and
//! [`sweeper::RetentionSweeper`] periodically wipes the world-chat
//! collection.

pub mod session;
pub mod sweeper;
pub mod view;

pub use session::{SessionState, SessionWatcher};
pub use sweeper::RetentionSweeper;
pub use view::{LiveCollectionView, ViewHandle};
