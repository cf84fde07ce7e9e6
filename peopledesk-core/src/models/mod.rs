mod checklist;
mod maintenance;
mod progress;
mod survey;
mod user;

pub use checklist::*;
pub use maintenance::*;
pub use progress::*;
pub use survey::*;
pub use user::*;
