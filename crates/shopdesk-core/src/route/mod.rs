//! Navigation: the route table, the pre-navigation guard and the router.

mod guard;
mod router;
mod table;

pub use guard::{Navigation, RouteGuard};
pub use router::{Navigator, Router};
pub use table::{ENTRY_ROUTE, NOT_FOUND_ROUTE, Route, RouteTable};
