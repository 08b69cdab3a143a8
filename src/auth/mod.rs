//! Browser session state: the cookie record and its persistent store.

mod cookie;
mod store;

pub use cookie::{Cookie, SameSite};
pub use store::CookieStore;
