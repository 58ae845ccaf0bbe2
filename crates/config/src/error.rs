pub use courier_common::{Error, Result};

courier_common::impl_context!();
