// Shell output translation
//
// Turns raw shell output rows into text or image items, resolving
// `@string:` / `@dimen:` resource references along the way.

mod log_line;
mod resources;
mod translation;

pub use log_line::{classify_log_line, LogLine};
pub use resources::{MapResources, ResourceError, ResourceKind, ResourceTable, ResourceValue};
pub use translation::ShellTranslation;
