//! Placeholder Filter (PF): bidirectional stream filter between
//! working-copy content and the committed placeholder line.

mod clean;
mod placeholder;
mod smudge;

pub use clean::clean;
pub use placeholder::{format as format_placeholder, parse as parse_placeholder, PLACEHOLDER_LEN, PREFIX};
pub use smudge::smudge;
