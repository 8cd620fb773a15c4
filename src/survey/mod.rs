pub mod audit;
pub mod document;
pub mod export;
pub mod walker;

pub use walker::{collect_localizable, visit_localizable_mut, LocalizableNode};
