//! Edit Planner & Matcher (§4.8): locates a `target_string` inside a file and
//! turns an [`EditDescriptor`] into the new full contents (or a deletion) for
//! a single file. Pure and I/O-free; callers (the transaction coordinator)
//! own reading files, hashing, and writing results.

mod matcher;
mod planner;
mod types;

pub use matcher::locate;
pub use planner::check_delete_safety_with;
pub use planner::plan_one;
pub use planner::plan_one_with_safety;
pub use planner::FilePatch;
pub use planner::FilePatchKind;
pub use types::EditDescriptor;
pub use types::EditOperation;
pub use types::FuzzyMode;
pub use types::InsertMode;
pub use types::LineWindow;
pub use types::SafetyLevel;
pub use types::TextRange;
