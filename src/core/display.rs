//! Output seam between the update scheduler and whatever renders the text.

/// Receives rendered panel text.
///
/// The scheduler never calls `set_text` after it has been stopped.
pub trait Display: Send + Sync {
    fn set_text(&self, text: &str);
}
