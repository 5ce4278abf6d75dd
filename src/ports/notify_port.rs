//! Notification port trait.

/// Best-effort delivery. Implementations log their own failures and never
/// report them back.
pub trait NotifyPort {
    fn notify(&self, text: &str);
}
