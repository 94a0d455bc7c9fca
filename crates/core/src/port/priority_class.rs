// Priority Class Resolver Port

/// Resolves a priority class name to its numeric priority.
///
/// Called from inside the admission walk, so implementations must not
/// perform I/O; resolve from an in-memory table.
pub trait PriorityClassResolver: Send + Sync {
    /// `None` when the class is unknown
    fn resolve(&self, class_name: &str) -> Option<i32>;
}

/// Resolver used when no priority classes are configured
pub struct NoPriorityClasses;

impl PriorityClassResolver for NoPriorityClasses {
    fn resolve(&self, _class_name: &str) -> Option<i32> {
        None
    }
}
