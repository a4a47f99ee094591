//! Lifecycle hooks.
//!
//! Observers registered on a [`Client`](crate::Client) are called
//! synchronously, in registration order, at fixed points of each
//! operation. They observe only; they cannot change the outcome.

use std::fmt;

/// A lifecycle point reached by a client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    NewFileStart { key: String, class: Option<String> },
    NewFileEnd { key: String, class: Option<String> },
    GetPathsStart { key: String },
    GetPathsEnd { key: String },
    StoreFileStart { key: String, class: Option<String> },
    StoreFileEnd { key: String, class: Option<String> },
    StoreContentStart { key: String, class: Option<String> },
    StoreContentEnd { key: String, class: Option<String> },
}

impl HookEvent {
    /// Stable snake_case name of the lifecycle point.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewFileStart { .. } => "new_file_start",
            Self::NewFileEnd { .. } => "new_file_end",
            Self::GetPathsStart { .. } => "get_paths_start",
            Self::GetPathsEnd { .. } => "get_paths_end",
            Self::StoreFileStart { .. } => "store_file_start",
            Self::StoreFileEnd { .. } => "store_file_end",
            Self::StoreContentStart { .. } => "store_content_start",
            Self::StoreContentEnd { .. } => "store_content_end",
        }
    }
}

/// Callback invoked for every [`HookEvent`].
pub type Hook = Box<dyn Fn(&HookEvent) + Send + Sync>;

/// Ordered list of registered hooks.
#[derive(Default)]
pub struct Hooks {
    hooks: Vec<Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: impl Fn(&HookEvent) + Send + Sync + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Calls every hook with `event`, in registration order.
    pub fn run(&self, event: &HookEvent) {
        for hook in &self.hooks {
            hook(event);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").field("len", &self.hooks.len()).finish()
    }
}
