//! Lifecycle hooks registered on describe blocks.

use std::{future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use kestrel_schema::Location;

use crate::test::TestFailure;

/// Which lifecycle moment a hook runs at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookKind {
    /// Once, before anything in the describe's subtree.
    BeforeAll,
    /// Once, after everything in the describe's subtree.
    AfterAll,
    /// Before every test in the describe's subtree.
    BeforeEach,
    /// After every test in the describe's subtree.
    AfterEach,
}

impl HookKind {
    /// Name used when a hook failure is reported.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeAll => "beforeAll",
            Self::AfterAll => "afterAll",
            Self::BeforeEach => "beforeEach",
            Self::AfterEach => "afterEach",
        }
    }
}

/// The executable body of a hook.
pub type HookBody = Arc<dyn Fn() -> BoxFuture<'static, Result<(), TestFailure>> + Send + Sync>;

/// A hook as registered on a describe.
#[derive(Clone)]
pub struct Hook {
    pub kind: HookKind,
    pub body: HookBody,
    /// Where the hook was registered, in generated-file coordinates.
    pub location: Location,
}

impl Hook {
    /// A hook positioned at the caller.
    #[track_caller]
    pub fn new<F, Fut>(kind: HookKind, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        let caller = std::panic::Location::caller();
        Self {
            kind,
            body: Arc::new(move || body().boxed()),
            location: Location::new(
                caller.line().saturating_sub(1),
                caller.column().saturating_sub(1),
            ),
        }
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook").field("kind", &self.kind).finish()
    }
}
