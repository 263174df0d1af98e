use crate::error::Error;
use crate::guard::Guard;
use crate::invocable::Invocable;
use crate::reporter::{Reporter, Scope};
use crate::session::Session;
use std::time::Instant;

/// The atomic migration: a [`Guard`] deciding whether an [`Invocable`] has to run.
#[derive(Debug)]
pub struct Step {
    guard: Guard,
    invocable: Invocable,
    label: Option<String>,
}

impl Step {
    pub fn new(guard: Guard, invocable: Invocable) -> Self {
        Self {
            guard,
            invocable,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn invocable(&self) -> &Invocable {
        &self.invocable
    }

    /// Evaluate the guard and, when it says the change is needed, run the invocable.
    ///
    /// Both run on `session`, so when it is a transaction nothing can change the schema between
    /// the check and the action. Every outcome goes to `reporter`; errors are also returned.
    pub fn apply(
        &self,
        session: &mut dyn Session,
        reporter: &mut dyn Reporter,
        parent: Option<&Scope<'_>>,
    ) -> Result<(), Error> {
        let scope = match parent {
            Some(parent) => parent.child(self.label()),
            None => Scope::root(self.label()),
        };
        let guard = self.guard.label();

        let should_apply = match self.guard.evaluate(session) {
            Ok(should_apply) => should_apply,
            Err(error) => {
                tracing::debug!(guard = %guard, error = %error, "Guard evaluation failed");
                return Err(reporter.error(&scope, Error::guard(guard, error)));
            }
        };

        if !should_apply {
            reporter.skipf(&scope, format_args!("{}", guard));
            return Ok(());
        }

        let started = Instant::now();
        if let Err(error) = self.invocable.invoke(session) {
            return Err(reporter.error(&scope, Error::invocation(guard, error)));
        }

        tracing::debug!(
            guard = %guard,
            duration_ms = started.elapsed().as_millis() as u64,
            "Step applied"
        );
        reporter.applyf(&scope, format_args!("{}", guard));
        Ok(())
    }
}

/// An ordered sequence of migrations applied one after another.
///
/// Order matters: later children may rely on earlier ones, e.g. a column has to be added before
/// a constraint referencing it.
///
/// When a child fails, a group with [`Group::with_abort_on_error`] stops right away and returns
/// the error as [`Error::Aborted`], which makes every enclosing group stop as well. Otherwise the
/// remaining children still run and the first error is returned once all of them were attempted.
#[derive(Debug, Default)]
pub struct Group {
    children: Vec<Migration>,
    label: Option<String>,
    abort_on_error: bool,
}

impl Group {
    pub fn new(children: Vec<Migration>) -> Self {
        Self {
            children,
            label: None,
            abort_on_error: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_abort_on_error(mut self, abort_on_error: bool) -> Self {
        self.abort_on_error = abort_on_error;
        self
    }

    /// Append a child.
    pub fn push(&mut self, child: impl Into<Migration>) {
        self.children.push(child.into());
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn abort_on_error(&self) -> bool {
        self.abort_on_error
    }

    pub fn children(&self) -> &[Migration] {
        &self.children
    }

    pub fn apply(
        &self,
        session: &mut dyn Session,
        reporter: &mut dyn Reporter,
        parent: Option<&Scope<'_>>,
    ) -> Result<(), Error> {
        let scope = match parent {
            Some(parent) => parent.child(self.label()),
            None => Scope::root(self.label()),
        };
        let _span = tracing::debug_span!(
            "group",
            label = self.label().unwrap_or_default(),
            children = self.children.len(),
            abort_on_error = self.abort_on_error
        )
        .entered();

        let mut first_error = None;
        for child in &self.children {
            if let Err(error) = child.apply(session, reporter, Some(&scope)) {
                if error.is_abort() {
                    // a nested group aborted the run
                    return Err(error);
                }
                if self.abort_on_error {
                    tracing::debug!(error = %error, "Aborting group");
                    return Err(error.aborted());
                }
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A node of the migration tree.
#[derive(Debug)]
pub enum Migration {
    Step(Step),
    Group(Group),
}

impl Migration {
    pub fn label(&self) -> Option<&str> {
        match self {
            Migration::Step(step) => step.label(),
            Migration::Group(group) => group.label(),
        }
    }

    /// Apply this node under `parent`, or as a root when `parent` is `None`.
    pub fn apply(
        &self,
        session: &mut dyn Session,
        reporter: &mut dyn Reporter,
        parent: Option<&Scope<'_>>,
    ) -> Result<(), Error> {
        match self {
            Migration::Step(step) => step.apply(session, reporter, parent),
            Migration::Group(group) => group.apply(session, reporter, parent),
        }
    }
}

impl From<Step> for Migration {
    fn from(step: Step) -> Self {
        Migration::Step(step)
    }
}

impl From<Group> for Migration {
    fn from(group: Group) -> Self {
        Migration::Group(group)
    }
}
