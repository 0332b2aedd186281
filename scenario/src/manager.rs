//! Inspecting a charm before and after its event runs.

use scenario_state::{Event, State};

use crate::charm::Charm;
use crate::dispatch::Session;
use crate::env::HookEnvironment;
use crate::error::ScenarioError;
use crate::model::Model;

/// A charm that has been set up but whose event may not have run yet.
///
/// Obtained from [`Context::manager`](crate::Context::manager). Gives access
/// to the live charm and working state on both sides of [`run`](Self::run),
/// which may be called once.
pub struct Manager<'ctx, C: Charm> {
    session: Session<'ctx, C>,
    emitted: bool,
    output: Option<State>,
}

impl<'ctx, C: Charm> Manager<'ctx, C> {
    pub(crate) fn new(session: Session<'ctx, C>) -> Self {
        Self {
            session,
            emitted: false,
            output: None,
        }
    }

    /// The live charm instance.
    #[must_use]
    pub fn charm(&self) -> &C {
        self.session.charm()
    }

    /// The live charm instance, mutably.
    pub fn charm_mut(&mut self) -> &mut C {
        self.session.charm_mut()
    }

    /// The working state.
    #[must_use]
    pub fn state(&self) -> &State {
        self.session.state()
    }

    /// The working state, mutably. Changes made before [`run`](Self::run)
    /// are what the handlers see.
    pub fn state_mut(&mut self) -> &mut State {
        self.session.state_mut()
    }

    /// The event that will be (or was) fired, as decoded from the hook
    /// environment.
    #[must_use]
    pub fn event(&self) -> &Event {
        self.session.event()
    }

    /// The hook environment of this run.
    #[must_use]
    pub fn env(&self) -> &HookEnvironment {
        self.session.env()
    }

    /// A model over the working state, as a handler would see it.
    pub fn model(&mut self) -> Model<'_> {
        self.session.model()
    }

    /// Fires the event.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::AlreadyEmitted`] on a second call; otherwise whatever
    /// the run raises.
    pub fn run(&mut self) -> Result<State, ScenarioError> {
        if self.emitted {
            return Err(ScenarioError::AlreadyEmitted);
        }
        self.emitted = true;
        let result = self.session.run();
        self.output = match &result {
            Ok(state) => Some(state.clone()),
            Err(err) => err.state().cloned(),
        };
        result
    }

    /// The state the run produced, once it has run. A failed run reports
    /// the partial state its error carries.
    #[must_use]
    pub fn output(&self) -> Option<&State> {
        self.output.as_ref()
    }
}
